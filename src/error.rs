use thiserror::Error;

/// Error type for all `mssql-bridge` operations.
///
/// Driver failures during statement execution are classified as
/// `ExecutionError` with the original driver error kept as the source;
/// everything the bridge itself detects is classified up front.
#[derive(Debug, Error)]
pub enum MssqlBridgeError {
    #[error(transparent)]
    DriverError(#[from] tiberius::error::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter arity error: {0}")]
    ArityError(String),

    #[error("Parameter binding error: {0}")]
    BindingError(String),

    #[error("Truncation error: {0}")]
    TruncationError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(#[source] tiberius::error::Error),

    #[error("Transaction error: {0}")]
    TransactionError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn execution_error_keeps_the_driver_failure_as_source() {
        let driver = tiberius::error::Error::Io {
            kind: std::io::ErrorKind::BrokenPipe,
            message: "connection reset".to_string(),
        };
        let err = MssqlBridgeError::ExecutionError(driver);
        assert!(err.to_string().starts_with("SQL execution error:"));
        assert!(err.source().is_some());
    }
}
