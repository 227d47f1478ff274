//! The instance-level entry point: a connection registry keyed by target
//! database plus the query, batch, and transaction surface built on it.

use std::collections::HashMap;
use std::future::Future;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{ConfigOverrides, MssqlConfig, PoolKey};
use crate::connection::Connection;
use crate::error::MssqlBridgeError;
use crate::params::Params;
use crate::results::ResultSet;
use crate::transaction::{IsolationLevel, Transaction};

/// The SQL dialect this crate speaks.
pub const DIALECT: &str = "mssql";

/// Opening and closing identifier delimiters used by [`wrap`].
pub const IDENTIFIER_DELIMITERS: (char, char) = ('[', ']');

/// Isolation level used when neither the instance nor the call specifies one.
pub const DEFAULT_ISOLATION_LEVEL: IsolationLevel = IsolationLevel::ReadCommitted;

/// Quote an identifier with square brackets, doubling any closing bracket the
/// name itself contains.
#[must_use]
pub fn wrap(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

/// Per-call options for query, execute, and batch.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Route the statement through an open transaction instead of the pooled
    /// connection.
    pub transaction: Option<Transaction>,
    /// Isolation level for a transaction started by this call.
    pub isolation_level: Option<IsolationLevel>,
}

impl QueryOptions {
    #[must_use]
    pub fn with_transaction(mut self, transaction: Transaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    #[must_use]
    pub fn with_isolation_level(mut self, isolation_level: IsolationLevel) -> Self {
        self.isolation_level = Some(isolation_level);
        self
    }
}

/// One configured SQL Server target and its connection registry.
///
/// Connections are keyed by `(host, port, database, user)` and reused across
/// calls; transactions always get a dedicated connection instead.
#[derive(Debug)]
pub struct MssqlBridge {
    config: MssqlConfig,
    default_isolation: IsolationLevel,
    registry: Mutex<HashMap<PoolKey, Connection>>,
}

impl MssqlBridge {
    #[must_use]
    pub fn new(config: MssqlConfig) -> Self {
        Self::with_default_isolation(config, DEFAULT_ISOLATION_LEVEL)
    }

    #[must_use]
    pub fn with_default_isolation(config: MssqlConfig, isolation: IsolationLevel) -> Self {
        Self {
            config,
            default_isolation: isolation,
            registry: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MssqlConfig {
        &self.config
    }

    /// Get the pooled connection for the instance default target, connecting
    /// if none exists yet.
    pub async fn connect(&self) -> Result<Connection, MssqlBridgeError> {
        self.connect_with(ConfigOverrides::default()).await
    }

    /// Get the pooled connection for the default config merged with
    /// `overrides`, connecting if none exists for that key.
    ///
    /// A registry hit is only reused when the stored connection's password
    /// matches the requested one; on a mismatch the stale connection is
    /// retired and a fresh one replaces it under the same key. The registry
    /// lock is held across the physical connect so concurrent callers with
    /// the same key cannot race to create duplicates.
    pub async fn connect_with(
        &self,
        overrides: ConfigOverrides,
    ) -> Result<Connection, MssqlBridgeError> {
        let config = self.config.merged(&overrides);
        let key = config.pool_key();

        let mut registry = self.registry.lock().await;
        if let Some(existing) = registry.get(&key) {
            if existing.password_matches(config.password()) {
                debug!(key = %key, "reusing pooled connection");
                return Ok(existing.clone());
            }
            // Credentials changed for this key; retire the stale connection.
            if let Some(stale) = registry.remove(&key) {
                tokio::spawn(async move {
                    if let Err(e) = stale.close().await {
                        warn!(error = %e, "failed to close stale connection");
                    }
                });
            }
        }

        let connection = Connection::establish(config).await?;
        registry.insert(key.clone(), connection.clone());
        debug!(key = %key, "connection registered");
        Ok(connection)
    }

    /// Bind and execute one parameterized statement, on the pooled connection
    /// or on `options.transaction` when set.
    pub async fn query(
        &self,
        statement: &str,
        params: &Params,
        options: QueryOptions,
    ) -> Result<ResultSet, MssqlBridgeError> {
        match &options.transaction {
            Some(tx) => tx.query(statement, params).await,
            None => self.connect().await?.query(statement, params).await,
        }
    }

    /// Alias for [`query`](Self::query); commands and row-returning
    /// statements take the same path.
    pub async fn execute(
        &self,
        statement: &str,
        params: &Params,
        options: QueryOptions,
    ) -> Result<ResultSet, MssqlBridgeError> {
        self.query(statement, params, options).await
    }

    /// Execute a raw script without parameter binding.
    pub async fn batch(
        &self,
        script: &str,
        options: QueryOptions,
    ) -> Result<ResultSet, MssqlBridgeError> {
        match &options.transaction {
            Some(tx) => tx.batch(script).await,
            None => self.connect().await?.batch(script).await,
        }
    }

    /// Run `work` inside a transaction on a dedicated connection.
    ///
    /// The transaction is committed when `work` returns `Ok` and rolled back
    /// when it returns `Err`; the work error is returned even if the rollback
    /// itself fails.
    pub async fn transaction<F, Fut, T>(
        &self,
        options: QueryOptions,
        work: F,
    ) -> Result<T, MssqlBridgeError>
    where
        F: FnOnce(Transaction) -> Fut,
        Fut: Future<Output = Result<T, MssqlBridgeError>>,
    {
        let tx = self.begin_transaction(options).await?;
        match work(tx.clone()).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(work_err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed unit of work also failed");
                }
                Err(work_err)
            }
        }
    }

    /// Open a transaction on a dedicated connection. The caller owns the
    /// handle and must finish it with commit or rollback.
    pub async fn begin_transaction(
        &self,
        options: QueryOptions,
    ) -> Result<Transaction, MssqlBridgeError> {
        let isolation = options.isolation_level.unwrap_or(self.default_isolation);
        let connection = Connection::establish(self.config.clone()).await?;
        Transaction::begin(connection, isolation).await
    }

    /// Commit a transaction opened with
    /// [`begin_transaction`](Self::begin_transaction).
    pub async fn commit(&self, transaction: &Transaction) -> Result<(), MssqlBridgeError> {
        transaction.commit().await
    }

    /// Roll back a transaction opened with
    /// [`begin_transaction`](Self::begin_transaction). A no-op when the server
    /// already rolled it back.
    pub async fn rollback(&self, transaction: &Transaction) -> Result<(), MssqlBridgeError> {
        transaction.rollback().await
    }

    /// Close every registered connection. The registry is drained first, so
    /// a close failure never leaves a half-closed connection registered.
    pub async fn close(&self) -> Result<(), MssqlBridgeError> {
        let connections: Vec<Connection> = {
            let mut registry = self.registry.lock().await;
            registry.drain().map(|(_, conn)| conn).collect()
        };
        for connection in connections {
            connection.close().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_brackets_identifiers() {
        assert_eq!(wrap("orders"), "[orders]");
        assert_eq!(wrap("odd]name"), "[odd]]name]");
        assert_eq!(wrap(""), "[]");
    }

    #[test]
    fn query_options_builders_compose() {
        let options = QueryOptions::default().with_isolation_level(IsolationLevel::Serializable);
        assert_eq!(options.isolation_level, Some(IsolationLevel::Serializable));
        assert!(options.transaction.is_none());
    }
}
