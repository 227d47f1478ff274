//! Explicit transactions over a dedicated connection.
//!
//! Each transaction owns its own physical connection for its whole lifetime,
//! so interleaved work on the shared pooled connection can never be captured
//! by an open transaction. The handle is a small state machine: it starts
//! active, and exactly one of commit or rollback moves it to a terminal state.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tracing::{debug, warn};

use crate::binder::bind;
use crate::connection::Connection;
use crate::error::MssqlBridgeError;
use crate::params::Params;
use crate::results::ResultSet;

/// SQL Server transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadUncommitted,
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

impl IsolationLevel {
    pub(crate) fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
            IsolationLevel::Snapshot => "SNAPSHOT",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for IsolationLevel {
    type Err = MssqlBridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('_', " ").as_str() {
            "READ UNCOMMITTED" => Ok(IsolationLevel::ReadUncommitted),
            "READ COMMITTED" => Ok(IsolationLevel::ReadCommitted),
            "REPEATABLE READ" => Ok(IsolationLevel::RepeatableRead),
            "SERIALIZABLE" => Ok(IsolationLevel::Serializable),
            "SNAPSHOT" => Ok(IsolationLevel::Snapshot),
            other => Err(MssqlBridgeError::ConfigError(format!(
                "unknown isolation level: {other}"
            ))),
        }
    }
}

const TX_ACTIVE: u8 = 0;
const TX_COMMITTED: u8 = 1;
const TX_ROLLED_BACK: u8 = 2;

/// Server error codes that mean the transaction was already rolled back on
/// the server side: deadlock victim (1205) and snapshot isolation conflicts
/// (3960, 3961).
const SERVER_ABORT_CODES: [u32; 3] = [1205, 3960, 3961];

/// An open transaction. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Transaction {
    inner: Arc<TxInner>,
}

struct TxInner {
    connection: Connection,
    state: AtomicU8,
    rolled_back: AtomicBool,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.inner.state.load(Ordering::SeqCst))
            .field("rolled_back", &self.rolled_back())
            .finish_non_exhaustive()
    }
}

impl Transaction {
    pub(crate) async fn begin(
        connection: Connection,
        isolation: IsolationLevel,
    ) -> Result<Self, MssqlBridgeError> {
        let script = format!(
            "SET TRANSACTION ISOLATION LEVEL {}; BEGIN TRANSACTION",
            isolation.as_sql()
        );
        connection.batch(&script).await?;
        debug!(isolation = %isolation, "transaction started");
        Ok(Self {
            inner: Arc::new(TxInner {
                connection,
                state: AtomicU8::new(TX_ACTIVE),
                rolled_back: AtomicBool::new(false),
            }),
        })
    }

    /// Whether the server has already rolled this transaction back, e.g. as a
    /// deadlock victim. When set, [`rollback`](Self::rollback) succeeds
    /// without sending anything.
    pub fn rolled_back(&self) -> bool {
        self.inner.rolled_back.load(Ordering::SeqCst)
    }

    /// Bind and execute one parameterized statement inside this transaction.
    pub async fn query(
        &self,
        statement: &str,
        params: &Params,
    ) -> Result<ResultSet, MssqlBridgeError> {
        self.ensure_active()?;
        let bound = bind(statement, params)?;
        self.observe(self.inner.connection.run_bound(&bound).await)
    }

    /// Alias for [`query`](Self::query); commands and row-returning statements
    /// take the same path.
    pub async fn execute(
        &self,
        statement: &str,
        params: &Params,
    ) -> Result<ResultSet, MssqlBridgeError> {
        self.query(statement, params).await
    }

    /// Execute a raw script inside this transaction.
    pub async fn batch(&self, script: &str) -> Result<ResultSet, MssqlBridgeError> {
        self.ensure_active()?;
        self.observe(self.inner.connection.batch(script).await)
    }

    /// Commit the transaction and release its connection.
    ///
    /// If the server rejects the commit, a rollback is attempted (unless the
    /// server already rolled back) and the commit error is returned.
    pub async fn commit(&self) -> Result<(), MssqlBridgeError> {
        self.finish(TX_COMMITTED)?;
        match self.control("COMMIT TRANSACTION").await {
            Ok(()) => {
                debug!("transaction committed");
                self.discard().await;
                Ok(())
            }
            Err(commit_err) => {
                self.inner.state.store(TX_ROLLED_BACK, Ordering::SeqCst);
                if !self.inner.rolled_back.swap(true, Ordering::SeqCst) {
                    if let Err(rollback_err) = self.control("ROLLBACK TRANSACTION").await {
                        warn!(error = %rollback_err, "rollback after failed commit also failed");
                    }
                }
                self.discard().await;
                Err(MssqlBridgeError::TransactionError(format!(
                    "commit failed: {commit_err}"
                )))
            }
        }
    }

    /// Roll the transaction back and release its connection.
    ///
    /// If the server already aborted the transaction, nothing is sent and the
    /// call succeeds.
    pub async fn rollback(&self) -> Result<(), MssqlBridgeError> {
        self.finish(TX_ROLLED_BACK)?;
        if self.inner.rolled_back.swap(true, Ordering::SeqCst) {
            debug!("transaction already rolled back by the server");
            self.discard().await;
            return Ok(());
        }
        let outcome = self.control("ROLLBACK TRANSACTION").await;
        self.discard().await;
        match outcome {
            Ok(()) => {
                debug!("transaction rolled back");
                Ok(())
            }
            Err(e) => Err(MssqlBridgeError::TransactionError(format!(
                "rollback failed: {e}"
            ))),
        }
    }

    /// Record server-side aborts observed on statement errors.
    fn observe(
        &self,
        outcome: Result<ResultSet, MssqlBridgeError>,
    ) -> Result<ResultSet, MssqlBridgeError> {
        if let Err(err) = &outcome
            && aborted_by_server(err)
        {
            self.inner.rolled_back.store(true, Ordering::SeqCst);
            warn!("transaction rolled back by the server");
        }
        outcome
    }

    fn ensure_active(&self) -> Result<(), MssqlBridgeError> {
        match self.inner.state.load(Ordering::SeqCst) {
            TX_ACTIVE => Ok(()),
            _ => Err(MssqlBridgeError::TransactionError(
                "transaction already committed or rolled back".to_string(),
            )),
        }
    }

    fn finish(&self, terminal: u8) -> Result<(), MssqlBridgeError> {
        self.inner
            .state
            .compare_exchange(TX_ACTIVE, terminal, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| {
                MssqlBridgeError::TransactionError(
                    "transaction already committed or rolled back".to_string(),
                )
            })
    }

    async fn control(&self, sql: &str) -> Result<(), MssqlBridgeError> {
        self.inner.connection.batch(sql).await.map(|_| ())
    }

    /// Transactions hold a dedicated connection; once the transaction ends it
    /// is closed rather than returned to the registry.
    async fn discard(&self) {
        if let Err(e) = self.inner.connection.close().await {
            warn!(error = %e, "failed to close transaction connection");
        }
    }
}

fn aborted_by_server(err: &MssqlBridgeError) -> bool {
    matches!(
        err,
        MssqlBridgeError::ExecutionError(tiberius::error::Error::Server(token))
            if SERVER_ABORT_CODES.contains(&token.code())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_level_round_trips_through_sql_text() {
        for level in [
            IsolationLevel::ReadUncommitted,
            IsolationLevel::ReadCommitted,
            IsolationLevel::RepeatableRead,
            IsolationLevel::Serializable,
            IsolationLevel::Snapshot,
        ] {
            assert_eq!(level.as_sql().parse::<IsolationLevel>().unwrap(), level);
        }
    }

    #[test]
    fn isolation_level_parsing_accepts_underscores() {
        assert_eq!(
            "read_committed".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::ReadCommitted
        );
        assert!("chaos".parse::<IsolationLevel>().is_err());
    }
}
