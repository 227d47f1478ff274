//! A common execution seam over pooled connections and open transactions, so
//! data-access code can be written once and run in either context.

use async_trait::async_trait;

use crate::connection::Connection;
use crate::error::MssqlBridgeError;
use crate::params::Params;
use crate::results::ResultSet;
use crate::transaction::Transaction;

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Bind and execute one parameterized statement.
    async fn query(&self, statement: &str, params: &Params)
    -> Result<ResultSet, MssqlBridgeError>;

    /// Alias for [`query`](Self::query); row-returning statements and
    /// commands take the same path.
    async fn execute(
        &self,
        statement: &str,
        params: &Params,
    ) -> Result<ResultSet, MssqlBridgeError> {
        self.query(statement, params).await
    }

    /// Execute a raw script without parameter binding.
    async fn batch(&self, script: &str) -> Result<ResultSet, MssqlBridgeError>;
}

#[async_trait]
impl SqlExecutor for Connection {
    async fn query(
        &self,
        statement: &str,
        params: &Params,
    ) -> Result<ResultSet, MssqlBridgeError> {
        Connection::query(self, statement, params).await
    }

    async fn batch(&self, script: &str) -> Result<ResultSet, MssqlBridgeError> {
        Connection::batch(self, script).await
    }
}

#[async_trait]
impl SqlExecutor for Transaction {
    async fn query(
        &self,
        statement: &str,
        params: &Params,
    ) -> Result<ResultSet, MssqlBridgeError> {
        Transaction::query(self, statement, params).await
    }

    async fn batch(&self, script: &str) -> Result<ResultSet, MssqlBridgeError> {
        Transaction::batch(self, script).await
    }
}
