//! Physical connection handling: TCP dial, TDS handshake, session setup, and
//! the shared handle the registry and transactions clone.

use std::net::ToSocketAddrs;
use std::sync::Arc;

use tiberius::Client;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::binder::{BoundStatement, bind};
use crate::config::{MssqlConfig, PoolKey};
use crate::error::MssqlBridgeError;
use crate::params::Params;
use crate::query::{run_batch, run_statement};
use crate::results::ResultSet;

pub(crate) type MssqlClient = Client<Compat<TcpStream>>;

/// A live connection to one SQL Server database. Cheap to clone; all clones
/// share the underlying client and serialize access to it.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    client: Mutex<Option<MssqlClient>>,
    config: MssqlConfig,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Dial the server, authenticate, and run session setup.
    pub(crate) async fn establish(config: MssqlConfig) -> Result<Self, MssqlBridgeError> {
        let mut client = create_client(&config).await?;

        if config.options().arith_abort {
            client
                .simple_query("SET ARITHABORT ON")
                .await?
                .into_results()
                .await?;
        }
        debug!(
            host = config.host(),
            port = config.port(),
            database = config.database(),
            "connection established"
        );

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                client: Mutex::new(Some(client)),
                config,
            }),
        })
    }

    pub fn pool_key(&self) -> PoolKey {
        self.inner.config.pool_key()
    }

    /// Whether two handles share the same underlying client.
    pub fn ptr_eq(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn password_matches(&self, password: &str) -> bool {
        self.inner.config.password() == password
    }

    /// Bind and execute one parameterized statement.
    pub async fn query(
        &self,
        statement: &str,
        params: &Params,
    ) -> Result<ResultSet, MssqlBridgeError> {
        let bound = bind(statement, params)?;
        self.run_bound(&bound).await
    }

    pub(crate) async fn run_bound(
        &self,
        bound: &BoundStatement,
    ) -> Result<ResultSet, MssqlBridgeError> {
        let mut guard = self.inner.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| MssqlBridgeError::ConnectionError("connection is closed".to_string()))?;
        run_statement(client, bound).await
    }

    /// Execute a raw script without parameter binding. Statements separated by
    /// `;` run in one round trip; every result set they produce is returned.
    pub async fn batch(&self, script: &str) -> Result<ResultSet, MssqlBridgeError> {
        let mut guard = self.inner.client.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| MssqlBridgeError::ConnectionError("connection is closed".to_string()))?;
        run_batch(client, script).await
    }

    /// Close the underlying client. Later calls on any clone of this
    /// connection fail with a connection error; closing twice is a no-op.
    pub async fn close(&self) -> Result<(), MssqlBridgeError> {
        let client = self.inner.client.lock().await.take();
        if let Some(client) = client {
            client.close().await?;
            debug!(key = %self.inner.config.pool_key(), "connection closed");
        }
        Ok(())
    }
}

async fn create_client(config: &MssqlConfig) -> Result<MssqlClient, MssqlBridgeError> {
    let addr = (config.host(), config.port())
        .to_socket_addrs()
        .map_err(|e| {
            MssqlBridgeError::ConnectionError(format!("failed to resolve server address: {e}"))
        })?
        .next()
        .ok_or_else(|| {
            MssqlBridgeError::ConnectionError(format!(
                "no valid address found for {}",
                config.host()
            ))
        })?;

    let tcp = TcpStream::connect(addr)
        .await
        .map_err(|e| MssqlBridgeError::ConnectionError(format!("TCP connection error: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| MssqlBridgeError::ConnectionError(format!("TCP configuration error: {e}")))?;

    Client::connect(config.to_tiberius(), tcp.compat_write())
        .await
        .map_err(|e| {
            MssqlBridgeError::ConnectionError(format!("SQL Server connection error: {e}"))
        })
}
