//! A thin asynchronous bridge to Microsoft SQL Server built on tiberius.
//!
//! The crate keeps one pooled connection per `(host, port, database, user)`
//! target and layers a small, uniform surface over it:
//!
//! - parameterized `query`/`execute` with `$1, $2, …` positional or `@name`
//!   named placeholders, rewritten to the driver's ordinal form with string
//!   literals, quoted identifiers, and comments left untouched
//! - driver types inferred from values (numeric precision and scale are taken
//!   from the value's text form) or pinned with an explicit [`TypedParam`]
//! - raw multi-statement `batch` execution
//! - transactions on dedicated connections, scoped or step-by-step, with
//!   server-side aborts (deadlock victim, snapshot conflicts) tracked so a
//!   later rollback never fails the caller
//! - result rows normalized into [`SqlValue`]s with duplicate column names
//!   folded
//!
//! ```no_run
//! use mssql_bridge::prelude::*;
//!
//! # async fn demo() -> Result<(), MssqlBridgeError> {
//! let config = MssqlConfig::builder("sa", "secret", "master").finish();
//! let bridge = MssqlBridge::new(config);
//!
//! let rows = bridge
//!     .query(
//!         "SELECT name FROM sys.tables WHERE name = $1",
//!         &Params::positional(["orders"]),
//!         QueryOptions::default(),
//!     )
//!     .await?;
//! println!("{} match(es)", rows.len());
//! bridge.close().await?;
//! # Ok(())
//! # }
//! ```

mod query;

pub mod binder;
pub mod bridge;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod infer;
pub mod params;
pub mod prelude;
pub mod results;
pub mod transaction;
pub mod value;

pub use binder::{BoundParam, BoundStatement, bind};
pub use bridge::{
    DEFAULT_ISOLATION_LEVEL, DIALECT, IDENTIFIER_DELIMITERS, MssqlBridge, QueryOptions, wrap,
};
pub use config::{ConfigOverrides, ConnectOptions, MssqlConfig, PoolKey, PoolSettings};
pub use connection::Connection;
pub use error::MssqlBridgeError;
pub use executor::SqlExecutor;
pub use infer::{SqlType, infer_type};
pub use params::{DeclaredType, Params, SqlParam, Timezone, TypedParam};
pub use results::{ResultSet, SqlRow};
pub use transaction::{IsolationLevel, Transaction};
pub use value::SqlValue;
