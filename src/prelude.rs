//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::bridge::{
    DEFAULT_ISOLATION_LEVEL, DIALECT, IDENTIFIER_DELIMITERS, MssqlBridge, QueryOptions, wrap,
};
pub use crate::config::{ConfigOverrides, ConnectOptions, MssqlConfig, PoolKey, PoolSettings};
pub use crate::connection::Connection;
pub use crate::error::MssqlBridgeError;
pub use crate::executor::SqlExecutor;
pub use crate::params::{DeclaredType, Params, SqlParam, Timezone, TypedParam};
pub use crate::results::{ResultSet, SqlRow};
pub use crate::transaction::{IsolationLevel, Transaction};
pub use crate::value::SqlValue;
