//! Connection configuration, normalization, and registry keying.

use serde::Deserialize;
use tiberius::{AuthMethod, Config as TiberiusConfig, EncryptionLevel};

pub(crate) const DEFAULT_HOST: &str = "localhost";
pub(crate) const DEFAULT_PORT: u16 = 1433;

/// Pool sizing carried by the normalized config. The pool minimum is fixed at
/// zero; a connection exists only once something has asked for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max: u32,
    pub idle_timeout_millis: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max: 10,
            idle_timeout_millis: 30_000,
        }
    }
}

/// Driver-level connection options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectOptions {
    pub encrypt: bool,
    pub trust_cert: bool,
    pub arith_abort: bool,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            encrypt: false,
            trust_cert: true,
            arith_abort: true,
        }
    }
}

/// Normalized connection configuration. Immutable once built.
///
/// The password is private and redacted from `Debug`; only the connection
/// manager reads it.
#[derive(Clone, Deserialize)]
pub struct MssqlConfig {
    user: String,
    password: String,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    database: String,
    #[serde(default)]
    pool: PoolSettings,
    #[serde(default)]
    options: ConnectOptions,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl std::fmt::Debug for MssqlConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("pool", &self.pool)
            .field("options", &self.options)
            .finish()
    }
}

impl MssqlConfig {
    #[must_use]
    pub fn builder(
        user: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> MssqlConfigBuilder {
        MssqlConfigBuilder {
            config: MssqlConfig {
                user: user.into(),
                password: password.into(),
                host: default_host(),
                port: DEFAULT_PORT,
                database: database.into(),
                pool: PoolSettings::default(),
                options: ConnectOptions::default(),
            },
        }
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn pool(&self) -> PoolSettings {
        self.pool
    }

    pub fn options(&self) -> ConnectOptions {
        self.options
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// The registry key identifying a reusable physical connection.
    pub fn pool_key(&self) -> PoolKey {
        PoolKey {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            user: self.user.clone(),
        }
    }

    /// Merge per-call overrides over this config.
    #[must_use]
    pub fn merged(&self, overrides: &ConfigOverrides) -> MssqlConfig {
        MssqlConfig {
            user: overrides.user.clone().unwrap_or_else(|| self.user.clone()),
            password: overrides
                .password
                .clone()
                .unwrap_or_else(|| self.password.clone()),
            host: overrides.host.clone().unwrap_or_else(|| self.host.clone()),
            port: overrides.port.unwrap_or(self.port),
            database: overrides
                .database
                .clone()
                .unwrap_or_else(|| self.database.clone()),
            pool: overrides.pool.unwrap_or(self.pool),
            options: overrides.options.unwrap_or(self.options),
        }
    }

    pub(crate) fn to_tiberius(&self) -> TiberiusConfig {
        let mut config = TiberiusConfig::new();
        config.host(&self.host);
        config.port(self.port);
        config.database(&self.database);
        config.authentication(AuthMethod::sql_server(&self.user, &self.password));
        config.encryption(if self.options.encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::NotSupported
        });
        if self.options.trust_cert {
            config.trust_cert();
        }
        config
    }
}

/// Fluent builder for [`MssqlConfig`].
#[derive(Debug, Clone)]
pub struct MssqlConfigBuilder {
    config: MssqlConfig,
}

impl MssqlConfigBuilder {
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn pool(mut self, pool: PoolSettings) -> Self {
        self.config.pool = pool;
        self
    }

    #[must_use]
    pub fn options(mut self, options: ConnectOptions) -> Self {
        self.config.options = options;
        self
    }

    #[must_use]
    pub fn finish(self) -> MssqlConfig {
        self.config
    }
}

/// Per-call override overlay for [`MssqlConfig::merged`]. Unset fields fall
/// back to the instance default.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub pool: Option<PoolSettings>,
    pub options: Option<ConnectOptions>,
}

/// The tuple identifying a reusable physical connection: at most one live
/// registry entry exists per key at any time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
}

impl std::fmt::Display for PoolKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.host, self.port, self.database, self.user
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MssqlConfig {
        MssqlConfig::builder("sa", "secret", "master").finish()
    }

    #[test]
    fn normalization_applies_defaults() {
        let cfg = config();
        assert_eq!(cfg.host(), "localhost");
        assert_eq!(cfg.port(), 1433);
        assert_eq!(cfg.pool().max, 10);
        assert_eq!(cfg.pool().idle_timeout_millis, 30_000);
        assert!(cfg.options().trust_cert);
        assert!(cfg.options().arith_abort);
    }

    #[test]
    fn pool_key_ignores_password() {
        let a = config();
        let b = MssqlConfig::builder("sa", "different", "master").finish();
        assert_eq!(a.pool_key(), b.pool_key());
        assert_eq!(a.pool_key().to_string(), "localhost|1433|master|sa");
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let cfg = config();
        let merged = cfg.merged(&ConfigOverrides {
            database: Some("other".into()),
            port: Some(1444),
            ..ConfigOverrides::default()
        });
        assert_eq!(merged.database(), "other");
        assert_eq!(merged.port(), 1444);
        assert_eq!(merged.user(), "sa");
        assert_ne!(cfg.pool_key(), merged.pool_key());
    }

    #[test]
    fn debug_redacts_password() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
