use mssql_bridge::prelude::*;

fn base_config() -> MssqlConfig {
    MssqlConfig::builder("app_user", "hunter2", "inventory").finish()
}

#[test]
fn test03_defaults_and_registry_key() {
    let config = base_config();
    assert_eq!(config.host(), "localhost");
    assert_eq!(config.port(), 1433);
    assert_eq!(config.pool().max, 10);
    assert_eq!(config.pool().idle_timeout_millis, 30_000);
    assert!(config.options().trust_cert);

    let key = config.pool_key();
    assert_eq!(key.to_string(), "localhost|1433|inventory|app_user");

    // The password is not part of the key and never appears in Debug output.
    let other = MssqlConfig::builder("app_user", "rotated", "inventory").finish();
    assert_eq!(key, other.pool_key());
    assert!(!format!("{config:?}").contains("hunter2"));
}

#[test]
fn test03_overrides_produce_a_distinct_key() {
    let config = base_config();
    let merged = config.merged(&ConfigOverrides {
        database: Some("reporting".into()),
        ..ConfigOverrides::default()
    });
    assert_eq!(merged.database(), "reporting");
    assert_eq!(merged.user(), "app_user");
    assert_ne!(config.pool_key(), merged.pool_key());
}

#[test]
fn test03_config_deserializes_with_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let json = r#"{"user":"sa","password":"pw","database":"master","port":1444}"#;
    let config: MssqlConfig = serde_json::from_str(json)?;
    assert_eq!(config.host(), "localhost");
    assert_eq!(config.port(), 1444);
    assert_eq!(config.pool(), PoolSettings::default());
    assert_eq!(config.options(), ConnectOptions::default());
    Ok(())
}

#[test]
fn test03_wrap_quotes_identifiers() {
    assert_eq!(wrap("orders"), "[orders]");
    assert_eq!(wrap("odd]name"), "[odd]]name]");
    assert_eq!(IDENTIFIER_DELIMITERS, ('[', ']'));
    assert_eq!(DIALECT, "mssql");
}

#[test]
fn test03_isolation_levels_parse_and_render() {
    assert_eq!(DEFAULT_ISOLATION_LEVEL, IsolationLevel::ReadCommitted);
    assert_eq!(
        "serializable".parse::<IsolationLevel>().unwrap(),
        IsolationLevel::Serializable
    );
    assert_eq!(IsolationLevel::Snapshot.to_string(), "SNAPSHOT");
    assert!("dirty".parse::<IsolationLevel>().is_err());
}

#[test]
fn test03_query_options_route_selection() {
    let options = QueryOptions::default();
    assert!(options.transaction.is_none());
    assert!(options.isolation_level.is_none());

    let options = options.with_isolation_level(IsolationLevel::RepeatableRead);
    assert_eq!(options.isolation_level, Some(IsolationLevel::RepeatableRead));
}
