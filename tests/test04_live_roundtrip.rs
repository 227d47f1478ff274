//! End-to-end tests against a real SQL Server instance.
//!
//! These run only when `MSSQL_BRIDGE_TEST_HOST` is set; without it every test
//! is a silent pass so the suite stays green on machines with no server.
//! Expected environment:
//!
//! ```text
//! MSSQL_BRIDGE_TEST_HOST=localhost
//! MSSQL_BRIDGE_TEST_PORT=1433            (optional)
//! MSSQL_BRIDGE_TEST_USER=sa
//! MSSQL_BRIDGE_TEST_PASSWORD=...
//! MSSQL_BRIDGE_TEST_DATABASE=master      (optional)
//! ```

use mssql_bridge::prelude::*;

fn test_config() -> Option<MssqlConfig> {
    let host = std::env::var("MSSQL_BRIDGE_TEST_HOST").ok()?;
    let user = std::env::var("MSSQL_BRIDGE_TEST_USER").unwrap_or_else(|_| "sa".to_string());
    let password = std::env::var("MSSQL_BRIDGE_TEST_PASSWORD").unwrap_or_default();
    let database =
        std::env::var("MSSQL_BRIDGE_TEST_DATABASE").unwrap_or_else(|_| "master".to_string());
    let port = std::env::var("MSSQL_BRIDGE_TEST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(1433);

    Some(
        MssqlConfig::builder(user, password, database)
            .host(host)
            .port(port)
            .finish(),
    )
}

fn unique_table(prefix: &str) -> String {
    let pid = std::process::id();
    let ns = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}_{pid}_{ns}")
}

#[tokio::test]
async fn test04_query_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = test_config() else {
        return Ok(());
    };
    let bridge = MssqlBridge::new(config);
    let table = wrap(&unique_table("bridge_rt"));

    bridge
        .batch(
            &format!("CREATE TABLE {table} (id INT PRIMARY KEY, name NVARCHAR(64), price DECIMAL(10,2) NULL)"),
            QueryOptions::default(),
        )
        .await?;

    let outcome: Result<(), Box<dyn std::error::Error>> = async {
        bridge
            .execute(
                &format!("INSERT INTO {table} (id, name, price) VALUES ($1, $2, $3)"),
                &Params::positional([
                    SqlParam::from(1_i64),
                    SqlParam::from("Duck"),
                    SqlParam::from(0.99_f64),
                ]),
                QueryOptions::default(),
            )
            .await?;
        bridge
            .execute(
                &format!("INSERT INTO {table} (id, name, price) VALUES (@id, @name, @price)"),
                &Params::named([
                    ("id", SqlParam::from(2_i64)),
                    ("name", SqlParam::from("Goose")),
                    ("price", SqlParam::null()),
                ]),
                QueryOptions::default(),
            )
            .await?;

        let rows = bridge
            .query(
                &format!("SELECT id, name, price FROM {table} ORDER BY id"),
                &Params::default(),
                QueryOptions::default(),
            )
            .await?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.rows[0].get("name"), Some(&SqlValue::Text("Duck".into())));
        assert_eq!(rows.rows[0].get("price"), Some(&SqlValue::Float(0.99)));
        assert_eq!(rows.rows[1].get("price"), Some(&SqlValue::Null));

        // Self-join duplicates the id column; equal values fold to one.
        let folded = bridge
            .query(
                &format!(
                    "SELECT a.id, b.id, a.name FROM {table} a JOIN {table} b ON a.id = b.id WHERE a.id = $1"
                ),
                &Params::positional([SqlParam::from(1_i64)]),
                QueryOptions::default(),
            )
            .await?;
        assert_eq!(folded.rows[0].column_names.len(), 2);
        assert_eq!(folded.rows[0].get("id"), Some(&SqlValue::Int(1)));
        Ok(())
    }
    .await;

    bridge
        .batch(&format!("DROP TABLE {table}"), QueryOptions::default())
        .await?;
    bridge.close().await?;
    outcome
}

#[tokio::test]
async fn test04_connection_reuse_and_credential_invalidation()
-> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = test_config() else {
        return Ok(());
    };
    let bridge = MssqlBridge::new(config);

    // Same key, same password: the registry hands back the same connection.
    let first = bridge.connect().await?;
    let second = bridge.connect().await?;
    assert!(first.ptr_eq(&second));

    // A different password for the same key retires the pooled entry before
    // reconnecting; the bogus credentials then fail to authenticate.
    let denied = bridge
        .connect_with(ConfigOverrides {
            password: Some("definitely-not-the-password".into()),
            ..ConfigOverrides::default()
        })
        .await;
    assert!(denied.is_err());

    // The next connect with the original credentials builds a fresh
    // connection rather than resurrecting the retired one.
    let third = bridge.connect().await?;
    assert!(!third.ptr_eq(&first));
    let rows = third.query("SELECT 1 AS one", &Params::default()).await?;
    assert_eq!(rows.rows[0].get("one"), Some(&SqlValue::Int(1)));

    bridge.close().await?;
    Ok(())
}

#[tokio::test]
async fn test04_scoped_transaction_rolls_back_on_error()
-> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = test_config() else {
        return Ok(());
    };
    let bridge = MssqlBridge::new(config);
    let table = wrap(&unique_table("bridge_sc"));

    bridge
        .batch(
            &format!("CREATE TABLE {table} (id INT PRIMARY KEY)"),
            QueryOptions::default(),
        )
        .await?;

    let outcome: Result<(), Box<dyn std::error::Error>> = async {
        let result = bridge
            .transaction(QueryOptions::default(), |tx| {
                let insert = format!("INSERT INTO {table} (id) VALUES ($1)");
                async move {
                    tx.execute(&insert, &Params::positional([SqlParam::from(1_i64)]))
                        .await?;
                    tx.execute(&insert, &Params::positional([SqlParam::from(2_i64)]))
                        .await?;
                    // A failing statement aborts the unit of work.
                    tx.query(
                        "SELECT * FROM table_that_does_not_exist_anywhere",
                        &Params::default(),
                    )
                    .await?;
                    Ok(())
                }
            })
            .await;
        assert!(result.is_err());

        // Neither insert survived the rollback.
        let rows = bridge
            .query(
                &format!("SELECT id FROM {table}"),
                &Params::default(),
                QueryOptions::default(),
            )
            .await?;
        assert!(rows.is_empty());
        Ok(())
    }
    .await;

    bridge
        .batch(&format!("DROP TABLE {table}"), QueryOptions::default())
        .await?;
    bridge.close().await?;
    outcome
}

#[tokio::test]
async fn test04_transaction_commit_and_rollback() -> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = test_config() else {
        return Ok(());
    };
    let bridge = MssqlBridge::new(config);
    let table = wrap(&unique_table("bridge_tx"));

    bridge
        .batch(
            &format!("CREATE TABLE {table} (id INT PRIMARY KEY)"),
            QueryOptions::default(),
        )
        .await?;

    let outcome: Result<(), Box<dyn std::error::Error>> = async {
        // Scoped: the callback's Ok commits.
        bridge
            .transaction(QueryOptions::default(), |tx| {
                let insert = format!("INSERT INTO {table} (id) VALUES ($1)");
                async move {
                    tx.execute(&insert, &Params::positional([SqlParam::from(1_i64)]))
                        .await?;
                    Ok(())
                }
            })
            .await?;

        // Step-by-step: explicit rollback discards the insert.
        let tx = bridge.begin_transaction(QueryOptions::default()).await?;
        tx.execute(
            &format!("INSERT INTO {table} (id) VALUES ($1)"),
            &Params::positional([SqlParam::from(2_i64)]),
        )
        .await?;
        tx.rollback().await?;

        // A finished handle rejects further work.
        let err = tx
            .execute(
                &format!("INSERT INTO {table} (id) VALUES ($1)"),
                &Params::positional([SqlParam::from(3_i64)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MssqlBridgeError::TransactionError(_)));

        let rows = bridge
            .query(
                &format!("SELECT id FROM {table} ORDER BY id"),
                &Params::default(),
                QueryOptions::default(),
            )
            .await?;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows.rows[0].get("id"), Some(&SqlValue::Int(1)));
        Ok(())
    }
    .await;

    bridge
        .batch(&format!("DROP TABLE {table}"), QueryOptions::default())
        .await?;
    bridge.close().await?;
    outcome
}
