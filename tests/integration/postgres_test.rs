//! PostgreSQL integration tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them.

use pretty_assertions::assert_eq;
use query_gate::config::{BackendSelection, Config, Limits};
use query_gate::db::DataSource;
use query_gate::error::{ErrorKind, StatusClass};
use query_gate::query::Gateway;
use serde_json::json;
use sqlx::{Connection, PgConnection};

/// Helper to get a production test database URL from environment.
fn get_test_database_url() -> Option<String> {
    let url = std::env::var("DATABASE_URL").ok()?;
    match BackendSelection::resolve(Some(&url)) {
        BackendSelection::Production(url) => Some(url),
        BackendSelection::Sample => None,
    }
}

/// Helper to create a gateway against the test database.
fn get_test_gateway() -> Option<Gateway> {
    let config = Config {
        database_url: Some(get_test_database_url()?),
        ..Config::default()
    };
    Gateway::new(&config).ok()
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    assert_eq!(gateway.data_source(), DataSource::Production);

    let set = gateway
        .execute("SELECT 1 AS num, 'hello' AS greeting")
        .await
        .unwrap();

    assert_eq!(set.columns, vec!["num", "greeting"]);
    assert_eq!(set.row_count, 1);
    assert_eq!(set.rows[0]["num"], json!(1));
    assert_eq!(set.rows[0]["greeting"], json!("hello"));
    assert_eq!(set.data_source, None);
}

#[tokio::test]
async fn test_value_shapes() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let set = gateway
        .execute(
            "SELECT TIMESTAMP '2024-01-01 00:00:00' AS ts, \
                    DATE '2024-02-29' AS d, \
                    12.50::numeric AS amount, \
                    '\\xcafe'::bytea AS raw, \
                    true AS flag, \
                    NULL::text AS nothing",
        )
        .await
        .unwrap();

    let row = &set.rows[0];
    assert_eq!(row["ts"], json!("2024-01-01T00:00:00"));
    assert_eq!(row["d"], json!("2024-02-29"));
    assert_eq!(row["amount"], json!(12.5));
    assert_eq!(row["raw"], json!("cafe"));
    assert_eq!(row["flag"], json!(true));
    assert_eq!(row["nothing"], json!(null));
}

#[tokio::test]
async fn test_types_without_native_decoders() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let set = gateway
        .execute(
            "SELECT interval '1 day 02:00' AS iv, \
                    'NaN'::numeric AS nan, \
                    10::numeric ^ 40 AS big, \
                    '12:00+02'::timetz AS ttz, \
                    '10.0.0.1'::inet AS ip, \
                    12.5::money AS cash",
        )
        .await
        .unwrap();

    let row = &set.rows[0];
    assert_eq!(row["iv"], json!("1 day 02:00:00"));
    assert_eq!(row["nan"], json!("NaN"));
    let big = row["big"].as_f64().unwrap();
    assert!(((big - 1e40) / 1e40).abs() < 1e-12, "{big}");
    assert_eq!(row["ttz"], json!("12:00:00+02:00"));
    assert_eq!(row["ip"], json!("10.0.0.1"));
    assert_eq!(row["cash"], json!(12.5));
}

#[tokio::test]
async fn test_enum_values_are_text() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let mut conn = PgConnection::connect(&url).await.unwrap();
    sqlx::raw_sql(
        "DROP TYPE IF EXISTS qg_test_mood; \
         CREATE TYPE qg_test_mood AS ENUM ('happy', 'sad')",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    conn.close().await.unwrap();

    let gateway = get_test_gateway().unwrap();
    let set = gateway
        .execute("SELECT 'happy'::qg_test_mood AS mood, NULL::qg_test_mood AS unset")
        .await
        .unwrap();

    assert_eq!(set.rows[0]["mood"], json!("happy"));
    assert_eq!(set.rows[0]["unset"], json!(null));
}

#[tokio::test]
async fn test_empty_result_keeps_columns() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let set = gateway
        .execute("SELECT 1 AS a, 'x' AS b WHERE false")
        .await
        .unwrap();

    assert_eq!(set.columns, vec!["a", "b"]);
    assert_eq!(set.row_count, 0);
    assert!(!set.truncated);
}

#[tokio::test]
async fn test_truncation_boundary() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let set = gateway
        .execute("SELECT n FROM generate_series(1, 1000) AS n")
        .await
        .unwrap();
    assert_eq!(set.row_count, 1000);
    assert!(set.truncated);
    assert_eq!(set.message.as_deref(), Some("Results truncated to 1000 rows"));

    let set = gateway
        .execute("SELECT n FROM generate_series(1, 999) AS n")
        .await
        .unwrap();
    assert_eq!(set.row_count, 999);
    assert!(!set.truncated);

    let set = gateway
        .execute("SELECT n FROM generate_series(1, 50000) AS n")
        .await
        .unwrap();
    assert_eq!(set.row_count, 1000);
}

#[tokio::test]
async fn test_syntax_error_is_bad_request() {
    let Some(gateway) = get_test_gateway() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = gateway
        .execute("SELECT * FROM nonexistent_table_xyz")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuerySyntaxOrExecutionError);
    assert_eq!(err.status_class(), StatusClass::BadRequest);
    assert!(err.to_body().details.unwrap().contains("nonexistent_table_xyz"));
}

#[tokio::test]
async fn test_statement_timeout_is_unavailable() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let config = Config {
        database_url: Some(url),
        limits: Limits {
            statement_timeout_secs: 1,
            ..Limits::default()
        },
        ..Config::default()
    };
    let gateway = Gateway::new(&config).unwrap();

    let err = gateway.execute("SELECT pg_sleep(5)").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    assert!(err.is_retryable());
}
