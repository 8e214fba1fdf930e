//! Sample database integration tests.
//!
//! Each test seeds its own SQLite file in a temporary directory and routes
//! queries through the gateway with the `sample` sentinel.

use pretty_assertions::assert_eq;
use query_gate::config::{Config, Limits};
use query_gate::db::{sample_database_info, seed_sample_database, DataSource};
use query_gate::error::{ErrorKind, GatewayError, StatusClass};
use query_gate::query::{Gateway, QueryRequest, ResponseBody};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

const SEQUENCE_SQL: &str =
    "WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < {count}) \
     SELECT n FROM seq";

fn sample_config(path: &Path) -> Config {
    Config {
        database_url: Some("sample".to_string()),
        sample_db_path: Some(path.to_path_buf()),
        limits: Limits::default(),
    }
}

async fn seeded_gateway() -> (TempDir, Gateway) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.db");
    seed_sample_database(&path, false).await.unwrap();
    let gateway = Gateway::new(&sample_config(&path)).unwrap();
    (dir, gateway)
}

fn sequence(count: usize) -> String {
    SEQUENCE_SQL.replace("{count}", &count.to_string())
}

#[tokio::test]
async fn test_sentinel_selects_sample_backend() {
    let (_dir, gateway) = seeded_gateway().await;
    assert_eq!(gateway.data_source(), DataSource::Sample);

    let set = gateway
        .execute("SELECT COUNT(*) AS n FROM workspaces_workspace")
        .await
        .unwrap();

    assert_eq!(set.columns, vec!["n"]);
    assert_eq!(set.row_count, 1);
    assert!(set.rows[0]["n"].is_number());
    assert_eq!(set.data_source, Some(DataSource::Sample));
}

#[tokio::test]
async fn test_sentinel_is_case_insensitive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.db");
    seed_sample_database(&path, false).await.unwrap();

    let mut config = sample_config(&path);
    config.database_url = Some("  SAMPLE ".to_string());
    let gateway = Gateway::new(&config).unwrap();
    assert_eq!(gateway.data_source(), DataSource::Sample);
}

#[tokio::test]
async fn test_timestamp_serialization() {
    let (_dir, gateway) = seeded_gateway().await;

    let set = gateway
        .execute("SELECT name, created, uninstalled FROM workspaces_workspace WHERE id = 1")
        .await
        .unwrap();

    assert_eq!(set.row_count, 1);
    assert_eq!(set.rows[0]["created"], json!("2024-01-01T00:00:00"));
    assert_eq!(set.rows[0]["uninstalled"], json!(false));
    assert_eq!(set.rows[0]["name"], json!("Acme Robotics"));
}

#[tokio::test]
async fn test_numeric_amounts_serialize_as_floats() {
    let (_dir, gateway) = seeded_gateway().await;

    let set = gateway
        .execute("SELECT id, amount FROM workspace_events WHERE id IN (2, 4) ORDER BY id")
        .await
        .unwrap();

    assert_eq!(set.rows[0]["amount"], json!(49.0));
    assert!(set.rows[0]["amount"].is_f64());
    assert_eq!(set.rows[1]["amount"], json!(99.5));
    assert_eq!(
        serde_json::to_string(&set.rows[0]).unwrap(),
        r#"{"id":2,"amount":49.0}"#
    );
}

#[tokio::test]
async fn test_exactly_row_cap_is_truncated() {
    let (_dir, gateway) = seeded_gateway().await;

    let set = gateway.execute(&sequence(1000)).await.unwrap();
    assert_eq!(set.row_count, 1000);
    assert!(set.truncated);
    assert_eq!(set.message.as_deref(), Some("Results truncated to 1000 rows"));
}

#[tokio::test]
async fn test_below_row_cap_is_not_truncated() {
    let (_dir, gateway) = seeded_gateway().await;

    let set = gateway.execute(&sequence(999)).await.unwrap();
    assert_eq!(set.row_count, 999);
    assert!(!set.truncated);
    assert_eq!(set.message, None);
}

#[tokio::test]
async fn test_large_result_is_capped() {
    let (_dir, gateway) = seeded_gateway().await;

    let set = gateway.execute(&sequence(5000)).await.unwrap();
    assert_eq!(set.row_count, 1000);
    assert_eq!(set.rows.len(), 1000);
    assert!(set.truncated);
}

#[tokio::test]
async fn test_cte_and_join() {
    let (_dir, gateway) = seeded_gateway().await;

    let set = gateway
        .execute(
            "WITH active AS (SELECT id, name FROM workspaces_workspace WHERE uninstalled = 0) \
             SELECT a.name, COUNT(e.id) AS events \
             FROM active a LEFT JOIN workspace_events e ON e.workspace_id = a.id \
             GROUP BY a.name ORDER BY a.name",
        )
        .await
        .unwrap();

    assert_eq!(set.columns, vec!["name", "events"]);
    assert!(set.row_count > 0);
    assert!(!set.truncated);
}

#[tokio::test]
async fn test_write_query_is_rejected() {
    let (_dir, gateway) = seeded_gateway().await;

    let err = gateway
        .execute("DELETE FROM workspaces_workspace")
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::NotReadOnly));
    assert_eq!(err.status_class(), StatusClass::Forbidden);

    let set = gateway
        .execute("SELECT COUNT(*) AS n FROM workspaces_workspace")
        .await
        .unwrap();
    assert_eq!(set.rows[0]["n"], json!(12));
}

#[tokio::test]
async fn test_unknown_table_is_query_error() {
    let (_dir, gateway) = seeded_gateway().await;

    let err = gateway.execute("SELECT * FROM no_such_table").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QuerySyntaxOrExecutionError);

    let body = err.to_body();
    assert_eq!(body.error, "Query error");
    assert!(body.details.unwrap().contains("no_such_table"));
}

#[tokio::test]
async fn test_missing_sample_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");
    let gateway = Gateway::new(&sample_config(&path)).unwrap();

    let err = gateway.execute("SELECT 1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SampleDataMissing);
    assert_eq!(err.status_class(), StatusClass::InternalError);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_handle_request_wire_shape() {
    let (_dir, gateway) = seeded_gateway().await;

    let request: QueryRequest =
        serde_json::from_str(r#"{"query": "SELECT id, name FROM workspaces_workspace ORDER BY id LIMIT 2"}"#)
            .unwrap();
    let body = ResponseBody::from(gateway.handle(request).await);
    let value = serde_json::to_value(&body).unwrap();

    assert_eq!(value["columns"], json!(["id", "name"]));
    assert_eq!(value["row_count"], json!(2));
    assert_eq!(value["truncated"], json!(false));
    assert_eq!(value["data_source"], json!("sample"));
    assert!(value.get("message").is_none());
    assert_eq!(value["rows"][0]["id"], json!(1));
}

#[tokio::test]
async fn test_sample_info_after_seed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.db");
    seed_sample_database(&path, false).await.unwrap();

    let info = sample_database_info(&path, Limits::default().busy_timeout())
        .await
        .unwrap();
    assert_eq!(info.tables.get("workspaces_workspace"), Some(&12));
    assert!(info.total_rows > 12);
}
