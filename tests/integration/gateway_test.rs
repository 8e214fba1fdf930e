//! Gateway contract tests against in-memory backends.

use pretty_assertions::assert_eq;
use query_gate::config::{Config, Limits};
use query_gate::db::{Cell, DataSource, FailingBackend, MockBackend};
use query_gate::error::{GatewayError, StatusClass};
use query_gate::query::{Gateway, QueryRequest, ResponseBody};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_mutating_queries_are_rejected_before_backend() {
    let mock = Arc::new(MockBackend::new(DataSource::Production));
    let gateway = Gateway::with_backend(mock.clone(), Limits::default());

    for sql in [
        "INSERT INTO users (name) VALUES ('x')",
        "update users set name = 'x'",
        "/* harmless */ DELETE FROM users",
        "DROP TABLE users",
        "TRUNCATE users",
        "GRANT SELECT ON users TO bob",
        "SELECT 1; DROP TABLE users",
        "SELECT 'please drop me'",
    ] {
        let body = ResponseBody::from(gateway.execute(sql).await);
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"error": "Only SELECT queries are allowed"}),
            "{sql}"
        );
    }
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_comment_hiding_keyword_is_accepted() {
    let mock = Arc::new(MockBackend::sequence(DataSource::Production, 1));
    let gateway = Gateway::with_backend(mock.clone(), Limits::default());

    let set = gateway.execute("SELECT 1 -- DROP TABLE x").await.unwrap();
    assert_eq!(set.row_count, 1);
    assert_eq!(mock.calls(), 1);
}

#[tokio::test]
async fn test_missing_query_field() {
    let mock = Arc::new(MockBackend::new(DataSource::Production));
    let gateway = Gateway::with_backend(mock.clone(), Limits::default());

    let request: QueryRequest = serde_json::from_str("{}").unwrap();
    let err = gateway.handle(request).await.unwrap_err();
    assert_eq!(err.status_class(), StatusClass::BadRequest);
    assert_eq!(
        serde_json::to_value(err.to_body()).unwrap(),
        json!({"error": "Query parameter is required"})
    );

    let err = gateway.handle(QueryRequest::new("  ")).await.unwrap_err();
    assert!(matches!(err, GatewayError::MissingQuery));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_production_success_shape() {
    let mock = Arc::new(MockBackend::with_rows(
        DataSource::Production,
        ["id", "payload", "amount"],
        vec![vec![
            Cell::Int(7),
            Cell::Bytes(vec![0xde, 0xad]),
            Cell::Float(1.25),
        ]],
    ));
    let gateway = Gateway::with_backend(mock, Limits::default());

    let body = ResponseBody::from(gateway.execute("SELECT * FROM t").await);
    let value = serde_json::to_value(&body).unwrap();
    assert_eq!(
        value,
        json!({
            "columns": ["id", "payload", "amount"],
            "rows": [{"id": 7, "payload": "dead", "amount": 1.25}],
            "row_count": 1,
            "truncated": false
        })
    );
    assert_eq!(
        serde_json::to_string(&body).unwrap(),
        r#"{"columns":["id","payload","amount"],"rows":[{"id":7,"payload":"dead","amount":1.25}],"row_count":1,"truncated":false}"#
    );
}

#[tokio::test]
async fn test_custom_row_cap() {
    let limits = Limits {
        row_cap: 5,
        ..Limits::default()
    };
    let mock = Arc::new(MockBackend::sequence(DataSource::Production, 20).with_row_cap(5));
    let gateway = Gateway::with_backend(mock, limits);

    let set = gateway.execute("SELECT n FROM seq").await.unwrap();
    assert_eq!(set.row_count, 5);
    assert_eq!(set.message.as_deref(), Some("Results truncated to 5 rows"));
}

#[tokio::test]
async fn test_unavailable_backend_maps_to_service_unavailable() {
    let failing = Arc::new(FailingBackend::new(DataSource::Production, || {
        GatewayError::unavailable("connection refused")
    }));
    let gateway = Gateway::with_backend(failing, Limits::default());

    let err = gateway.execute("SELECT 1").await.unwrap_err();
    assert_eq!(err.status_class(), StatusClass::ServiceUnavailable);
    assert!(err.is_retryable());
    assert_eq!(
        serde_json::to_value(err.to_body()).unwrap(),
        json!({"error": "Database connection failed", "details": "connection refused"})
    );
}

#[tokio::test]
async fn test_internal_errors_hide_details() {
    let failing = Arc::new(FailingBackend::new(DataSource::Sample, || {
        GatewayError::internal("decoder panicked on column 3")
    }));
    let gateway = Gateway::with_backend(failing, Limits::default());

    let err = gateway.execute("SELECT 1").await.unwrap_err();
    assert_eq!(err.status_class(), StatusClass::InternalError);
    assert_eq!(
        serde_json::to_value(err.to_body()).unwrap(),
        json!({"error": "Internal error"})
    );
}

#[tokio::test]
async fn test_shared_across_tasks() {
    let mock = Arc::new(MockBackend::sequence(DataSource::Sample, 3));
    let gateway = Arc::new(Gateway::with_backend(mock.clone(), Limits::default()));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gateway = Arc::clone(&gateway);
            tokio::spawn(async move { gateway.execute("SELECT n FROM seq").await })
        })
        .collect();

    for handle in handles {
        let set = handle.await.unwrap().unwrap();
        assert_eq!(set.row_count, 3);
    }
    assert_eq!(mock.calls(), 8);
}

#[test]
fn test_new_rejects_invalid_production_url() {
    let config = Config {
        database_url: Some("mysql://root@localhost/app".to_string()),
        ..Config::default()
    };
    let err = Gateway::new(&config).unwrap_err();
    assert!(matches!(err, GatewayError::Config(_)));
}

#[test]
fn test_new_rejects_zero_row_cap() {
    let config = Config {
        database_url: Some("sample".to_string()),
        limits: Limits {
            row_cap: 0,
            ..Limits::default()
        },
        ..Config::default()
    };
    assert!(Gateway::new(&config).is_err());
}
