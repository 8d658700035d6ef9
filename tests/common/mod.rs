//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use licreg::config::CorsConfig;
use licreg::server::{build_router, AppState, Database, LicenseRegistry};

/// A fresh in-memory database with the schema applied.
pub async fn setup_in_memory_db() -> Arc<Database> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory SQLite");

    let db = Arc::new(Database::SQLite(pool));
    db.init_schema().await.expect("failed to create schema");
    db
}

/// A router over a fresh database, plus the registry behind it.
pub async fn setup_test_app() -> (Router, LicenseRegistry) {
    let registry = LicenseRegistry::new(setup_in_memory_db().await, "SKU");
    let app = build_router(AppState::new(registry.clone()), &CorsConfig::default());
    (app, registry)
}

/// Send a request with an optional JSON body and decode the JSON response.
pub async fn json_request(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let body_bytes = body
        .map(|v| serde_json::to_vec(&v).unwrap())
        .unwrap_or_default();

    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body_bytes))
        .unwrap();

    send(app, request).await
}

/// Send a request with a raw body and no Content-Type header.
pub async fn raw_request(app: &Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap();

    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

/// Create a license through the API and return the response body.
pub async fn create_license(app: &Router, body: Value) -> Value {
    let (status, body) = json_request(app, "POST", "/api/admin/create", Some(body)).await;
    assert_eq!(status, StatusCode::OK, "create failed: {body}");
    body
}

/// Parse an `expiresAt`/`expires_at` field.
pub fn parse_time(value: &Value) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(value.as_str().expect("timestamp is a string"))
        .expect("timestamp is RFC 3339")
        .with_timezone(&chrono::Utc)
}
