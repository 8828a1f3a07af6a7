//! Health Check API Tests

use axum::http::{Method, StatusCode};

use crate::common::TestApp;

#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert!(response.body["version"].is_string());
}

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health/live", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_storage_and_gateway() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health/ready", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["checks"]["storage"]["backend"], "memory");
    assert_eq!(response.body["checks"]["websocket"]["active_connections"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint_is_exposed() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/metrics", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    let content_type = response.headers["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health", None, None).await;

    let request_id = response.headers["x-request-id"].to_str().unwrap();
    assert!(!request_id.is_empty());
}
