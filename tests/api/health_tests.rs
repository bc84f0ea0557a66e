//! Health Check API Tests

use axum::http::StatusCode;

use crate::common::{json_body, TestApp};

/// Test basic health check endpoint returns 200 OK
#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new().await;

    let response = app.get("/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
}

/// Test liveness probe endpoint
#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new().await;

    let response = app.get("/health/live").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "alive");
}

/// Readiness reports store, bus and registry state
#[tokio::test]
async fn test_readiness_probe() {
    let app = TestApp::new().await;

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["checks"]["store"]["status"], "healthy");
    assert_eq!(json["checks"]["bus"]["status"], "healthy");
    assert_eq!(json["checks"]["websocket"]["active_connections"], 0);
}

/// Readiness fails once the registry is shut down
#[tokio::test]
async fn test_readiness_after_registry_shutdown() {
    let app = TestApp::new().await;
    app.relay.hub().shutdown().await;

    let response = app.get("/health/ready").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new().await;

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("chat_relay_"));
}
