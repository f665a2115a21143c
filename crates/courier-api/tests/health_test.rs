//! Integration tests for the health and status endpoints.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use courier_test_support::RecordingSink;

#[tokio::test]
async fn test_health_returns_200_with_status_ok() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_status_reports_database_and_idle_listener() {
    // Arrange
    let app = common::build_test_app();

    // Act
    let (status, json) = common::get_json(app.router, "/api/status").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["api"], true);
    assert_eq!(json["database"], true);
    assert_eq!(json["listener"], false);
}

#[tokio::test]
async fn test_status_reports_unreachable_database() {
    let app = common::build_test_app();
    app.store.set_unavailable(true);

    let (status, json) = common::get_json(app.router, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["api"], true);
    assert_eq!(json["database"], false);
}

#[tokio::test]
async fn test_status_reports_live_listener() {
    // Arrange
    let app = common::build_test_app_with_pipeline(Arc::new(RecordingSink::new()), true);
    let pipeline = app.pipeline.unwrap();
    let status_view = pipeline.status();
    common::wait_until(|| status_view.is_listener_alive()).await;

    // Act
    let (status, json) = common::get_json(app.router, "/api/status").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["listener"], true);
    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let app = common::build_test_app();

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/api/nonexistent")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = tower::ServiceExt::oneshot(app.router, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
