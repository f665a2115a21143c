//! Integration tests for the user routes.

mod common;

use axum::http::StatusCode;
use courier_core::outbox::OutboxStatus;
use serde_json::json;

#[tokio::test]
async fn test_create_then_list_users() {
    // Arrange
    let app = common::build_test_app();

    // Act
    let (status, created) = common::post_json(
        app.router.clone(),
        "/api/users",
        &json!({
            "username": "alice",
            "email": "alice@example.com",
            "preferences": { "email_notifications": false, "push_notifications": true }
        }),
    )
    .await;
    let (list_status, users) = common::get_json(app.router, "/api/users").await;

    // Assert
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["preferences"]["email_notifications"], false);
    assert_eq!(list_status, StatusCode::OK);
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert_eq!(users[0]["id"], created["id"]);
}

#[tokio::test]
async fn test_write_that_fails_leaves_no_user_and_no_event() {
    // Arrange
    let app = common::build_test_app();
    app.store.fail_outbox_writes(true);

    // Act
    let (status, json) = common::post_json(
        app.router,
        "/api/users",
        &json!({ "username": "alice", "email": "alice@example.com" }),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "infrastructure_error");
    assert!(app.store.users().is_empty());
    assert!(app.store.outbox_events().is_empty());
}

#[tokio::test]
async fn test_duplicate_email_returns_409_without_an_event() {
    let app = common::build_test_app();
    common::post_json(
        app.router.clone(),
        "/api/users",
        &json!({ "username": "alice", "email": "alice@example.com" }),
    )
    .await;

    let (status, json) = common::post_json(
        app.router,
        "/api/users",
        &json!({ "username": "bob", "email": "alice@example.com" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
    assert_eq!(app.store.outbox_events().len(), 1);
}

#[tokio::test]
async fn test_empty_update_returns_400() {
    let app = common::build_test_app();
    let (_, created) = common::post_json(
        app.router.clone(),
        "/api/users",
        &json!({ "username": "alice", "email": "alice@example.com" }),
    )
    .await;

    let (status, _) = common::put_json(
        app.router,
        &format!("/api/users/{}", created["id"].as_str().unwrap()),
        &json!({}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.outbox_events().len(), 1);
}

#[tokio::test]
async fn test_every_mutation_writes_one_pending_event() {
    // Arrange
    let app = common::build_test_app();
    let (_, created) = common::post_json(
        app.router.clone(),
        "/api/users",
        &json!({ "username": "alice", "email": "alice@example.com" }),
    )
    .await;
    let uri = format!("/api/users/{}", created["id"].as_str().unwrap());

    // Act
    common::put_json(app.router.clone(), &uri, &json!({ "email": "a@new.example.com" })).await;
    let (status, deleted) = common::delete(app.router.clone(), &uri).await;
    let (missing, _) = common::delete(app.router, &uri).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["deleted_user"]["email"], "a@new.example.com");
    assert_eq!(missing, StatusCode::NOT_FOUND);
    let events = app.store.outbox_events();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["user.created", "user.updated", "user.deleted"]);
    assert!(events.iter().all(|e| e.status == OutboxStatus::Pending));
    assert_eq!(events[1].payload["updated_fields"], json!(["email"]));
}
