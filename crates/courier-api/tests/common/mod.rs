//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use courier_accounts::application::notification_handlers::user_notification_handlers;
use courier_api::build_router;
use courier_api::state::AppState;
use courier_core::clock::{Clock, SystemClock};
use courier_core::feed::ChangeFeed;
use courier_core::sink::DeliverySink;
use courier_pipeline::config::{PipelineConfig, ScannerConfig};
use courier_pipeline::registry::HandlerRegistry;
use courier_pipeline::retry::RetryPolicy;
use courier_pipeline::runtime::{self, PipelineComponents, PipelineHandle};
use courier_pipeline::status::PipelineStatus;
use courier_test_support::InMemoryStore;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// The router and the in-memory store behind it.
pub struct TestApp {
    pub store: Arc<InMemoryStore>,
    pub router: Router,
    pub pipeline: Option<PipelineHandle>,
}

fn app_state(store: &Arc<InMemoryStore>, clock: Arc<dyn Clock>, status: PipelineStatus) -> AppState {
    AppState::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        clock,
        status,
    )
}

/// Build the full app router over an in-memory store, with no pipeline
/// running. Uses the same route structure as `main.rs`.
pub fn build_test_app() -> TestApp {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryStore::new(Arc::clone(&clock)));
    let router = build_router(app_state(&store, clock, PipelineStatus::new()));
    TestApp {
        store,
        router,
        pipeline: None,
    }
}

/// Build the full app with the pipeline running against the same store.
///
/// The scanner polls every 10ms and deliveries are not retried.
pub fn build_test_app_with_pipeline(sink: Arc<dyn DeliverySink>, change_feed: bool) -> TestApp {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(InMemoryStore::new(Arc::clone(&clock)));

    let mut registry = HandlerRegistry::new();
    for (event_type, handler) in user_notification_handlers(store.clone()) {
        registry.register(event_type, handler);
    }

    let config = PipelineConfig {
        change_feed_enabled: change_feed,
        scanner: ScannerConfig {
            interval: Duration::from_millis(10),
            ..ScannerConfig::default()
        },
        delivery_retry: RetryPolicy::no_retry(),
        ..PipelineConfig::default()
    };
    let pipeline = runtime::start(
        config,
        PipelineComponents {
            outbox: store.clone(),
            notifications: store.clone(),
            feed: Some(store.clone() as Arc<dyn ChangeFeed>),
            registry,
            sink,
            clock: Arc::clone(&clock),
        },
    );

    let router = build_router(app_state(&store, clock, pipeline.status()));
    TestApp {
        store,
        router,
        pipeline: Some(pipeline),
    }
}

/// Polls `condition` every 5ms for up to two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body_bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap()
    };

    (status, json)
}

fn json_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("POST", uri, body)).await
}

/// Send a PUT request with a JSON body and return the response.
pub async fn put_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    send(app, json_request("PUT", uri, body)).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Send a DELETE request and return the response.
pub async fn delete(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}
