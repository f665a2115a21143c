//! Health and status endpoints.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;
use tracing::warn;

use crate::state::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Component liveness.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Always `true` when the API answers.
    pub api: bool,
    /// Whether the store answered a trivial query.
    pub database: bool,
    /// Whether the change-feed subscription is open.
    pub listener: bool,
}

/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /api/status
async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let database = match state.outbox.list_recent(1).await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "database probe failed");
            false
        }
    };

    Json(StatusResponse {
        api: true,
        database,
        listener: state.pipeline.is_listener_alive(),
    })
}

/// Returns the health and status router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(status))
}
