//! Courier: HTTP API over the user accounts context, the outbox and the
//! notification log, and host process for the outbox pipeline.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    // TODO: Replace CorsLayer::permissive() with restricted origins once the
    // dashboard has a fixed deployment origin.
    Router::new()
        .merge(routes::health::router())
        .nest("/api/users", routes::users::router())
        .nest("/api/outbox", routes::outbox::router())
        .nest("/api/notifications", routes::notifications::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
