//! Read-only routes over the outbox log.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::get};
use courier_core::error::DomainError;
use courier_core::outbox::OutboxEvent;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const RECENT_LIMIT: i64 = 20;

/// GET /
#[instrument(skip(state))]
async fn list_events(State(state): State<AppState>) -> Result<Json<Vec<OutboxEvent>>, ApiError> {
    Ok(Json(state.outbox.list_recent(RECENT_LIMIT).await?))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OutboxEvent>, ApiError> {
    state
        .outbox
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or(ApiError(DomainError::AggregateNotFound(id)))
}

/// Returns the outbox router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events))
        .route("/{id}", get(get_event))
}
