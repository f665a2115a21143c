//! Read-only routes over the notification log.

use axum::extract::{Path, State};
use axum::{Json, Router, routing::get};
use courier_core::error::DomainError;
use courier_core::notification::Notification;
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const RECENT_LIMIT: i64 = 20;

/// GET /
#[instrument(skip(state))]
async fn list_notifications(
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(state.notifications.list_recent(RECENT_LIMIT).await?))
}

/// GET /{id}
#[instrument(skip(state))]
async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    state
        .notifications
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or(ApiError(DomainError::AggregateNotFound(id)))
}

/// Returns the notifications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/{id}", get(get_notification))
}
