//! Routes for the user accounts context.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use courier_accounts::application::{command_handlers, query_handlers};
use courier_accounts::application::query_handlers::UserView;
use courier_accounts::domain::commands;
use courier_core::user::{NotificationPreferences, UserChanges};

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Requested login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Optional notification opt-ins.
    #[serde(default)]
    pub preferences: Option<NotificationPreferences>,
}

/// Response body for DELETE /{id}.
#[derive(Debug, Serialize)]
pub struct DeleteUserResponse {
    /// Always `true`; failures are reported as errors.
    pub success: bool,
    /// The user as it was before removal.
    pub deleted_user: UserView,
}

/// GET /
#[instrument(skip(state))]
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserView>>, ApiError> {
    let users = query_handlers::list_users(&*state.users).await?;
    Ok(Json(users))
}

/// POST /
#[instrument(skip(state, request), fields(username = %request.username))]
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let command = commands::CreateUser {
        username: request.username,
        email: request.email,
        preferences: request.preferences,
    };

    let (user, event) =
        command_handlers::handle_create_user(&command, state.clock.as_ref(), &*state.writer)
            .await?;

    info!(user_id = %user.id, event_id = %event.id, "create_user accepted");
    Ok((StatusCode::CREATED, Json(UserView::from(user))))
}

/// PUT /{id}
#[instrument(skip(state, changes))]
async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(changes): Json<UserChanges>,
) -> Result<Json<UserView>, ApiError> {
    let command = commands::UpdateUser {
        user_id: id,
        changes,
    };

    let (user, event) =
        command_handlers::handle_update_user(&command, &*state.users, &*state.writer).await?;

    info!(event_id = %event.id, "update_user accepted");
    Ok(Json(UserView::from(user)))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteUserResponse>, ApiError> {
    let command = commands::DeleteUser { user_id: id };

    let (user, event) =
        command_handlers::handle_delete_user(&command, &*state.users, &*state.writer).await?;

    info!(event_id = %event.id, "delete_user accepted");
    Ok(Json(DeleteUserResponse {
        success: true,
        deleted_user: UserView::from(user),
    }))
}

/// Returns the router for the user accounts context.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", put(update_user).delete(delete_user))
}
