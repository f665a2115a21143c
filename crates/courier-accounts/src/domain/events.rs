//! Outbox event payloads for the user accounts context.

use courier_core::outbox::NewOutboxEvent;
use courier_core::user::{USER_AGGREGATE_TYPE, User};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Event type written when a user is created.
pub const USER_CREATED: &str = "user.created";
/// Event type written when a user is updated.
pub const USER_UPDATED: &str = "user.updated";
/// Event type written when a user is deleted.
pub const USER_DELETED: &str = "user.deleted";

/// Payload of `user.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    /// The new user.
    pub user_id: Uuid,
    /// Login name at creation.
    pub username: String,
    /// Email at creation.
    pub email: String,
}

/// Payload of `user.updated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserUpdated {
    /// The changed user.
    pub user_id: Uuid,
    /// Login name after the update.
    pub username: String,
    /// Names of the fields the update touched.
    pub updated_fields: Vec<String>,
}

/// Payload of `user.deleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDeleted {
    /// The removed user.
    pub user_id: Uuid,
    /// Login name before removal.
    pub username: String,
    /// Email before removal.
    pub email: String,
}

/// Builds the `user.created` event for a freshly inserted user.
#[must_use]
pub fn user_created(user: &User) -> NewOutboxEvent {
    new_event(
        USER_CREATED,
        user.id,
        json!({
            "user_id": user.id,
            "username": user.username,
            "email": user.email,
        }),
    )
}

/// Builds the `user.updated` event from the post-update record.
#[must_use]
pub fn user_updated(user: &User, updated_fields: &[String]) -> NewOutboxEvent {
    new_event(
        USER_UPDATED,
        user.id,
        json!({
            "user_id": user.id,
            "username": user.username,
            "updated_fields": updated_fields,
        }),
    )
}

/// Builds the `user.deleted` event from the record as it was before removal.
#[must_use]
pub fn user_deleted(user: &User) -> NewOutboxEvent {
    new_event(
        USER_DELETED,
        user.id,
        json!({
            "user_id": user.id,
            "username": user.username,
            "email": user.email,
        }),
    )
}

fn new_event(event_type: &str, aggregate_id: Uuid, payload: serde_json::Value) -> NewOutboxEvent {
    NewOutboxEvent {
        event_type: event_type.to_owned(),
        aggregate_type: USER_AGGREGATE_TYPE.to_owned(),
        aggregate_id,
        payload,
    }
}
