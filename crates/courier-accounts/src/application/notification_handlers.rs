//! Notification handlers for `user.*` outbox events.
//!
//! Each handler turns one claimed event into at most one email
//! notification. Sending is left to the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::handler::{EventHandler, HandlerError};
use courier_core::notification::{NewNotification, NotificationChannel, NotificationContent};
use courier_core::outbox::OutboxEvent;
use courier_core::repository::UserRepository;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::domain::events::{
    USER_CREATED, USER_DELETED, USER_UPDATED, UserCreated, UserDeleted, UserUpdated,
};

/// Sends a welcome email for `user.created`.
#[derive(Debug, Default)]
pub struct UserCreatedHandler;

/// Sends an account-change email for `user.updated`, if the user still
/// exists and has email notifications enabled.
pub struct UserUpdatedHandler {
    users: Arc<dyn UserRepository>,
}

impl UserUpdatedHandler {
    /// Creates the handler, reading preferences from `users`.
    #[must_use]
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self { users }
    }
}

/// Sends a deletion confirmation for `user.deleted`.
#[derive(Debug, Default)]
pub struct UserDeletedHandler;

/// Every `user.*` handler keyed by the event type it serves.
#[must_use]
pub fn user_notification_handlers(
    users: Arc<dyn UserRepository>,
) -> Vec<(&'static str, Arc<dyn EventHandler>)> {
    let created: Arc<dyn EventHandler> = Arc::new(UserCreatedHandler);
    let updated: Arc<dyn EventHandler> = Arc::new(UserUpdatedHandler::new(users));
    let deleted: Arc<dyn EventHandler> = Arc::new(UserDeletedHandler);
    vec![
        (USER_CREATED, created),
        (USER_UPDATED, updated),
        (USER_DELETED, deleted),
    ]
}

#[async_trait]
impl EventHandler for UserCreatedHandler {
    async fn handle(&self, event: &OutboxEvent) -> Result<Option<NewNotification>, HandlerError> {
        let payload: UserCreated = parse(event)?;
        Ok(Some(email(
            event,
            payload.user_id,
            "Welcome to our platform!",
            format!(
                "Hi {}, welcome to our platform! We're excited to have you on board.",
                payload.username
            ),
            json!({ "username": payload.username, "email": payload.email }),
        )))
    }
}

#[async_trait]
impl EventHandler for UserUpdatedHandler {
    async fn handle(&self, event: &OutboxEvent) -> Result<Option<NewNotification>, HandlerError> {
        let payload: UserUpdated = parse(event)?;

        let Some(user) = self.users.find_by_id(payload.user_id).await? else {
            debug!(event_id = %event.id, user_id = %payload.user_id, "user no longer exists; no notification");
            return Ok(None);
        };
        if !user.preferences.email_notifications {
            debug!(event_id = %event.id, user_id = %user.id, "email notifications disabled; no notification");
            return Ok(None);
        }

        Ok(Some(email(
            event,
            payload.user_id,
            "Your account was updated",
            format!(
                "Hi {}, your account information was updated. The following fields were changed: {}.",
                payload.username,
                payload.updated_fields.join(", ")
            ),
            json!({ "updated_fields": payload.updated_fields }),
        )))
    }
}

#[async_trait]
impl EventHandler for UserDeletedHandler {
    async fn handle(&self, event: &OutboxEvent) -> Result<Option<NewNotification>, HandlerError> {
        let payload: UserDeleted = parse(event)?;
        Ok(Some(email(
            event,
            payload.user_id,
            "Account Deletion Confirmation",
            format!(
                "Hi {}, we're confirming that your account has been deleted as requested.",
                payload.username
            ),
            json!({ "username": payload.username, "email": payload.email }),
        )))
    }
}

fn parse<T: DeserializeOwned>(event: &OutboxEvent) -> Result<T, HandlerError> {
    serde_json::from_value(event.payload.clone()).map_err(|source| HandlerError::InvalidPayload {
        event_type: event.event_type.clone(),
        source,
    })
}

fn email(
    event: &OutboxEvent,
    user_id: Uuid,
    subject: &str,
    body: String,
    data: serde_json::Value,
) -> NewNotification {
    NewNotification {
        user_id,
        outbox_event_id: event.id,
        channel: NotificationChannel::Email,
        content: NotificationContent {
            subject: subject.to_owned(),
            body,
            data: Some(data),
        },
    }
}
