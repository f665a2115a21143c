//! Event handler port.

use async_trait::async_trait;
use thiserror::Error;

use crate::error::DomainError;
use crate::notification::NewNotification;
use crate::outbox::OutboxEvent;

/// Business failure while processing a claimed event. Never escapes the
/// dispatcher; the event is marked failed instead.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The payload did not match the event type.
    #[error("invalid payload for {event_type}: {source}")]
    InvalidPayload {
        /// The event type being handled.
        event_type: String,
        /// The deserialization error.
        source: serde_json::Error,
    },

    /// An auxiliary read or write failed.
    #[error(transparent)]
    Store(#[from] DomainError),

    /// The handler refused the event.
    #[error("{0}")]
    Rejected(String),
}

/// Reacts to one kind of outbox event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Produces zero or one notification for a claimed event.
    async fn handle(&self, event: &OutboxEvent) -> Result<Option<NewNotification>, HandlerError>;
}
