//! Live change feed of outbox inserts.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::outbox::OutboxEvent;

/// Source of live outbox insert notifications.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Opens a subscription to newly inserted `pending` events.
    async fn subscribe(&self) -> Result<Box<dyn ChangeSubscription>, DomainError>;
}

/// An open change-feed subscription. Dropping it releases the feed.
#[async_trait]
pub trait ChangeSubscription: Send {
    /// Waits for the next pending event.
    ///
    /// `Ok(None)` means the feed was closed or lost its connection; the
    /// subscription is dead and a new one must be opened.
    async fn next_event(&mut self) -> Result<Option<OutboxEvent>, DomainError>;
}
