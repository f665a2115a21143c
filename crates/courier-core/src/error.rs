//! Error types shared across the pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error for store access and aggregate mutations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// The mutation violated a uniqueness or existence constraint. Nothing
    /// was written.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A validation error in command input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The store is unavailable or the operation timed out.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

/// A notification could not be delivered.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The delivery sink rejected or failed the delivery.
    #[error("delivery sink failed: {0}")]
    Sink(String),

    /// Every allowed attempt failed; the notification is now `failed`.
    #[error("delivery of notification {notification_id} failed after {attempts} attempt(s): {reason}")]
    Exhausted {
        /// The notification that could not be delivered.
        notification_id: Uuid,
        /// Number of sink invocations made.
        attempts: i32,
        /// The last sink error.
        reason: String,
    },

    /// Recording the delivery outcome failed.
    #[error(transparent)]
    Store(#[from] DomainError),
}
