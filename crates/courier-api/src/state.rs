//! Shared application state.

use std::sync::Arc;

use courier_core::clock::Clock;
use courier_core::repository::{
    NotificationStore, OutboxStore, TransactionalWriter, UserRepository,
};
use courier_pipeline::status::PipelineStatus;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Read access to users.
    pub users: Arc<dyn UserRepository>,
    /// Applies user mutations together with their outbox events.
    pub writer: Arc<dyn TransactionalWriter>,
    /// Outbox log, read by the outbox routes and probed by `/api/status`.
    pub outbox: Arc<dyn OutboxStore>,
    /// Notification log.
    pub notifications: Arc<dyn NotificationStore>,
    /// Source of creation timestamps.
    pub clock: Arc<dyn Clock>,
    /// Liveness of the running pipeline.
    pub pipeline: PipelineStatus,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        writer: Arc<dyn TransactionalWriter>,
        outbox: Arc<dyn OutboxStore>,
        notifications: Arc<dyn NotificationStore>,
        clock: Arc<dyn Clock>,
        pipeline: PipelineStatus,
    ) -> Self {
        Self {
            users,
            writer,
            outbox,
            notifications,
            clock,
            pipeline,
        }
    }
}
