//! Store ports used by the writer, the pipeline and the API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;
use crate::notification::{NewNotification, Notification};
use crate::outbox::{Finalization, NewOutboxEvent, OutboxEvent};
use crate::user::{User, UserMutation};

/// Builds the outbox event for a mutation from the record it produced. For
/// deletes the record is the user as it was before removal.
pub type EventBuilder = Box<dyn FnOnce(&User) -> NewOutboxEvent + Send>;

/// Durable log of outbox events.
///
/// Every state change is a conditional update on the event's current status,
/// so two workers racing on the same row cannot both succeed.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Atomically moves the event from `pending` to `processing`, provided it
    /// is pending and `available_at <= now`. Increments `attempts` and stamps
    /// `claimed_at`.
    ///
    /// Returns the claimed event, or `None` when another worker got there
    /// first (or the event is not claimable).
    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<OutboxEvent>, DomainError>;

    /// Moves a `processing` event to the state named by `finalization`.
    ///
    /// Returns `false` when the event was not `processing`.
    async fn finalize(
        &self,
        id: Uuid,
        finalization: Finalization,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// Returns events stuck in `processing` since before `claimed_before` to
    /// `pending`. Returns the number of released events.
    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64, DomainError>;

    /// Up to `limit` claimable pending events created no later than
    /// `created_before`, oldest first.
    async fn find_ready(
        &self,
        now: DateTime<Utc>,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, DomainError>;

    /// Whether any event matching `find_ready` exists.
    async fn has_ready(
        &self,
        now: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// Loads one event.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboxEvent>, DomainError>;

    /// The most recent events, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<OutboxEvent>, DomainError>;
}

/// Durable record of notifications.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Persists a new `queued` notification.
    ///
    /// Returns `None` when a notification for the same outbox event already
    /// exists; at most one notification is kept per event.
    async fn insert(
        &self,
        notification: NewNotification,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, DomainError>;

    /// `queued -> sent`. Returns `false` when the notification was not queued.
    async fn mark_sent(
        &self,
        id: Uuid,
        attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError>;

    /// `queued -> failed`. Returns `false` when the notification was not queued.
    async fn mark_failed(
        &self,
        id: Uuid,
        attempts: i32,
        error: &str,
    ) -> Result<bool, DomainError>;

    /// `sent -> delivered`. Returns `false` when the notification was not sent.
    async fn mark_delivered(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DomainError>;

    /// Loads one notification.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, DomainError>;

    /// Notifications caused by one outbox event.
    async fn find_by_outbox_event(
        &self,
        outbox_event_id: Uuid,
    ) -> Result<Vec<Notification>, DomainError>;

    /// The most recent notifications, newest first.
    async fn list_recent(&self, limit: i64) -> Result<Vec<Notification>, DomainError>;
}

/// Read access to users.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Loads one user.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError>;

    /// All users, oldest first.
    async fn list(&self) -> Result<Vec<User>, DomainError>;
}

/// Applies a user mutation and inserts its outbox event as one atomic unit.
#[async_trait]
pub trait TransactionalWriter: Send + Sync {
    /// Applies `mutation`, builds the event from the resulting record and
    /// inserts it as `pending`. Either both writes are durable or neither is.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` on a uniqueness violation or when an
    /// update/delete targets a missing user, and `DomainError::Infrastructure`
    /// on storage failure.
    async fn write(
        &self,
        mutation: UserMutation,
        build_event: EventBuilder,
    ) -> Result<(User, OutboxEvent), DomainError>;
}
