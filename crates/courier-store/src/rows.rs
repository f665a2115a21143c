//! Row types and their conversion into domain records.

use chrono::{DateTime, Utc};
use courier_core::error::DomainError;
use courier_core::notification::{Notification, NotificationContent};
use courier_core::outbox::OutboxEvent;
use courier_core::user::{NotificationPreferences, User};
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OutboxRow {
    id: Uuid,
    event_type: String,
    aggregate_type: String,
    aggregate_id: Uuid,
    payload: serde_json::Value,
    status: String,
    attempts: i32,
    created_at: DateTime<Utc>,
    available_at: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

impl TryFrom<OutboxRow> for OutboxEvent {
    type Error = DomainError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            event_type: row.event_type,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            payload: row.payload,
            status: row.status.parse().map_err(DomainError::Infrastructure)?,
            attempts: row.attempts,
            created_at: row.created_at,
            available_at: row.available_at,
            claimed_at: row.claimed_at,
            processed_at: row.processed_at,
            last_error: row.last_error,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    outbox_event_id: Uuid,
    channel: String,
    subject: String,
    body: String,
    data: Option<serde_json::Value>,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = DomainError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            outbox_event_id: row.outbox_event_id,
            channel: row.channel.parse().map_err(DomainError::Infrastructure)?,
            content: NotificationContent {
                subject: row.subject,
                body: row.body,
                data: row.data,
            },
            status: row.status.parse().map_err(DomainError::Infrastructure)?,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            sent_at: row.sent_at,
            delivered_at: row.delivered_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    email_notifications: bool,
    push_notifications: bool,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            email: row.email,
            preferences: NotificationPreferences {
                email_notifications: row.email_notifications,
                push_notifications: row.push_notifications,
            },
            created_at: row.created_at,
        }
    }
}

/// Converts every row, failing on the first row that does not convert.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DomainError>
where
    T: TryFrom<R, Error = DomainError>,
{
    rows.into_iter().map(T::try_from).collect()
}
