//! Database schema: embedded migrations and shared SQL fragments.

use sqlx::migrate::Migrator;

/// Migrations under the workspace `migrations/` directory.
pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

/// `LISTEN` channel the outbox insert trigger notifies on. The payload is the
/// new event's id.
pub const OUTBOX_CHANNEL: &str = "outbox_events";

pub(crate) const OUTBOX_COLUMNS: &str = "id, event_type, aggregate_type, aggregate_id, payload, \
     status, attempts, created_at, available_at, claimed_at, processed_at, last_error";

pub(crate) const NOTIFICATION_COLUMNS: &str = "id, user_id, outbox_event_id, channel, subject, \
     body, data, status, attempts, last_error, created_at, sent_at, delivered_at";

pub(crate) const USER_COLUMNS: &str =
    "id, username, email, email_notifications, push_notifications, created_at";
