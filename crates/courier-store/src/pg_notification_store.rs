//! `PostgreSQL` implementation of `NotificationStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::error::DomainError;
use courier_core::notification::{NewNotification, Notification};
use courier_core::repository::NotificationStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::store_error;
use crate::rows::{NotificationRow, convert_all};
use crate::schema::NOTIFICATION_COLUMNS;

/// PostgreSQL-backed notification records.
#[derive(Debug, Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    /// Creates a new `PgNotificationStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(
        &self,
        notification: NewNotification,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, DomainError> {
        let sql = format!(
            r"
            INSERT INTO notifications
                (id, user_id, outbox_event_id, channel, subject, body, data, status, attempts, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'queued', 0, $8)
            ON CONFLICT (outbox_event_id) DO NOTHING
            RETURNING {NOTIFICATION_COLUMNS}
            "
        );
        let row: Option<NotificationRow> = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(notification.user_id)
            .bind(notification.outbox_event_id)
            .bind(notification.channel.as_str())
            .bind(&notification.content.subject)
            .bind(&notification.content.body)
            .bind(notification.content.data.as_ref())
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(Notification::try_from).transpose()
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE notifications
            SET status = 'sent', attempts = $2, sent_at = $3
            WHERE id = $1 AND status = 'queued'
            ",
        )
        .bind(id)
        .bind(attempts)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        attempts: i32,
        error: &str,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE notifications
            SET status = 'failed', attempts = $2, last_error = $3
            WHERE id = $1 AND status = 'queued'
            ",
        )
        .bind(id)
        .bind(attempts)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_delivered(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE notifications
            SET status = 'delivered', delivered_at = $2
            WHERE id = $1 AND status = 'sent'
            ",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, DomainError> {
        let sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1");
        let row: Option<NotificationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(Notification::try_from).transpose()
    }

    async fn find_by_outbox_event(
        &self,
        outbox_event_id: Uuid,
    ) -> Result<Vec<Notification>, DomainError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE outbox_event_id = $1 ORDER BY created_at"
        );
        let rows: Vec<NotificationRow> = sqlx::query_as(&sql)
            .bind(outbox_event_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        convert_all(rows)
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Notification>, DomainError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        let rows: Vec<NotificationRow> = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        convert_all(rows)
    }
}
