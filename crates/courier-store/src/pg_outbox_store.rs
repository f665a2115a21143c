//! `PostgreSQL` implementation of `OutboxStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::error::DomainError;
use courier_core::outbox::{Finalization, OutboxEvent};
use courier_core::repository::OutboxStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::store_error;
use crate::rows::{OutboxRow, convert_all};
use crate::schema::OUTBOX_COLUMNS;

/// PostgreSQL-backed outbox.
#[derive(Debug, Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    /// Creates a new `PgOutboxStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<OutboxEvent>, DomainError> {
        let sql = format!(
            r"
            UPDATE outbox_events
            SET status = 'processing', attempts = attempts + 1, claimed_at = $2
            WHERE id = $1 AND status = 'pending' AND available_at <= $2
            RETURNING {OUTBOX_COLUMNS}
            "
        );
        let row: Option<OutboxRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(OutboxEvent::try_from).transpose()
    }

    async fn finalize(
        &self,
        id: Uuid,
        finalization: Finalization,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let query = match finalization {
            Finalization::Processed => sqlx::query(
                r"
                UPDATE outbox_events
                SET status = 'processed', processed_at = $2
                WHERE id = $1 AND status = 'processing'
                ",
            )
            .bind(id)
            .bind(now),
            Finalization::Failed { error } => sqlx::query(
                r"
                UPDATE outbox_events
                SET status = 'failed', processed_at = $2, last_error = $3
                WHERE id = $1 AND status = 'processing'
                ",
            )
            .bind(id)
            .bind(now)
            .bind(error),
            Finalization::Retry {
                error,
                available_at,
            } => sqlx::query(
                r"
                UPDATE outbox_events
                SET status = 'pending', available_at = $2, claimed_at = NULL, last_error = $3
                WHERE id = $1 AND status = 'processing'
                ",
            )
            .bind(id)
            .bind(available_at)
            .bind(error),
        };

        let result = query.execute(&self.pool).await.map_err(store_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query(
            r"
            UPDATE outbox_events
            SET status = 'pending', claimed_at = NULL
            WHERE status = 'processing' AND claimed_at < $1
            ",
        )
        .bind(claimed_before)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn find_ready(
        &self,
        now: DateTime<Utc>,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, DomainError> {
        let sql = format!(
            r"
            SELECT {OUTBOX_COLUMNS}
            FROM outbox_events
            WHERE status = 'pending' AND available_at <= $1 AND created_at <= $2
            ORDER BY created_at, id
            LIMIT $3
            "
        );
        let rows: Vec<OutboxRow> = sqlx::query_as(&sql)
            .bind(now)
            .bind(created_before)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        convert_all(rows)
    }

    async fn has_ready(
        &self,
        now: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1 FROM outbox_events
                WHERE status = 'pending' AND available_at <= $1 AND created_at <= $2
            )
            ",
        )
        .bind(now)
        .bind(created_before)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboxEvent>, DomainError> {
        let sql = format!("SELECT {OUTBOX_COLUMNS} FROM outbox_events WHERE id = $1");
        let row: Option<OutboxRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(OutboxEvent::try_from).transpose()
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<OutboxEvent>, DomainError> {
        let sql = format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox_events ORDER BY created_at DESC, id DESC LIMIT $1"
        );
        let rows: Vec<OutboxRow> = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        convert_all(rows)
    }
}
