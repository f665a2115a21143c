//! `PostgreSQL` implementation of `UserRepository` and `TransactionalWriter`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::clock::Clock;
use courier_core::error::DomainError;
use courier_core::outbox::{NewOutboxEvent, OutboxEvent};
use courier_core::repository::{EventBuilder, TransactionalWriter, UserRepository};
use courier_core::user::{NewUser, User, UserChanges, UserMutation};
use sqlx::{PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

use crate::error::store_error;
use crate::rows::{OutboxRow, UserRow};
use crate::schema::{OUTBOX_COLUMNS, USER_COLUMNS};

/// PostgreSQL-backed users. Writes go through one transaction that also
/// inserts the outbox event.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
    clock: Arc<dyn Clock>,
}

impl PgUserStore {
    /// Creates a new `PgUserStore` stamping outbox events with `clock`.
    #[must_use]
    pub fn new(pool: PgPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl UserRepository for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(User::from))
    }

    async fn list(&self) -> Result<Vec<User>, DomainError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id");
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(User::from).collect())
    }
}

#[async_trait]
impl TransactionalWriter for PgUserStore {
    async fn write(
        &self,
        mutation: UserMutation,
        build_event: EventBuilder,
    ) -> Result<(User, OutboxEvent), DomainError> {
        // Dropping the transaction without commit rolls it back.
        let mut tx = self.pool.begin().await.map_err(store_error)?;

        let user = match mutation {
            UserMutation::Create(new_user) => insert_user(&mut *tx, new_user).await?,
            UserMutation::Update { id, changes } => update_user(&mut *tx, id, &changes).await?,
            UserMutation::Delete { id } => delete_user(&mut *tx, id).await?,
        };

        let event = insert_event(&mut *tx, build_event(&user), self.clock.now()).await?;
        tx.commit().await.map_err(store_error)?;

        debug!(user_id = %user.id, event_id = %event.id, event_type = %event.event_type, "user write committed");
        Ok((user, event))
    }
}

async fn insert_user(conn: &mut PgConnection, new_user: NewUser) -> Result<User, DomainError> {
    let sql = format!(
        r"
        INSERT INTO users (id, username, email, email_notifications, push_notifications, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {USER_COLUMNS}
        "
    );
    let row: UserRow = sqlx::query_as(&sql)
        .bind(new_user.id)
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(new_user.preferences.email_notifications)
        .bind(new_user.preferences.push_notifications)
        .bind(new_user.created_at)
        .fetch_one(conn)
        .await
        .map_err(store_error)?;
    Ok(row.into())
}

async fn update_user(
    conn: &mut PgConnection,
    id: Uuid,
    changes: &UserChanges,
) -> Result<User, DomainError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
    let current: Option<UserRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(store_error)?;
    let Some(current) = current else {
        return Err(DomainError::Conflict(format!("user {id} does not exist")));
    };

    let mut user = User::from(current);
    changes.apply_to(&mut user);

    let sql = format!(
        r"
        UPDATE users
        SET username = $2, email = $3, email_notifications = $4, push_notifications = $5
        WHERE id = $1
        RETURNING {USER_COLUMNS}
        "
    );
    let row: UserRow = sqlx::query_as(&sql)
        .bind(id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.preferences.email_notifications)
        .bind(user.preferences.push_notifications)
        .fetch_one(&mut *conn)
        .await
        .map_err(store_error)?;
    Ok(row.into())
}

async fn delete_user(conn: &mut PgConnection, id: Uuid) -> Result<User, DomainError> {
    let sql = format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}");
    let row: Option<UserRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(store_error)?;
    row.map(User::from)
        .ok_or_else(|| DomainError::Conflict(format!("user {id} does not exist")))
}

async fn insert_event(
    conn: &mut PgConnection,
    event: NewOutboxEvent,
    now: DateTime<Utc>,
) -> Result<OutboxEvent, DomainError> {
    let sql = format!(
        r"
        INSERT INTO outbox_events
            (id, event_type, aggregate_type, aggregate_id, payload, status, attempts, created_at, available_at)
        VALUES ($1, $2, $3, $4, $5, 'pending', 0, $6, $6)
        RETURNING {OUTBOX_COLUMNS}
        "
    );
    let row: OutboxRow = sqlx::query_as(&sql)
        .bind(Uuid::new_v4())
        .bind(&event.event_type)
        .bind(&event.aggregate_type)
        .bind(event.aggregate_id)
        .bind(&event.payload)
        .bind(now)
        .fetch_one(conn)
        .await
        .map_err(store_error)?;
    OutboxEvent::try_from(row)
}
