//! Change feed over `LISTEN outbox_events`.
//!
//! The insert trigger notifies with the new row's id once the writing
//! transaction commits. Each notification is resolved to the full row, and
//! rows that are no longer pending are skipped.

use async_trait::async_trait;
use courier_core::error::DomainError;
use courier_core::feed::{ChangeFeed, ChangeSubscription};
use courier_core::outbox::{OutboxEvent, OutboxStatus};
use courier_core::repository::OutboxStore;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::store_error;
use crate::pg_outbox_store::PgOutboxStore;
use crate::schema::OUTBOX_CHANNEL;

/// Opens `LISTEN` subscriptions on a dedicated connection per subscriber.
#[derive(Debug, Clone)]
pub struct PgChangeFeed {
    pool: PgPool,
}

impl PgChangeFeed {
    /// Creates a new `PgChangeFeed`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChangeFeed for PgChangeFeed {
    async fn subscribe(&self) -> Result<Box<dyn ChangeSubscription>, DomainError> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(store_error)?;
        listener.listen(OUTBOX_CHANNEL).await.map_err(store_error)?;
        debug!(channel = OUTBOX_CHANNEL, "listening for outbox inserts");
        Ok(Box::new(PgSubscription {
            listener,
            outbox: PgOutboxStore::new(self.pool.clone()),
        }))
    }
}

struct PgSubscription {
    listener: PgListener,
    outbox: PgOutboxStore,
}

#[async_trait]
impl ChangeSubscription for PgSubscription {
    async fn next_event(&mut self) -> Result<Option<OutboxEvent>, DomainError> {
        loop {
            // `None` means the connection dropped; notifications sent while
            // it was down are lost, so the subscription ends here.
            let Some(notification) = self.listener.try_recv().await.map_err(store_error)? else {
                return Ok(None);
            };

            let Ok(id) = notification.payload().parse::<Uuid>() else {
                warn!(payload = notification.payload(), "ignoring malformed outbox notification");
                continue;
            };

            match self.outbox.find_by_id(id).await? {
                Some(event) if event.status == OutboxStatus::Pending => return Ok(Some(event)),
                Some(_) => debug!(event_id = %id, "outbox event already picked up"),
                None => warn!(event_id = %id, "notified outbox event not found"),
            }
        }
    }
}
