//! `PostgreSQL` adapters for the Courier store ports.
//!
//! Every state transition is a single conditional `UPDATE ... WHERE status =`
//! statement, so concurrent workers race on the row and at most one wins.

mod error;
mod rows;

pub mod pg_change_feed;
pub mod pg_notification_store;
pub mod pg_outbox_store;
pub mod pg_user_store;
pub mod schema;

pub use pg_change_feed::PgChangeFeed;
pub use pg_notification_store::PgNotificationStore;
pub use pg_outbox_store::PgOutboxStore;
pub use pg_user_store::PgUserStore;
