//! Route modules.

pub mod health;
pub mod notifications;
pub mod outbox;
pub mod users;
