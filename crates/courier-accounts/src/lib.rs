//! Courier: user accounts bounded context.
//!
//! Responsible for user creation, update and deletion through the
//! transactional writer, and for turning the resulting `user.*` outbox events
//! into notifications.

pub mod application;
pub mod domain;
