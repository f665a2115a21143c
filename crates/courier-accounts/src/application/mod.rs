//! Application layer: command, query and notification handlers.

pub mod command_handlers;
pub mod notification_handlers;
pub mod query_handlers;
