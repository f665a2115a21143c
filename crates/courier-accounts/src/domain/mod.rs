//! Domain layer: commands, event payloads and input validation.

pub mod commands;
pub mod events;
pub mod validation;
