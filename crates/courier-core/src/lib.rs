//! Courier Core: shared abstractions for the transactional outbox pipeline.
//!
//! This crate defines the records that flow through the pipeline (users,
//! outbox events, notifications) and the ports the pipeline talks to: stores,
//! the change feed, event handlers and delivery sinks. It contains no
//! infrastructure code.

pub mod clock;
pub mod command;
pub mod error;
pub mod feed;
pub mod handler;
pub mod notification;
pub mod outbox;
pub mod repository;
pub mod sink;
pub mod user;
