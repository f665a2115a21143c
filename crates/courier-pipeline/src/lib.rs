//! Courier Pipeline: moves outbox events from `pending` to a terminal state
//! and delivers the notifications they produce.
//!
//! Two producers feed one entry point: the [`listener::ChangeFeedListener`]
//! pushes events as they are inserted, and the
//! [`scanner::ReconciliationScanner`] periodically sweeps up anything the
//! listener missed. Both call [`dispatcher::EventDispatcher::handle`], whose
//! atomic claim makes duplicate delivery harmless.

pub mod config;
pub mod dispatcher;
pub mod listener;
pub mod registry;
pub mod retry;
pub mod runtime;
pub mod scanner;
pub mod sender;
pub mod sink;
pub mod status;
