//! Command abstractions for aggregate mutations.

use uuid::Uuid;

/// A request to mutate an aggregate. Every successful command produces
/// exactly one outbox event.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Stable command name used in logs, e.g. `user.create`.
    fn command_type(&self) -> &'static str;

    /// The aggregate this command targets, or `None` when it creates one.
    fn target_id(&self) -> Option<Uuid>;
}
