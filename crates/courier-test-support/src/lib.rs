//! Shared test doubles for Courier: an in-memory store implementing every
//! store port, controllable clocks and scripted delivery sinks.

mod clock;
mod sink;
mod store;

pub use clock::{FixedClock, ManualClock};
pub use sink::{FailingSink, FlakySink, RecordingSink};
pub use store::{InMemoryStore, user_created_event};
