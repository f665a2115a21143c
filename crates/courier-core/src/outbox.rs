//! Outbox event records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Processing state of an outbox event.
///
/// Transitions only move forward: `Pending -> Processing -> {Processed, Failed}`.
/// The one exception is a retry (or a stale-claim release), which returns a
/// `Processing` event to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Written, waiting to be claimed.
    Pending,
    /// Claimed by exactly one worker.
    Processing,
    /// Handled successfully. Terminal.
    Processed,
    /// Handling failed with no attempts left. Terminal.
    Failed,
}

impl OutboxStatus {
    /// Returns the persisted name of this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is allowed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Failed)
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown outbox status: {other}")),
        }
    }
}

/// A persisted outbox event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    /// Store-assigned identifier.
    pub id: Uuid,
    /// Routing tag, e.g. `user.created`.
    pub event_type: String,
    /// Kind of aggregate that changed, e.g. `User`.
    pub aggregate_type: String,
    /// The aggregate that changed.
    pub aggregate_id: Uuid,
    /// Event payload, opaque to the pipeline.
    pub payload: serde_json::Value,
    /// Current processing state.
    pub status: OutboxStatus,
    /// Number of times the event has been claimed.
    pub attempts: i32,
    /// When the event was written.
    pub created_at: DateTime<Utc>,
    /// Earliest time the event may be claimed.
    pub available_at: DateTime<Utc>,
    /// When the current claim was taken.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Set when the event reaches `Processed` or `Failed`.
    pub processed_at: Option<DateTime<Utc>>,
    /// Error recorded by the most recent failed attempt.
    pub last_error: Option<String>,
}

/// An outbox event about to be written alongside an aggregate mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboxEvent {
    /// Routing tag, e.g. `user.created`.
    pub event_type: String,
    /// Kind of aggregate that changed.
    pub aggregate_type: String,
    /// The aggregate that changed.
    pub aggregate_id: Uuid,
    /// Event payload.
    pub payload: serde_json::Value,
}

/// How a claimed event leaves the `Processing` state.
#[derive(Debug, Clone, PartialEq)]
pub enum Finalization {
    /// The handler succeeded (or no handler was registered).
    Processed,
    /// The handler failed and no attempts remain.
    Failed {
        /// Handler error message.
        error: String,
    },
    /// The handler failed; return the event to `Pending` until `available_at`.
    Retry {
        /// Handler error message.
        error: String,
        /// Earliest time of the next claim.
        available_at: DateTime<Utc>,
    },
}

impl Finalization {
    /// The status the event is left in.
    #[must_use]
    pub fn status(&self) -> OutboxStatus {
        match self {
            Self::Processed => OutboxStatus::Processed,
            Self::Failed { .. } => OutboxStatus::Failed,
            Self::Retry { .. } => OutboxStatus::Pending,
        }
    }
}
