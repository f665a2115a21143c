//! Notification records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channel of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    /// Email.
    Email,
    /// Mobile push.
    Push,
    /// Text message.
    Sms,
    /// In-app inbox.
    InApp,
}

impl NotificationChannel {
    /// Returns the persisted name of this channel.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Sms => "sms",
            Self::InApp => "in_app",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "push" => Ok(Self::Push),
            "sms" => Ok(Self::Sms),
            "in_app" => Ok(Self::InApp),
            other => Err(format!("unknown notification channel: {other}")),
        }
    }
}

/// Delivery state of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Created, not yet handed to the sink.
    Queued,
    /// Accepted by the sink.
    Sent,
    /// Confirmed delivered to the recipient. Terminal.
    Delivered,
    /// Every delivery attempt failed. Terminal.
    Failed,
}

impl NotificationStatus {
    /// Returns the persisted name of this status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is allowed.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "sent" => Ok(Self::Sent),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown notification status: {other}")),
        }
    }
}

/// What the recipient sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationContent {
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Optional structured data for the channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// A persisted notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification identifier.
    pub id: Uuid,
    /// Recipient.
    pub user_id: Uuid,
    /// The outbox event that caused this notification.
    pub outbox_event_id: Uuid,
    /// Delivery channel.
    pub channel: NotificationChannel,
    /// Message content.
    pub content: NotificationContent,
    /// Current delivery state.
    pub status: NotificationStatus,
    /// Number of sink invocations so far.
    pub attempts: i32,
    /// Error from the most recent failed attempt.
    pub last_error: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When the sink accepted the notification.
    pub sent_at: Option<DateTime<Utc>>,
    /// When delivery was confirmed.
    pub delivered_at: Option<DateTime<Utc>>,
}

/// A notification produced by an event handler, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    /// Recipient.
    pub user_id: Uuid,
    /// The outbox event being processed.
    pub outbox_event_id: Uuid,
    /// Delivery channel.
    pub channel: NotificationChannel,
    /// Message content.
    pub content: NotificationContent,
}
