//! The user aggregate mutated through the transactional writer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Aggregate type tag written to outbox events about users.
pub const USER_AGGREGATE_TYPE: &str = "User";

/// Per-user notification opt-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPreferences {
    /// Receive email notifications.
    pub email_notifications: bool,
    /// Receive push notifications.
    pub push_notifications: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_notifications: true,
            push_notifications: false,
        }
    }
}

/// A persisted user record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: Uuid,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Notification opt-ins.
    pub preferences: NotificationPreferences,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Fields of a user about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// Identifier chosen by the caller.
    pub id: Uuid,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// Notification opt-ins.
    pub preferences: NotificationPreferences,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl NewUser {
    /// The record as it will be stored.
    #[must_use]
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            preferences: self.preferences,
            created_at: self.created_at,
        }
    }
}

/// A partial update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserChanges {
    /// New login name.
    pub username: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New notification opt-ins.
    pub preferences: Option<NotificationPreferences>,
}

impl UserChanges {
    /// Names of the fields this update touches, in declaration order.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.username.is_some() {
            fields.push("username".to_owned());
        }
        if self.email.is_some() {
            fields.push("email".to_owned());
        }
        if self.preferences.is_some() {
            fields.push("preferences".to_owned());
        }
        fields
    }

    /// Whether the update touches nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.preferences.is_none()
    }

    /// Applies the changes to `user` in place.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(username) = &self.username {
            user.username.clone_from(username);
        }
        if let Some(email) = &self.email {
            user.email.clone_from(email);
        }
        if let Some(preferences) = self.preferences {
            user.preferences = preferences;
        }
    }
}

/// A mutation applied by the transactional writer.
#[derive(Debug, Clone, PartialEq)]
pub enum UserMutation {
    /// Insert a new user.
    Create(NewUser),
    /// Change an existing user.
    Update {
        /// The user to change.
        id: Uuid,
        /// The fields to change.
        changes: UserChanges,
    },
    /// Remove a user.
    Delete {
        /// The user to remove.
        id: Uuid,
    },
}
