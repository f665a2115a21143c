//! Commands for the user accounts context.

use courier_core::command::Command;
use courier_core::user::{NotificationPreferences, UserChanges};
use uuid::Uuid;

/// Command to register a new user.
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Requested login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// Notification opt-ins; defaults apply when absent.
    pub preferences: Option<NotificationPreferences>,
}

/// Command to change some fields of an existing user.
#[derive(Debug, Clone)]
pub struct UpdateUser {
    /// The user to change.
    pub user_id: Uuid,
    /// Fields to change.
    pub changes: UserChanges,
}

/// Command to remove a user.
#[derive(Debug, Clone)]
pub struct DeleteUser {
    /// The user to remove.
    pub user_id: Uuid,
}

impl Command for CreateUser {
    fn command_type(&self) -> &'static str {
        "user.create"
    }

    fn target_id(&self) -> Option<Uuid> {
        None
    }
}

impl Command for UpdateUser {
    fn command_type(&self) -> &'static str {
        "user.update"
    }

    fn target_id(&self) -> Option<Uuid> {
        Some(self.user_id)
    }
}

impl Command for DeleteUser {
    fn command_type(&self) -> &'static str {
        "user.delete"
    }

    fn target_id(&self) -> Option<Uuid> {
        Some(self.user_id)
    }
}
