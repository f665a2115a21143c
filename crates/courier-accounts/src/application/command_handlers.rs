//! Command handlers for the user accounts context.
//!
//! Each handler validates its command, then hands the mutation and an event
//! builder to the transactional writer, so the user change and its outbox
//! event commit together.

use courier_core::clock::Clock;
use courier_core::command::Command;
use courier_core::error::DomainError;
use courier_core::outbox::OutboxEvent;
use courier_core::repository::{TransactionalWriter, UserRepository};
use courier_core::user::{NewUser, User, UserMutation};
use tracing::info;
use uuid::Uuid;

use crate::domain::commands::{CreateUser, DeleteUser, UpdateUser};
use crate::domain::events;
use crate::domain::validation::{validate_changes, validate_email, validate_username};

/// Handles the `CreateUser` command: inserts the user and a `user.created`
/// event.
///
/// # Errors
///
/// Returns `DomainError::Validation` for invalid input,
/// `DomainError::Conflict` if the username or email is taken, and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_create_user(
    command: &CreateUser,
    clock: &dyn Clock,
    writer: &dyn TransactionalWriter,
) -> Result<(User, OutboxEvent), DomainError> {
    validate_username(&command.username)?;
    validate_email(&command.email)?;

    let new_user = NewUser {
        id: Uuid::new_v4(),
        username: command.username.clone(),
        email: command.email.clone(),
        preferences: command.preferences.unwrap_or_default(),
        created_at: clock.now(),
    };

    let (user, event) = writer
        .write(
            UserMutation::Create(new_user),
            Box::new(events::user_created),
        )
        .await?;

    info!(
        command = command.command_type(),
        user_id = %user.id,
        event_id = %event.id,
        "user created"
    );
    Ok((user, event))
}

/// Handles the `UpdateUser` command: applies the changes and inserts a
/// `user.updated` event naming the changed fields.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an empty or invalid update,
/// `DomainError::AggregateNotFound` if the user does not exist,
/// `DomainError::Conflict` on a uniqueness violation, and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_update_user(
    command: &UpdateUser,
    users: &dyn UserRepository,
    writer: &dyn TransactionalWriter,
) -> Result<(User, OutboxEvent), DomainError> {
    validate_changes(&command.changes)?;
    ensure_exists(command.user_id, users).await?;

    let updated_fields = command.changes.changed_fields();
    let (user, event) = writer
        .write(
            UserMutation::Update {
                id: command.user_id,
                changes: command.changes.clone(),
            },
            Box::new(move |user: &User| events::user_updated(user, &updated_fields)),
        )
        .await?;

    info!(
        command = command.command_type(),
        user_id = %user.id,
        event_id = %event.id,
        "user updated"
    );
    Ok((user, event))
}

/// Handles the `DeleteUser` command: removes the user and inserts a
/// `user.deleted` event carrying the removed record's details.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user does not exist and
/// `DomainError::Infrastructure` on storage failure.
pub async fn handle_delete_user(
    command: &DeleteUser,
    users: &dyn UserRepository,
    writer: &dyn TransactionalWriter,
) -> Result<(User, OutboxEvent), DomainError> {
    ensure_exists(command.user_id, users).await?;

    let (user, event) = writer
        .write(
            UserMutation::Delete {
                id: command.user_id,
            },
            Box::new(events::user_deleted),
        )
        .await?;

    info!(
        command = command.command_type(),
        user_id = %user.id,
        event_id = %event.id,
        "user deleted"
    );
    Ok((user, event))
}

// A user removed between this check and the write still surfaces as the
// writer's `Conflict`.
async fn ensure_exists(user_id: Uuid, users: &dyn UserRepository) -> Result<(), DomainError> {
    match users.find_by_id(user_id).await? {
        Some(_) => Ok(()),
        None => Err(DomainError::AggregateNotFound(user_id)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use courier_core::outbox::OutboxStatus;
    use courier_core::user::{NotificationPreferences, UserChanges};
    use courier_test_support::{FixedClock, InMemoryStore};

    use super::*;
    use crate::domain::events::{USER_CREATED, USER_DELETED, USER_UPDATED, UserUpdated};

    fn setup() -> (FixedClock, InMemoryStore) {
        let fixed_now = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let clock = FixedClock(fixed_now);
        let store = InMemoryStore::new(Arc::new(clock.clone()));
        (clock, store)
    }

    fn create_alice() -> CreateUser {
        CreateUser {
            username: "alice".into(),
            email: "a@x.com".into(),
            preferences: None,
        }
    }

    #[tokio::test]
    async fn test_handle_create_user_writes_user_and_pending_event() {
        // Arrange
        let (clock, store) = setup();

        // Act
        let (user, event) = handle_create_user(&create_alice(), &clock, &store)
            .await
            .unwrap();

        // Assert
        assert_eq!(user.username, "alice");
        assert_eq!(user.created_at, clock.0);
        assert_eq!(user.preferences, NotificationPreferences::default());
        assert_eq!(store.users(), vec![user.clone()]);

        let outbox = store.outbox_events();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0].id, event.id);
        assert_eq!(outbox[0].event_type, USER_CREATED);
        assert_eq!(outbox[0].aggregate_id, user.id);
        assert_eq!(outbox[0].status, OutboxStatus::Pending);
        assert_eq!(outbox[0].payload["username"], "alice");
    }

    #[tokio::test]
    async fn test_duplicate_username_writes_nothing() {
        // Arrange
        let (clock, store) = setup();
        handle_create_user(&create_alice(), &clock, &store)
            .await
            .unwrap();
        let duplicate = CreateUser {
            email: "other@x.com".into(),
            ..create_alice()
        };

        // Act
        let result = handle_create_user(&duplicate, &clock, &store).await;

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert_eq!(store.users().len(), 1);
        assert_eq!(store.outbox_events().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_email_is_rejected_before_writing() {
        let (clock, store) = setup();
        let command = CreateUser {
            email: "not-an-email".into(),
            ..create_alice()
        };

        let result = handle_create_user(&command, &clock, &store).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(store.outbox_events().is_empty());
    }

    #[tokio::test]
    async fn test_failed_outbox_insert_rolls_back_user() {
        let (clock, store) = setup();
        store.fail_outbox_writes(true);

        let result = handle_create_user(&create_alice(), &clock, &store).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert!(store.users().is_empty());
        assert!(store.outbox_events().is_empty());
    }

    #[tokio::test]
    async fn test_handle_update_user_records_changed_fields() {
        // Arrange
        let (clock, store) = setup();
        let (user, _) = handle_create_user(&create_alice(), &clock, &store)
            .await
            .unwrap();
        let command = UpdateUser {
            user_id: user.id,
            changes: UserChanges {
                email: Some("alice@new.com".into()),
                ..UserChanges::default()
            },
        };

        // Act
        let (updated, event) = handle_update_user(&command, &store, &store).await.unwrap();

        // Assert
        assert_eq!(updated.email, "alice@new.com");
        assert_eq!(event.event_type, USER_UPDATED);
        let payload: UserUpdated = serde_json::from_value(event.payload).unwrap();
        assert_eq!(payload.updated_fields, vec!["email"]);
        assert_eq!(payload.username, "alice");
    }

    #[tokio::test]
    async fn test_update_of_unknown_user_is_not_found() {
        let (_, store) = setup();
        let user_id = Uuid::new_v4();
        let command = UpdateUser {
            user_id,
            changes: UserChanges {
                username: Some("bob".into()),
                ..UserChanges::default()
            },
        };

        let result = handle_update_user(&command, &store, &store).await;

        match result {
            Err(DomainError::AggregateNotFound(id)) => assert_eq!(id, user_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
        assert!(store.outbox_events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_update_is_a_validation_error() {
        let (_, store) = setup();
        let command = UpdateUser {
            user_id: Uuid::new_v4(),
            changes: UserChanges::default(),
        };

        let result = handle_update_user(&command, &store, &store).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_handle_delete_user_emits_event_with_removed_record() {
        // Arrange
        let (clock, store) = setup();
        let (user, _) = handle_create_user(&create_alice(), &clock, &store)
            .await
            .unwrap();

        // Act
        let (deleted, event) = handle_delete_user(&DeleteUser { user_id: user.id }, &store, &store)
            .await
            .unwrap();

        // Assert
        assert_eq!(deleted.id, user.id);
        assert!(store.users().is_empty());
        assert_eq!(event.event_type, USER_DELETED);
        assert_eq!(event.payload["email"], "a@x.com");
        assert_eq!(store.outbox_events().len(), 2);
    }
}
