//! Query handlers for the user accounts context.

use chrono::{DateTime, Utc};
use courier_core::error::DomainError;
use courier_core::repository::UserRepository;
use courier_core::user::{NotificationPreferences, User};
use serde::Serialize;
use uuid::Uuid;

/// Read-only view of a user.
#[derive(Debug, Serialize)]
pub struct UserView {
    /// The user identifier.
    pub id: Uuid,
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Notification opt-ins.
    pub preferences: NotificationPreferences,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            preferences: user.preferences,
            created_at: user.created_at,
        }
    }
}

/// Retrieves a user by ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no user has the ID.
pub async fn get_user(user_id: Uuid, repo: &dyn UserRepository) -> Result<UserView, DomainError> {
    repo.find_by_id(user_id)
        .await?
        .map(UserView::from)
        .ok_or(DomainError::AggregateNotFound(user_id))
}

/// Lists every user, oldest first.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store cannot be read.
pub async fn list_users(repo: &dyn UserRepository) -> Result<Vec<UserView>, DomainError> {
    Ok(repo.list().await?.into_iter().map(UserView::from).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeDelta;
    use courier_test_support::{InMemoryStore, ManualClock};

    use super::*;

    fn user(name: &str, created_at: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            username: name.into(),
            email: format!("{name}@x.com"),
            preferences: NotificationPreferences::default(),
            created_at,
        }
    }

    #[tokio::test]
    async fn test_get_user_returns_view() {
        // Arrange
        let store = InMemoryStore::new(Arc::new(ManualClock::starting_now()));
        let alice = user("alice", Utc::now());
        store.seed_user(alice.clone());

        // Act
        let view = get_user(alice.id, &store).await.unwrap();

        // Assert
        assert_eq!(view.id, alice.id);
        assert_eq!(view.username, "alice");
        assert_eq!(view.email, "alice@x.com");
    }

    #[tokio::test]
    async fn test_get_user_returns_not_found() {
        // Arrange
        let store = InMemoryStore::new(Arc::new(ManualClock::starting_now()));
        let user_id = Uuid::new_v4();

        // Act
        let result = get_user(user_id, &store).await;

        // Assert
        match result {
            Err(DomainError::AggregateNotFound(id)) => assert_eq!(id, user_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_list_users_oldest_first() {
        let store = InMemoryStore::new(Arc::new(ManualClock::starting_now()));
        let now = Utc::now();
        store.seed_user(user("bob", now));
        store.seed_user(user("alice", now - TimeDelta::minutes(5)));

        let views = list_users(&store).await.unwrap();

        let names: Vec<&str> = views.iter().map(|v| v.username.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }
}
