//! In-memory store implementing every store port.
//!
//! A single mutex guards all three collections, so each conditional update
//! is atomic in the same way a `UPDATE ... WHERE status = $expected` is in
//! `PostgreSQL`. Inserts are broadcast to change-feed subscribers after they
//! are committed.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use courier_core::clock::Clock;
use courier_core::error::DomainError;
use courier_core::feed::{ChangeFeed, ChangeSubscription};
use courier_core::notification::{NewNotification, Notification, NotificationStatus};
use courier_core::outbox::{Finalization, NewOutboxEvent, OutboxEvent, OutboxStatus};
use courier_core::repository::{
    EventBuilder, NotificationStore, OutboxStore, TransactionalWriter, UserRepository,
};
use courier_core::user::{USER_AGGREGATE_TYPE, User, UserMutation};
use tokio::sync::broadcast;
use uuid::Uuid;

const FEED_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    outbox: Vec<OutboxEvent>,
    notifications: Vec<Notification>,
}

/// Builds a `user.created` outbox event for seeding tests.
#[must_use]
pub fn user_created_event(user_id: Uuid, username: &str, email: &str) -> NewOutboxEvent {
    NewOutboxEvent {
        event_type: "user.created".to_owned(),
        aggregate_type: USER_AGGREGATE_TYPE.to_owned(),
        aggregate_id: user_id,
        payload: serde_json::json!({
            "user_id": user_id,
            "username": username,
            "email": email,
        }),
    }
}

/// In-memory implementation of `OutboxStore`, `NotificationStore`,
/// `UserRepository`, `TransactionalWriter` and `ChangeFeed`.
pub struct InMemoryStore {
    clock: Arc<dyn Clock>,
    state: Mutex<State>,
    feed: Mutex<broadcast::Sender<OutboxEvent>>,
    feed_enabled: AtomicBool,
    unavailable: AtomicBool,
    fail_outbox_writes: AtomicBool,
    subscriptions: AtomicUsize,
}

impl InMemoryStore {
    /// Creates an empty store stamping records with `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            clock,
            state: Mutex::new(State::default()),
            feed: Mutex::new(sender),
            feed_enabled: AtomicBool::new(true),
            unavailable: AtomicBool::new(false),
            fail_outbox_writes: AtomicBool::new(false),
            subscriptions: AtomicUsize::new(0),
        }
    }

    /// Makes every operation fail with `DomainError::Infrastructure`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the outbox insert inside `write` fail after the user mutation
    /// has been staged, to exercise rollback.
    pub fn fail_outbox_writes(&self, fail: bool) {
        self.fail_outbox_writes.store(fail, Ordering::SeqCst);
    }

    /// Enables or disables new change-feed subscriptions.
    pub fn set_change_feed_enabled(&self, enabled: bool) {
        self.feed_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Closes every open subscription, as a dropped database connection would.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn disconnect_change_feed(&self) {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        *self.feed.lock().unwrap() = sender;
    }

    /// Number of successful `subscribe` calls so far.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }

    /// Inserts a pending event directly, bypassing the writer.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seed_event(&self, new_event: NewOutboxEvent) -> OutboxEvent {
        let event = self.build_event(new_event);
        self.state.lock().unwrap().outbox.push(event.clone());
        self.publish(&event);
        event
    }

    /// Inserts a user directly, bypassing the writer.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn seed_user(&self, user: User) {
        self.state.lock().unwrap().users.push(user);
    }

    /// Snapshot of all outbox events in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn outbox_events(&self) -> Vec<OutboxEvent> {
        self.state.lock().unwrap().outbox.clone()
    }

    /// Snapshot of all notifications in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn notifications(&self) -> Vec<Notification> {
        self.state.lock().unwrap().notifications.clone()
    }

    /// Snapshot of all users.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn users(&self) -> Vec<User> {
        self.state.lock().unwrap().users.clone()
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(DomainError::Infrastructure("store unavailable".into()));
        }
        Ok(())
    }

    fn build_event(&self, new_event: NewOutboxEvent) -> OutboxEvent {
        let now = self.clock.now();
        OutboxEvent {
            id: Uuid::new_v4(),
            event_type: new_event.event_type,
            aggregate_type: new_event.aggregate_type,
            aggregate_id: new_event.aggregate_id,
            payload: new_event.payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            created_at: now,
            available_at: now,
            claimed_at: None,
            processed_at: None,
            last_error: None,
        }
    }

    fn publish(&self, event: &OutboxEvent) {
        // No subscribers is not an error; the scanner will find the row.
        let _ = self.feed.lock().unwrap().send(event.clone());
    }
}

fn ensure_unique(
    users: &[User],
    except: Option<Uuid>,
    username: &str,
    email: &str,
) -> Result<(), DomainError> {
    for other in users.iter().filter(|u| Some(u.id) != except) {
        if other.username == username {
            return Err(DomainError::Conflict(format!(
                "username '{username}' is already taken"
            )));
        }
        if other.email == email {
            return Err(DomainError::Conflict(format!(
                "email '{email}' is already registered"
            )));
        }
    }
    Ok(())
}

fn is_ready(event: &OutboxEvent, now: DateTime<Utc>, created_before: DateTime<Utc>) -> bool {
    event.status == OutboxStatus::Pending
        && event.available_at <= now
        && event.created_at <= created_before
}

#[async_trait]
impl TransactionalWriter for InMemoryStore {
    async fn write(
        &self,
        mutation: UserMutation,
        build_event: EventBuilder,
    ) -> Result<(User, OutboxEvent), DomainError> {
        self.check_available()?;

        let (user, event) = {
            let mut state = self.state.lock().unwrap();
            // Work on a copy; nothing is visible until both writes succeed.
            let mut users = state.users.clone();

            let user = match mutation {
                UserMutation::Create(new_user) => {
                    ensure_unique(&users, None, &new_user.username, &new_user.email)?;
                    let user = new_user.into_user();
                    users.push(user.clone());
                    user
                }
                UserMutation::Update { id, changes } => {
                    let Some(pos) = users.iter().position(|u| u.id == id) else {
                        return Err(DomainError::Conflict(format!("user {id} does not exist")));
                    };
                    let mut user = users[pos].clone();
                    changes.apply_to(&mut user);
                    ensure_unique(&users, Some(id), &user.username, &user.email)?;
                    users[pos] = user.clone();
                    user
                }
                UserMutation::Delete { id } => {
                    let Some(pos) = users.iter().position(|u| u.id == id) else {
                        return Err(DomainError::Conflict(format!("user {id} does not exist")));
                    };
                    users.remove(pos)
                }
            };

            if self.fail_outbox_writes.load(Ordering::SeqCst) {
                return Err(DomainError::Infrastructure("outbox insert failed".into()));
            }

            let event = self.build_event(build_event(&user));
            state.users = users;
            state.outbox.push(event.clone());
            (user, event)
        };

        self.publish(&event);
        Ok((user, event))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, DomainError> {
        self.check_available()?;
        let mut users = self.state.lock().unwrap().users.clone();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }
}

#[async_trait]
impl OutboxStore for InMemoryStore {
    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<OutboxEvent>, DomainError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let Some(event) = state.outbox.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        if event.status != OutboxStatus::Pending || event.available_at > now {
            return Ok(None);
        }
        event.status = OutboxStatus::Processing;
        event.attempts += 1;
        event.claimed_at = Some(now);
        Ok(Some(event.clone()))
    }

    async fn finalize(
        &self,
        id: Uuid,
        finalization: Finalization,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let Some(event) = state.outbox.iter_mut().find(|e| e.id == id) else {
            return Ok(false);
        };
        if event.status != OutboxStatus::Processing {
            return Ok(false);
        }
        event.status = finalization.status();
        match finalization {
            Finalization::Processed => {
                event.processed_at = Some(now);
            }
            Finalization::Failed { error } => {
                event.processed_at = Some(now);
                event.last_error = Some(error);
            }
            Finalization::Retry {
                error,
                available_at,
            } => {
                event.available_at = available_at;
                event.claimed_at = None;
                event.last_error = Some(error);
            }
        }
        Ok(true)
    }

    async fn release_stale(&self, claimed_before: DateTime<Utc>) -> Result<u64, DomainError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let mut released = 0;
        for event in state.outbox.iter_mut().filter(|e| {
            e.status == OutboxStatus::Processing && e.claimed_at.is_some_and(|t| t < claimed_before)
        }) {
            event.status = OutboxStatus::Pending;
            event.claimed_at = None;
            released += 1;
        }
        Ok(released)
    }

    async fn find_ready(
        &self,
        now: DateTime<Utc>,
        created_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, DomainError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        let mut ready: Vec<OutboxEvent> = state
            .outbox
            .iter()
            .filter(|e| is_ready(e, now, created_before))
            .cloned()
            .collect();
        ready.sort_by_key(|e| e.created_at);
        ready.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(ready)
    }

    async fn has_ready(
        &self,
        now: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        Ok(state.outbox.iter().any(|e| is_ready(e, now, created_before)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OutboxEvent>, DomainError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        Ok(state.outbox.iter().find(|e| e.id == id).cloned())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<OutboxEvent>, DomainError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        let mut events: Vec<OutboxEvent> = state.outbox.iter().rev().cloned().collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(events)
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert(
        &self,
        notification: NewNotification,
        now: DateTime<Utc>,
    ) -> Result<Option<Notification>, DomainError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        if state
            .notifications
            .iter()
            .any(|n| n.outbox_event_id == notification.outbox_event_id)
        {
            return Ok(None);
        }
        let stored = Notification {
            id: Uuid::new_v4(),
            user_id: notification.user_id,
            outbox_event_id: notification.outbox_event_id,
            channel: notification.channel,
            content: notification.content,
            status: NotificationStatus::Queued,
            attempts: 0,
            last_error: None,
            created_at: now,
            sent_at: None,
            delivered_at: None,
        };
        state.notifications.push(stored.clone());
        Ok(Some(stored))
    }

    async fn mark_sent(
        &self,
        id: Uuid,
        attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) if n.status == NotificationStatus::Queued => {
                n.status = NotificationStatus::Sent;
                n.attempts = attempts;
                n.sent_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: Uuid, attempts: i32, error: &str) -> Result<bool, DomainError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) if n.status == NotificationStatus::Queued => {
                n.status = NotificationStatus::Failed;
                n.attempts = attempts;
                n.last_error = Some(error.to_owned());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_delivered(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, DomainError> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        match state.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) if n.status == NotificationStatus::Sent => {
                n.status = NotificationStatus::Delivered;
                n.delivered_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>, DomainError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        Ok(state.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn find_by_outbox_event(
        &self,
        outbox_event_id: Uuid,
    ) -> Result<Vec<Notification>, DomainError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.outbox_event_id == outbox_event_id)
            .cloned()
            .collect())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<Notification>, DomainError> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        let mut notifications: Vec<Notification> =
            state.notifications.iter().rev().cloned().collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(notifications)
    }
}

struct InMemorySubscription {
    receiver: broadcast::Receiver<OutboxEvent>,
}

#[async_trait]
impl ChangeSubscription for InMemorySubscription {
    async fn next_event(&mut self) -> Result<Option<OutboxEvent>, DomainError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.status == OutboxStatus::Pending => return Ok(Some(event)),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl ChangeFeed for InMemoryStore {
    async fn subscribe(&self) -> Result<Box<dyn ChangeSubscription>, DomainError> {
        self.check_available()?;
        if !self.feed_enabled.load(Ordering::SeqCst) {
            return Err(DomainError::Infrastructure("change feed unavailable".into()));
        }
        let receiver = self.feed.lock().unwrap().subscribe();
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemorySubscription { receiver }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use courier_core::user::{NewUser, NotificationPreferences, UserChanges};

    fn store() -> InMemoryStore {
        InMemoryStore::new(Arc::new(ManualClock::starting_now()))
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            preferences: NotificationPreferences::default(),
            created_at: Utc::now(),
        }
    }

    fn builder() -> EventBuilder {
        Box::new(|user: &User| user_created_event(user.id, &user.username, &user.email))
    }

    #[tokio::test]
    async fn test_write_commits_user_and_pending_event_together() {
        // Arrange
        let store = store();

        // Act
        let (user, event) = store
            .write(UserMutation::Create(new_user("alice", "a@x.com")), builder())
            .await
            .unwrap();

        // Assert
        assert_eq!(store.users(), vec![user.clone()]);
        assert_eq!(store.outbox_events(), vec![event.clone()]);
        assert_eq!(event.status, OutboxStatus::Pending);
        assert_eq!(event.aggregate_id, user.id);
    }

    #[tokio::test]
    async fn test_write_rolls_back_user_when_outbox_insert_fails() {
        // Arrange
        let store = store();
        store.fail_outbox_writes(true);

        // Act
        let result = store
            .write(UserMutation::Create(new_user("alice", "a@x.com")), builder())
            .await;

        // Assert
        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
        assert!(store.users().is_empty());
        assert!(store.outbox_events().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_missing_user_is_a_conflict() {
        let store = store();

        let result = store
            .write(
                UserMutation::Update {
                    id: Uuid::new_v4(),
                    changes: UserChanges::default(),
                },
                builder(),
            )
            .await;

        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert!(store.outbox_events().is_empty());
    }

    #[tokio::test]
    async fn test_claim_succeeds_once() {
        // Arrange
        let store = store();
        let event = store.seed_event(user_created_event(Uuid::new_v4(), "a", "a@x.com"));
        let now = event.created_at;

        // Act
        let first = store.claim(event.id, now).await.unwrap();
        let second = store.claim(event.id, now).await.unwrap();

        // Assert
        let claimed = first.unwrap();
        assert_eq!(claimed.status, OutboxStatus::Processing);
        assert_eq!(claimed.attempts, 1);
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_finalize_requires_processing() {
        let store = store();
        let event = store.seed_event(user_created_event(Uuid::new_v4(), "a", "a@x.com"));
        let now = event.created_at;

        assert!(!store.finalize(event.id, Finalization::Processed, now).await.unwrap());
        store.claim(event.id, now).await.unwrap();
        assert!(store.finalize(event.id, Finalization::Processed, now).await.unwrap());
        assert!(
            !store
                .finalize(event.id, Finalization::Failed { error: "late".into() }, now)
                .await
                .unwrap()
        );

        let stored = OutboxStore::find_by_id(&store, event.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OutboxStatus::Processed);
        assert_eq!(stored.processed_at, Some(now));
    }

    #[tokio::test]
    async fn test_second_notification_for_same_event_is_ignored() {
        let store = store();
        let event_id = Uuid::new_v4();
        let new = NewNotification {
            user_id: Uuid::new_v4(),
            outbox_event_id: event_id,
            channel: courier_core::notification::NotificationChannel::Email,
            content: courier_core::notification::NotificationContent {
                subject: "s".into(),
                body: "b".into(),
                data: None,
            },
        };

        let first = store.insert(new.clone(), Utc::now()).await.unwrap();
        let second = store.insert(new, Utc::now()).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(store.notifications().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_closes_open_subscriptions() {
        let store = store();
        let mut subscription = store.subscribe().await.unwrap();

        store.disconnect_change_feed();

        assert!(subscription.next_event().await.unwrap().is_none());
    }
}
