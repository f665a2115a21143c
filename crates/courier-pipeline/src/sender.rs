//! Notification sender: hands queued notifications to the delivery sink and
//! records the outcome.

use std::sync::Arc;

use courier_core::clock::Clock;
use courier_core::error::{DeliveryError, DomainError};
use courier_core::notification::{Notification, NotificationStatus};
use courier_core::repository::NotificationStore;
use courier_core::sink::DeliverySink;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::retry::RetryPolicy;

/// Delivers notifications and advances their state.
pub struct NotificationSender {
    store: Arc<dyn NotificationStore>,
    sink: Arc<dyn DeliverySink>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl NotificationSender {
    /// Creates a sender.
    #[must_use]
    pub fn new(
        store: Arc<dyn NotificationStore>,
        sink: Arc<dyn DeliverySink>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            sink,
            retry,
            clock,
        }
    }

    /// Delivers a queued notification.
    ///
    /// On success the notification becomes `sent`. Sink failures are retried
    /// per the retry policy; once attempts run out the notification becomes
    /// `failed` and the last sink error is recorded. Notifications that are
    /// no longer queued are left alone.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Exhausted` when every attempt failed, and
    /// `DeliveryError::Store` when the outcome could not be recorded.
    pub async fn send(&self, notification: &Notification) -> Result<(), DeliveryError> {
        if notification.status != NotificationStatus::Queued {
            debug!(
                notification_id = %notification.id,
                status = %notification.status,
                "notification is not queued; skipping"
            );
            return Ok(());
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let attempts = i32::try_from(attempt).unwrap_or(i32::MAX);

            match self
                .sink
                .deliver(
                    notification.channel,
                    notification.user_id,
                    &notification.content,
                )
                .await
            {
                Ok(()) => {
                    let updated = self
                        .store
                        .mark_sent(notification.id, attempts, self.clock.now())
                        .await?;
                    if !updated {
                        warn!(notification_id = %notification.id, "notification left queued while sending");
                    }
                    info!(
                        notification_id = %notification.id,
                        user_id = %notification.user_id,
                        attempt,
                        "notification sent"
                    );
                    return Ok(());
                }
                Err(e) if self.retry.has_attempts_left(attempt) => {
                    let delay = self.retry.backoff(attempt);
                    warn!(
                        notification_id = %notification.id,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "delivery failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let reason = e.to_string();
                    self.store
                        .mark_failed(notification.id, attempts, &reason)
                        .await?;
                    error!(
                        notification_id = %notification.id,
                        attempts,
                        error = %reason,
                        "delivery failed; notification marked failed"
                    );
                    return Err(DeliveryError::Exhausted {
                        notification_id: notification.id,
                        attempts,
                        reason,
                    });
                }
            }
        }
    }

    /// Records delivery confirmation: `sent -> delivered`.
    ///
    /// Returns `false` when the notification was not in the `sent` state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the store update fails.
    pub async fn confirm_delivery(&self, notification_id: Uuid) -> Result<bool, DomainError> {
        let confirmed = self
            .store
            .mark_delivered(notification_id, self.clock.now())
            .await?;
        if confirmed {
            info!(%notification_id, "notification delivered");
        }
        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use courier_core::notification::{NewNotification, NotificationChannel, NotificationContent};
    use courier_test_support::{FailingSink, FlakySink, InMemoryStore, ManualClock, RecordingSink};

    use super::*;

    async fn queued(store: &InMemoryStore) -> Notification {
        let new = NewNotification {
            user_id: Uuid::new_v4(),
            outbox_event_id: Uuid::new_v4(),
            channel: NotificationChannel::Email,
            content: NotificationContent {
                subject: "Welcome to our platform!".into(),
                body: "Hi alice".into(),
                data: None,
            },
        };
        store.insert(new, Utc::now()).await.unwrap().unwrap()
    }

    fn retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        }
    }

    fn setup() -> (Arc<InMemoryStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let store = Arc::new(InMemoryStore::new(clock.clone()));
        (store, clock)
    }

    #[tokio::test]
    async fn test_send_marks_notification_sent() {
        // Arrange
        let (store, clock) = setup();
        let sink = Arc::new(RecordingSink::new());
        let sender = NotificationSender::new(store.clone(), sink.clone(), retry(1), clock.clone());
        let notification = queued(&store).await;

        // Act
        sender.send(&notification).await.unwrap();

        // Assert
        let stored = NotificationStore::find_by_id(store.as_ref(), notification.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, NotificationStatus::Sent);
        assert_eq!(stored.sent_at, Some(clock.now()));
        assert_eq!(stored.attempts, 1);
        assert_eq!(sink.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_sink_leaves_notification_failed() {
        // Arrange
        let (store, clock) = setup();
        let sink = Arc::new(FailingSink::new());
        let sender = NotificationSender::new(store.clone(), sink.clone(), retry(3), clock);
        let notification = queued(&store).await;

        // Act
        let result = sender.send(&notification).await;

        // Assert
        match result {
            Err(DeliveryError::Exhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(sink.attempts(), 3);
        let stored = store.notifications().pop().unwrap();
        assert_eq!(stored.status, NotificationStatus::Failed);
        assert_eq!(stored.attempts, 3);
        assert!(stored.last_error.is_some());
        assert!(stored.sent_at.is_none());
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let (store, clock) = setup();
        let sink = Arc::new(FlakySink::new(1));
        let sender = NotificationSender::new(store.clone(), sink.clone(), retry(2), clock);
        let notification = queued(&store).await;

        sender.send(&notification).await.unwrap();

        let stored = store.notifications().pop().unwrap();
        assert_eq!(stored.status, NotificationStatus::Sent);
        assert_eq!(stored.attempts, 2);
        assert_eq!(sink.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_already_sent_notification_is_not_redelivered() {
        let (store, clock) = setup();
        let sink = Arc::new(RecordingSink::new());
        let sender = NotificationSender::new(store.clone(), sink.clone(), retry(1), clock);
        let notification = queued(&store).await;
        sender.send(&notification).await.unwrap();
        let sent = store.notifications().pop().unwrap();

        sender.send(&sent).await.unwrap();

        assert_eq!(sink.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_confirm_delivery_only_from_sent() {
        let (store, clock) = setup();
        let sender = NotificationSender::new(
            store.clone(),
            Arc::new(RecordingSink::new()),
            retry(1),
            clock,
        );
        let notification = queued(&store).await;

        assert!(!sender.confirm_delivery(notification.id).await.unwrap());
        sender.send(&notification).await.unwrap();
        assert!(sender.confirm_delivery(notification.id).await.unwrap());
        assert!(!sender.confirm_delivery(notification.id).await.unwrap());

        let stored = store.notifications().pop().unwrap();
        assert_eq!(stored.status, NotificationStatus::Delivered);
        assert!(stored.delivered_at.is_some());
    }
}
