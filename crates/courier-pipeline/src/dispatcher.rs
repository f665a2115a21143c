//! Event dispatcher: claim, route, execute, finalize.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use courier_core::clock::Clock;
use courier_core::error::DomainError;
use courier_core::handler::{EventHandler, HandlerError};
use courier_core::notification::Notification;
use courier_core::outbox::{Finalization, OutboxEvent};
use courier_core::repository::{NotificationStore, OutboxStore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::registry::HandlerRegistry;
use crate::retry::{RetryPolicy, later};
use crate::sender::NotificationSender;

/// What happened to an event passed to [`EventDispatcher::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Another worker claimed the event first; nothing was done.
    ClaimLost,
    /// The handler succeeded and the event is `processed`.
    Processed {
        /// The notification created for the event, if any.
        notification_id: Option<Uuid>,
    },
    /// No handler is registered for the event type; the event is `processed`.
    Unrouted,
    /// The handler failed and the event is `failed`.
    Failed {
        /// Handler error message.
        error: String,
    },
    /// The handler failed and the event was returned to `pending`.
    Retrying {
        /// Handler error message.
        error: String,
        /// Earliest time of the next claim.
        available_at: DateTime<Utc>,
    },
}

/// Single entry point for both the change-feed listener and the scanner.
pub struct EventDispatcher {
    outbox: Arc<dyn OutboxStore>,
    notifications: Arc<dyn NotificationStore>,
    registry: HandlerRegistry,
    sender: Arc<NotificationSender>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl EventDispatcher {
    /// Creates a dispatcher.
    #[must_use]
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        notifications: Arc<dyn NotificationStore>,
        registry: HandlerRegistry,
        sender: Arc<NotificationSender>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            outbox,
            notifications,
            registry,
            sender,
            retry,
            clock,
        }
    }

    /// Processes one outbox event. Safe to call any number of times, from
    /// any number of tasks, for the same event: only the caller that wins
    /// the claim does any work.
    ///
    /// Handler and delivery failures are recorded on the event and the
    /// notification and reported through the returned outcome.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` only when the outbox store itself fails during
    /// the claim or the final state update.
    pub async fn handle(&self, event: &OutboxEvent) -> Result<DispatchOutcome, DomainError> {
        let Some(claimed) = self.outbox.claim(event.id, self.clock.now()).await? else {
            debug!(event_id = %event.id, "event already claimed; skipping");
            return Ok(DispatchOutcome::ClaimLost);
        };

        debug!(
            event_id = %claimed.id,
            event_type = %claimed.event_type,
            attempt = claimed.attempts,
            "event claimed"
        );

        let Some(handler) = self.registry.get(&claimed.event_type) else {
            warn!(
                event_id = %claimed.id,
                event_type = %claimed.event_type,
                "no handler registered for event type; marking processed"
            );
            self.finalize(&claimed, Finalization::Processed).await?;
            return Ok(DispatchOutcome::Unrouted);
        };

        match self.execute(handler.as_ref(), &claimed).await {
            Ok(notification) => {
                self.finalize(&claimed, Finalization::Processed).await?;
                info!(
                    event_id = %claimed.id,
                    event_type = %claimed.event_type,
                    "event processed"
                );
                if let Some(notification) = &notification {
                    // The event stays processed whatever happens to delivery.
                    if let Err(e) = self.sender.send(notification).await {
                        warn!(
                            event_id = %claimed.id,
                            notification_id = %notification.id,
                            error = %e,
                            "notification delivery failed"
                        );
                    }
                }
                Ok(DispatchOutcome::Processed {
                    notification_id: notification.map(|n| n.id),
                })
            }
            Err(e) => {
                let error = e.to_string();
                let attempts = u32::try_from(claimed.attempts).unwrap_or(u32::MAX);
                if self.retry.has_attempts_left(attempts) {
                    let available_at = later(self.clock.now(), self.retry.backoff(attempts));
                    warn!(
                        event_id = %claimed.id,
                        event_type = %claimed.event_type,
                        attempt = attempts,
                        %available_at,
                        error = %error,
                        "event handler failed; retry scheduled"
                    );
                    self.finalize(
                        &claimed,
                        Finalization::Retry {
                            error: error.clone(),
                            available_at,
                        },
                    )
                    .await?;
                    Ok(DispatchOutcome::Retrying {
                        error,
                        available_at,
                    })
                } else {
                    error!(
                        event_id = %claimed.id,
                        event_type = %claimed.event_type,
                        attempt = attempts,
                        error = %error,
                        "event handler failed; marking failed"
                    );
                    self.finalize(
                        &claimed,
                        Finalization::Failed {
                            error: error.clone(),
                        },
                    )
                    .await?;
                    Ok(DispatchOutcome::Failed { error })
                }
            }
        }
    }

    /// Runs the handler and persists the notification it produces.
    ///
    /// When an earlier attempt already stored the event's notification, that
    /// record is returned instead, so a queued one still gets sent.
    async fn execute(
        &self,
        handler: &dyn EventHandler,
        event: &OutboxEvent,
    ) -> Result<Option<Notification>, HandlerError> {
        let Some(new_notification) = handler.handle(event).await? else {
            return Ok(None);
        };
        if let Some(stored) = self
            .notifications
            .insert(new_notification, self.clock.now())
            .await?
        {
            return Ok(Some(stored));
        }

        let existing = self
            .notifications
            .find_by_outbox_event(event.id)
            .await?
            .into_iter()
            .next();
        debug!(
            event_id = %event.id,
            notification_id = ?existing.as_ref().map(|n| n.id),
            status = ?existing.as_ref().map(|n| n.status),
            "notification for event already exists"
        );
        Ok(existing)
    }

    async fn finalize(
        &self,
        event: &OutboxEvent,
        finalization: Finalization,
    ) -> Result<(), DomainError> {
        let status = finalization.status();
        let updated = self
            .outbox
            .finalize(event.id, finalization, self.clock.now())
            .await?;
        if !updated {
            warn!(
                event_id = %event.id,
                %status,
                "event was no longer processing; state left unchanged"
            );
        }
        Ok(())
    }
}

/// Dispatches `event` and logs the outcome. Used by the producers, which
/// never propagate dispatch errors.
pub(crate) async fn dispatch_and_log(
    dispatcher: &EventDispatcher,
    event: &OutboxEvent,
    source: &'static str,
) -> Option<DispatchOutcome> {
    match dispatcher.handle(event).await {
        Ok(outcome) => {
            debug!(event_id = %event.id, source, ?outcome, "dispatch finished");
            Some(outcome)
        }
        Err(e) => {
            error!(event_id = %event.id, source, error = %e, "dispatch failed");
            None
        }
    }
}
