//! Change-feed listener.
//!
//! Pushes newly inserted pending events into the dispatcher as they arrive.
//! The listener only lowers latency; anything it misses while disconnected
//! is picked up by the reconciliation scanner.

use std::sync::Arc;
use std::time::Duration;

use courier_core::feed::ChangeFeed;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ListenerConfig;
use crate::dispatcher::{EventDispatcher, dispatch_and_log};
use crate::status::PipelineStatus;

/// Subscribes to the change feed and dispatches every event it yields.
pub struct ChangeFeedListener {
    feed: Arc<dyn ChangeFeed>,
    dispatcher: Arc<EventDispatcher>,
    status: PipelineStatus,
    config: ListenerConfig,
}

impl ChangeFeedListener {
    /// Creates a listener.
    #[must_use]
    pub fn new(
        feed: Arc<dyn ChangeFeed>,
        dispatcher: Arc<EventDispatcher>,
        status: PipelineStatus,
        config: ListenerConfig,
    ) -> Self {
        Self {
            feed,
            dispatcher,
            status,
            config,
        }
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Each event is dispatched on its own task. When the feed drops or
    /// cannot be opened, the listener waits with exponential backoff and
    /// resubscribes. On shutdown the subscription is dropped and in-flight
    /// dispatches are awaited before returning.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("change feed listener started");
        let mut in_flight = JoinSet::new();
        let mut delay = self.config.initial_reconnect_delay;

        'subscribe: loop {
            let subscription = tokio::select! {
                () = shutdown.cancelled() => break 'subscribe,
                result = self.feed.subscribe() => result,
            };

            match subscription {
                Ok(mut subscription) => {
                    self.status.set_listener_alive(true);
                    delay = self.config.initial_reconnect_delay;
                    info!("change feed subscribed");

                    loop {
                        tokio::select! {
                            () = shutdown.cancelled() => break 'subscribe,
                            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                                if let Err(e) = joined {
                                    error!(error = %e, "dispatch task panicked");
                                }
                            }
                            next = subscription.next_event() => match next {
                                Ok(Some(event)) => {
                                    let dispatcher = Arc::clone(&self.dispatcher);
                                    in_flight.spawn(async move {
                                        dispatch_and_log(&dispatcher, &event, "change_feed").await;
                                    });
                                }
                                Ok(None) => {
                                    warn!("change feed closed; resubscribing");
                                    break;
                                }
                                Err(e) => {
                                    warn!(error = %e, "change feed failed; resubscribing");
                                    break;
                                }
                            },
                        }
                    }

                    self.status.set_listener_alive(false);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        delay_ms = millis(delay),
                        "change feed subscribe failed"
                    );
                }
            }

            tokio::select! {
                () = shutdown.cancelled() => break 'subscribe,
                () = tokio::time::sleep(delay) => {}
            }
            delay = (delay * 2).min(self.config.max_reconnect_delay);
        }

        self.status.set_listener_alive(false);
        info!(in_flight = in_flight.len(), "change feed listener stopping");
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "dispatch task panicked");
            }
        }
        info!("change feed listener stopped");
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
