//! Wires the dispatcher, listener and scanner together and runs them as
//! background tasks.

use std::sync::Arc;

use courier_core::clock::Clock;
use courier_core::feed::ChangeFeed;
use courier_core::repository::{NotificationStore, OutboxStore};
use courier_core::sink::DeliverySink;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::dispatcher::EventDispatcher;
use crate::listener::ChangeFeedListener;
use crate::registry::HandlerRegistry;
use crate::scanner::ReconciliationScanner;
use crate::sender::NotificationSender;
use crate::status::PipelineStatus;

/// Everything the pipeline needs from the outside world.
pub struct PipelineComponents {
    /// Outbox log claimed and finalized by the dispatcher.
    pub outbox: Arc<dyn OutboxStore>,
    /// Where handler output is recorded.
    pub notifications: Arc<dyn NotificationStore>,
    /// Source of live inserts. `None` runs the scanner alone.
    pub feed: Option<Arc<dyn ChangeFeed>>,
    /// Handlers keyed by event type.
    pub registry: HandlerRegistry,
    /// Delivery target for queued notifications.
    pub sink: Arc<dyn DeliverySink>,
    /// Time source for claims, backoff and timestamps.
    pub clock: Arc<dyn Clock>,
}

/// A running pipeline.
pub struct PipelineHandle {
    dispatcher: Arc<EventDispatcher>,
    status: PipelineStatus,
    shutdown: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl PipelineHandle {
    /// Liveness view shared with the running tasks.
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        self.status.clone()
    }

    /// The dispatcher used by both producers.
    #[must_use]
    pub fn dispatcher(&self) -> Arc<EventDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Stops the listener and scanner and waits for in-flight work to end.
    pub async fn shutdown(self) {
        info!("pipeline shutting down");
        self.shutdown.cancel();
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                error!(task = name, error = %e, "pipeline task panicked");
            }
        }
        info!("pipeline stopped");
    }
}

/// Starts the pipeline on the current tokio runtime.
///
/// The listener is only started when a feed is supplied and
/// `config.change_feed_enabled` is set.
#[must_use]
pub fn start(config: PipelineConfig, components: PipelineComponents) -> PipelineHandle {
    let PipelineComponents {
        outbox,
        notifications,
        feed,
        registry,
        sink,
        clock,
    } = components;

    info!(
        event_types = ?registry.event_types(),
        change_feed = config.change_feed_enabled && feed.is_some(),
        "starting pipeline"
    );

    let sender = Arc::new(NotificationSender::new(
        Arc::clone(&notifications),
        sink,
        config.delivery_retry,
        Arc::clone(&clock),
    ));
    let dispatcher = Arc::new(EventDispatcher::new(
        Arc::clone(&outbox),
        notifications,
        registry,
        sender,
        config.event_retry,
        Arc::clone(&clock),
    ));
    let status = PipelineStatus::new();
    let shutdown = CancellationToken::new();
    let mut tasks = Vec::new();

    if let Some(feed) = feed.filter(|_| config.change_feed_enabled) {
        let listener = ChangeFeedListener::new(
            feed,
            Arc::clone(&dispatcher),
            status.clone(),
            config.listener,
        );
        tasks.push(("listener", tokio::spawn(listener.run(shutdown.clone()))));
    }

    let scanner = ReconciliationScanner::new(
        outbox,
        Arc::clone(&dispatcher),
        clock,
        status.clone(),
        config.scanner,
        shutdown.clone(),
    );
    tasks.push(("scanner", tokio::spawn(async move { scanner.run().await })));

    PipelineHandle {
        dispatcher,
        status,
        shutdown,
        tasks,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use courier_core::clock::SystemClock;
    use courier_core::handler::{EventHandler, HandlerError};
    use courier_core::notification::{
        NewNotification, NotificationChannel, NotificationContent, NotificationStatus,
    };
    use courier_core::outbox::{OutboxEvent, OutboxStatus};
    use courier_test_support::{InMemoryStore, RecordingSink, user_created_event};
    use uuid::Uuid;

    use super::*;
    use crate::config::ScannerConfig;

    struct WelcomeHandler;

    #[async_trait]
    impl EventHandler for WelcomeHandler {
        async fn handle(
            &self,
            event: &OutboxEvent,
        ) -> Result<Option<NewNotification>, HandlerError> {
            Ok(Some(NewNotification {
                user_id: event.aggregate_id,
                outbox_event_id: event.id,
                channel: NotificationChannel::Email,
                content: NotificationContent {
                    subject: "Welcome to our platform!".into(),
                    body: "Hi".into(),
                    data: None,
                },
            }))
        }
    }

    fn components(
        store: &Arc<InMemoryStore>,
        feed: bool,
        sink: Arc<RecordingSink>,
    ) -> PipelineComponents {
        PipelineComponents {
            outbox: store.clone(),
            notifications: store.clone(),
            feed: feed.then(|| store.clone() as Arc<dyn ChangeFeed>),
            registry: HandlerRegistry::new().with("user.created", Arc::new(WelcomeHandler)),
            sink,
            clock: Arc::new(SystemClock),
        }
    }

    fn config(change_feed_enabled: bool) -> PipelineConfig {
        PipelineConfig {
            change_feed_enabled,
            scanner: ScannerConfig {
                interval: Duration::from_millis(20),
                ..ScannerConfig::default()
            },
            ..PipelineConfig::default()
        }
    }

    async fn wait_for_sent(store: &InMemoryStore, count: usize) {
        for _ in 0..200 {
            let sent = store
                .notifications()
                .iter()
                .filter(|n| n.status == NotificationStatus::Sent)
                .count();
            if sent >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("notifications were not sent in time");
    }

    #[tokio::test]
    async fn test_pipeline_delivers_each_event_once() {
        // Arrange
        let store = Arc::new(InMemoryStore::new(Arc::new(SystemClock)));
        let sink = Arc::new(RecordingSink::new());
        let handle = start(config(true), components(&store, true, sink.clone()));

        // Act
        for i in 0..10 {
            store.seed_event(user_created_event(
                Uuid::new_v4(),
                &format!("user{i}"),
                &format!("user{i}@x.com"),
            ));
        }
        wait_for_sent(&store, 10).await;
        handle.shutdown().await;

        // Assert
        assert!(
            store
                .outbox_events()
                .iter()
                .all(|e| e.status == OutboxStatus::Processed && e.attempts == 1)
        );
        assert_eq!(store.notifications().len(), 10);
        assert_eq!(sink.delivered().len(), 10);
    }

    #[tokio::test]
    async fn test_scanner_alone_processes_events() {
        let store = Arc::new(InMemoryStore::new(Arc::new(SystemClock)));
        let sink = Arc::new(RecordingSink::new());
        let handle = start(config(false), components(&store, true, sink.clone()));

        store.seed_event(user_created_event(Uuid::new_v4(), "alice", "alice@x.com"));
        wait_for_sent(&store, 1).await;

        assert!(!handle.status().is_listener_alive());
        assert_eq!(store.subscription_count(), 0);
        handle.shutdown().await;
        assert_eq!(sink.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_events_inserted_while_feed_is_down_are_recovered() {
        // Arrange
        let store = Arc::new(InMemoryStore::new(Arc::new(SystemClock)));
        store.set_change_feed_enabled(false);
        let sink = Arc::new(RecordingSink::new());
        let handle = start(config(true), components(&store, true, sink.clone()));

        // Act
        store.seed_event(user_created_event(Uuid::new_v4(), "alice", "alice@x.com"));
        wait_for_sent(&store, 1).await;
        handle.shutdown().await;

        // Assert
        let events = store.outbox_events();
        assert_eq!(events[0].status, OutboxStatus::Processed);
        assert_eq!(sink.delivered().len(), 1);
    }
}
