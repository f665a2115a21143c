//! Test sinks: scripted `DeliverySink` implementations.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use courier_core::error::DeliveryError;
use courier_core::notification::{NotificationChannel, NotificationContent};
use courier_core::sink::DeliverySink;
use uuid::Uuid;

/// A sink that accepts every delivery and records it.
#[derive(Debug, Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(NotificationChannel, Uuid, NotificationContent)>>,
}

impl RecordingSink {
    /// Creates an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every accepted delivery.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn delivered(&self) -> Vec<(NotificationChannel, Uuid, NotificationContent)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(
        &self,
        channel: NotificationChannel,
        recipient: Uuid,
        content: &NotificationContent,
    ) -> Result<(), DeliveryError> {
        self.delivered
            .lock()
            .unwrap()
            .push((channel, recipient, content.clone()));
        Ok(())
    }
}

/// A sink that rejects every delivery and counts the attempts.
#[derive(Debug, Default)]
pub struct FailingSink {
    attempts: AtomicU32,
}

impl FailingSink {
    /// Creates a failing sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of deliveries attempted so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliverySink for FailingSink {
    async fn deliver(
        &self,
        _channel: NotificationChannel,
        _recipient: Uuid,
        _content: &NotificationContent,
    ) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(DeliveryError::Sink("smtp relay refused connection".into()))
    }
}

/// A sink that fails the first `failures` deliveries and then delegates to
/// an inner `RecordingSink`.
#[derive(Debug)]
pub struct FlakySink {
    remaining_failures: AtomicU32,
    inner: RecordingSink,
}

impl FlakySink {
    /// Creates a sink that fails `failures` times before succeeding.
    #[must_use]
    pub fn new(failures: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(failures),
            inner: RecordingSink::new(),
        }
    }

    /// Deliveries that eventually succeeded.
    pub fn delivered(&self) -> Vec<(NotificationChannel, Uuid, NotificationContent)> {
        self.inner.delivered()
    }
}

#[async_trait]
impl DeliverySink for FlakySink {
    async fn deliver(
        &self,
        channel: NotificationChannel,
        recipient: Uuid,
        content: &NotificationContent,
    ) -> Result<(), DeliveryError> {
        let failed = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(DeliveryError::Sink("temporary failure".into()));
        }
        self.inner.deliver(channel, recipient, content).await
    }
}
