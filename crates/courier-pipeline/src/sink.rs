//! Simulated delivery sink.

use std::time::Duration;

use async_trait::async_trait;
use courier_core::error::DeliveryError;
use courier_core::notification::{NotificationChannel, NotificationContent};
use courier_core::sink::DeliverySink;
use tracing::info;
use uuid::Uuid;

/// A sink that logs each delivery and waits a fixed latency instead of
/// talking to a real channel. Always succeeds.
#[derive(Debug, Clone, Copy)]
pub struct LoggingSink {
    latency: Duration,
}

impl LoggingSink {
    /// Creates a sink that takes `latency` per delivery.
    #[must_use]
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }
}

impl Default for LoggingSink {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

#[async_trait]
impl DeliverySink for LoggingSink {
    async fn deliver(
        &self,
        channel: NotificationChannel,
        recipient: Uuid,
        content: &NotificationContent,
    ) -> Result<(), DeliveryError> {
        info!(
            %channel,
            %recipient,
            subject = %content.subject,
            "delivering notification"
        );
        tokio::time::sleep(self.latency).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_sink_waits_for_latency_then_succeeds() {
        let sink = LoggingSink::new(Duration::from_millis(20));
        let content = NotificationContent {
            subject: "Welcome".into(),
            body: "hi".into(),
            data: None,
        };
        let started = tokio::time::Instant::now();

        let result = sink
            .deliver(NotificationChannel::Email, Uuid::new_v4(), &content)
            .await;

        assert!(result.is_ok());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
