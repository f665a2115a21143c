//! Pipeline configuration.

use std::time::Duration;

use crate::retry::RetryPolicy;

/// Reconciliation scanner settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannerConfig {
    /// Delay between idle scans.
    pub interval: Duration,
    /// Maximum events dispatched per scan.
    pub batch_size: i64,
    /// Only events at least this old are swept; younger ones are left to the
    /// change-feed listener.
    pub grace_period: Duration,
    /// Events stuck in `processing` longer than this are returned to
    /// `pending`. `None` disables the release.
    pub stale_claim_timeout: Option<Duration>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            batch_size: 100,
            grace_period: Duration::ZERO,
            stale_claim_timeout: None,
        }
    }
}

/// Change-feed listener settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerConfig {
    /// First delay before resubscribing after the feed drops.
    pub initial_reconnect_delay: Duration,
    /// Upper bound on the resubscribe delay.
    pub max_reconnect_delay: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            initial_reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Whether to run the change-feed listener at all. The scanner alone is
    /// sufficient for correctness.
    pub change_feed_enabled: bool,
    /// Listener settings.
    pub listener: ListenerConfig,
    /// Scanner settings.
    pub scanner: ScannerConfig,
    /// Retry policy for failed event handlers.
    pub event_retry: RetryPolicy,
    /// Retry policy for failed sink deliveries.
    pub delivery_retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            change_feed_enabled: true,
            listener: ListenerConfig::default(),
            scanner: ScannerConfig::default(),
            event_retry: RetryPolicy::no_retry(),
            delivery_retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(200),
                max_backoff: Duration::from_secs(5),
            },
        }
    }
}
