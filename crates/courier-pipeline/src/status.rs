//! Liveness reporting for health checks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// Shared, cloneable view of pipeline liveness.
#[derive(Debug, Clone, Default)]
pub struct PipelineStatus {
    listener_alive: Arc<AtomicBool>,
    last_scan_at: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl PipelineStatus {
    /// Creates a status with the listener down and no scans recorded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the change-feed subscription is currently open.
    #[must_use]
    pub fn is_listener_alive(&self) -> bool {
        self.listener_alive.load(Ordering::Acquire)
    }

    /// When the last reconciliation scan completed.
    #[must_use]
    pub fn last_scan_at(&self) -> Option<DateTime<Utc>> {
        self.last_scan_at.lock().ok().and_then(|last| *last)
    }

    pub(crate) fn set_listener_alive(&self, alive: bool) {
        self.listener_alive.store(alive, Ordering::Release);
    }

    pub(crate) fn record_scan(&self, at: DateTime<Utc>) {
        if let Ok(mut last) = self.last_scan_at.lock() {
            *last = Some(at);
        }
    }
}
