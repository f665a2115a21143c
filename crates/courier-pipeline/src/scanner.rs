//! Reconciliation scanner.
//!
//! Periodically sweeps the outbox for pending events that the change-feed
//! listener missed and dispatches them. On its own the scanner guarantees
//! every pending event is eventually processed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use courier_core::clock::Clock;
use courier_core::error::DomainError;
use courier_core::repository::OutboxStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ScannerConfig;
use crate::dispatcher::{DispatchOutcome, EventDispatcher, dispatch_and_log};
use crate::retry::earlier;
use crate::status::PipelineStatus;

/// Result of one [`ReconciliationScanner::run_once`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A scan was already in progress; this call did nothing.
    AlreadyRunning,
    /// The scan ran to completion (or stopped early on shutdown).
    Completed {
        /// Pending events found.
        found: usize,
        /// Events this scan claimed and dispatched.
        claimed: usize,
        /// Stale claims returned to `pending` before the sweep.
        released: u64,
        /// Whether this scan claimed events and ready ones may remain, so the
        /// next scan should start immediately.
        more_pending: bool,
    },
}

/// Periodic sweep over pending outbox events.
pub struct ReconciliationScanner {
    outbox: Arc<dyn OutboxStore>,
    dispatcher: Arc<EventDispatcher>,
    clock: Arc<dyn Clock>,
    status: PipelineStatus,
    config: ScannerConfig,
    shutdown: CancellationToken,
    running: AtomicBool,
}

/// Clears the running flag when a scan ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReconciliationScanner {
    /// Creates a scanner.
    #[must_use]
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        dispatcher: Arc<EventDispatcher>,
        clock: Arc<dyn Clock>,
        status: PipelineStatus,
        config: ScannerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            outbox,
            dispatcher,
            clock,
            status,
            config,
            shutdown,
            running: AtomicBool::new(false),
        }
    }

    /// Runs a single sweep.
    ///
    /// Releases stale claims when configured, then dispatches up to
    /// `batch_size` ready events, oldest first, one at a time. Events younger
    /// than the grace period are left for the listener. Concurrent calls do
    /// not overlap: a call made while a sweep is in progress returns
    /// [`ScanOutcome::AlreadyRunning`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError` when the outbox cannot be queried. Failures of
    /// individual dispatches are logged and do not abort the sweep.
    pub async fn run_once(&self) -> Result<ScanOutcome, DomainError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("scan already in progress; skipping");
            return Ok(ScanOutcome::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let released = match self.config.stale_claim_timeout {
            Some(timeout) => {
                let released = self
                    .outbox
                    .release_stale(earlier(self.clock.now(), timeout))
                    .await?;
                if released > 0 {
                    warn!(released, "released stale claims");
                }
                released
            }
            None => 0,
        };

        let now = self.clock.now();
        let created_before = earlier(now, self.config.grace_period);
        let ready = self
            .outbox
            .find_ready(now, created_before, self.config.batch_size)
            .await?;
        let found = ready.len();

        let mut claimed = 0;
        for event in &ready {
            if self.shutdown.is_cancelled() {
                info!("shutdown requested; stopping scan early");
                break;
            }
            match dispatch_and_log(&self.dispatcher, event, "scanner").await {
                Some(DispatchOutcome::ClaimLost) | None => {}
                Some(_) => claimed += 1,
            }
        }

        // Only rescan at once after a scan that made progress.
        let batch_full = i64::try_from(found).unwrap_or(i64::MAX) >= self.config.batch_size;
        let more_pending = claimed > 0
            && (batch_full
                || self
                    .outbox
                    .has_ready(self.clock.now(), created_before)
                    .await?);
        self.status.record_scan(self.clock.now());

        if found > 0 {
            info!(found, claimed, released, "reconciliation scan finished");
        } else {
            debug!("reconciliation scan found nothing");
        }

        Ok(ScanOutcome::Completed {
            found,
            claimed,
            released,
            more_pending,
        })
    }

    /// Scans until shutdown, starting with an immediate scan. When a scan
    /// claims events and either fills its batch or leaves ready events
    /// behind, the next one starts immediately; otherwise the scanner waits
    /// `interval`.
    pub async fn run(&self) {
        info!(
            interval_ms = u64::try_from(self.config.interval.as_millis()).unwrap_or(u64::MAX),
            batch_size = self.config.batch_size,
            "reconciliation scanner started"
        );
        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            delay = match self.run_once().await {
                Ok(ScanOutcome::Completed {
                    more_pending: true, ..
                }) => Duration::ZERO,
                Ok(_) => self.config.interval,
                Err(e) => {
                    error!(error = %e, "reconciliation scan failed");
                    self.config.interval
                }
            };
        }
        info!("reconciliation scanner stopped");
    }
}
