//! # LogWriter: renders lifecycle events through `tracing`.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO  worker launched worker="trading-bot" detail="pid 4242: python3 -m bot.main"
//! INFO  running task worker="news-cache" attempt=1
//! WARN  task failed, will retry next interval worker="news-cache" attempt=1 reason="exited with status 1"
//! INFO  sleeping until next run worker="news-cache" delay_ms=10800000
//! ERROR worker exited unexpectedly worker="trading-bot" reason="exited with status 2"
//! INFO  shutdown requested trigger="interrupt signal"
//! WARN  worker force-terminated after grace period worker="dashboard" grace_ms=10000
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that logs every event at a level matching its severity.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let worker = e.worker.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::WorkerLaunched => info!(worker, detail = reason, "worker launched"),
            EventKind::WorkerLaunchFailed => {
                error!(worker, reason, "worker failed to launch, aborting startup")
            }
            EventKind::SettleDelay => {
                info!(worker, delay_ms = e.delay_ms, "settling before next launch")
            }
            EventKind::StartupComplete => info!("all workers running"),
            EventKind::TaskStarting => info!(worker, attempt = e.attempt, "running task"),
            EventKind::TaskSucceeded => {
                info!(worker, attempt = e.attempt, "task completed successfully")
            }
            EventKind::TaskFailed => warn!(
                worker,
                attempt = e.attempt,
                exit_code = e.exit_code,
                reason,
                "task failed, will retry next interval"
            ),
            EventKind::SleepScheduled => {
                info!(worker, delay_ms = e.delay_ms, "sleeping until next run")
            }
            EventKind::SchedulerStopped => info!(worker, "scheduler stopped"),
            EventKind::WorkerExited => error!(
                worker,
                exit_code = e.exit_code,
                reason,
                "worker exited unexpectedly"
            ),
            EventKind::ShutdownRequested => info!(trigger = reason, "shutdown requested"),
            EventKind::StopRequested => debug!(worker, "stop requested"),
            EventKind::WorkerStopped if e.reason.is_some() => {
                warn!(worker, reason, "worker stopped with failure")
            }
            EventKind::WorkerStopped => info!(worker, "worker stopped"),
            EventKind::ForceKilled => warn!(
                worker,
                grace_ms = e.delay_ms,
                reason,
                "worker force-terminated after grace period"
            ),
            EventKind::AllStoppedWithin => info!("all workers stopped within grace period"),
            EventKind::GraceExceeded => warn!(stuck = reason, "grace period exceeded"),
            EventKind::SubscriberOverflow => {
                warn!(subscriber = worker, reason, "subscriber dropped an event")
            }
            EventKind::SubscriberPanicked => {
                error!(subscriber = worker, reason, "subscriber panicked")
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
