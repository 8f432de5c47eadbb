//! # Lifecycle events emitted by the supervisor, schedulers and process workers.
//!
//! The [`EventKind`] enum classifies events across four groups:
//! - **Startup**: workers launched, settle delays, startup complete
//! - **Scheduling**: periodic task runs and the sleeps between them
//! - **Shutdown**: trigger observed, stop broadcast, reaping, forced termination
//! - **Subscribers**: delivery problems inside the fan-out itself
//!
//! The [`Event`] struct carries optional metadata (worker name, reason, attempt,
//! delay, exit code) depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tradevisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_worker("news-cache")
//!     .with_reason("exited with status 1")
//!     .with_attempt(2)
//!     .with_exit_code(1);
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.worker.as_deref(), Some("news-cache"));
//! assert_eq!(ev.exit_code, Some(1));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked while handling an event.
    ///
    /// Sets: `worker` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `worker` (subscriber name), `reason`.
    SubscriberOverflow,

    // === Startup events ===
    /// Worker started and was recorded in the registry.
    ///
    /// Sets: `worker`.
    WorkerLaunched,

    /// Worker could not be started; startup is aborted.
    ///
    /// Sets: `worker`, `reason`.
    WorkerLaunchFailed,

    /// Supervisor is pausing before launching the next worker.
    ///
    /// Sets: `worker` (the worker just launched), `delay_ms`.
    SettleDelay,

    /// Every configured worker is running; the registry is frozen.
    StartupComplete,

    // === Scheduling events ===
    /// A periodic task invocation is starting.
    ///
    /// Sets: `worker`, `attempt` (1-based invocation counter).
    TaskStarting,

    /// A periodic task invocation finished successfully.
    ///
    /// Sets: `worker`, `attempt`, `exit_code`.
    TaskSucceeded,

    /// A periodic task invocation failed; the scheduler keeps going.
    ///
    /// Sets: `worker`, `attempt`, `reason`, `exit_code` (when the child exited).
    TaskFailed,

    /// Scheduler is sleeping until the next invocation.
    ///
    /// Sets: `worker`, `delay_ms`.
    SleepScheduled,

    /// Scheduler loop left on a stop request.
    ///
    /// Sets: `worker`.
    SchedulerStopped,

    // === Shutdown events ===
    /// A long-running worker exited without being asked to.
    ///
    /// Sets: `worker`, `reason`, `exit_code` (when known).
    WorkerExited,

    /// Shutdown triggered.
    ///
    /// Sets: `reason` (the trigger).
    ShutdownRequested,

    /// Stop request sent to one worker.
    ///
    /// Sets: `worker`.
    StopRequested,

    /// Worker acknowledged the stop and was reaped.
    ///
    /// Sets: `worker`, `reason` (failure detail, if the worker reported one).
    WorkerStopped,

    /// Worker ignored the stop for the whole grace period and was killed.
    ///
    /// Sets: `worker`, `delay_ms` (grace period).
    ForceKilled,

    /// All workers stopped within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; at least one worker was force-terminated.
    ///
    /// Sets: `reason` (comma separated worker names).
    GraceExceeded,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the worker (or subscriber), if applicable.
    pub worker: Option<Arc<str>>,
    /// Human-readable reason (errors, triggers, overflow details).
    pub reason: Option<Arc<str>>,
    /// Invocation counter for periodic tasks (starting from 1).
    pub attempt: Option<u32>,
    /// Delay in milliseconds (sleeps, settle delays, grace period).
    pub delay_ms: Option<u64>,
    /// Exit code of a child process, when it exited normally.
    pub exit_code: Option<i32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            worker: None,
            reason: None,
            attempt: None,
            delay_ms: None,
            exit_code: None,
        }
    }

    /// Attaches a worker name.
    #[inline]
    pub fn with_worker(mut self, worker: impl Into<Arc<str>>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an invocation counter.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u64::MAX)) as u64);
        self
    }

    /// Attaches a child exit code.
    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Returns the delay as a [`Duration`], if set.
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(Duration::from_millis)
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_worker(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_worker(subscriber)
            .with_reason(info)
    }

    /// True for events about a given worker.
    pub fn is_for(&self, worker: &str) -> bool {
        self.worker.as_deref() == Some(worker)
    }
}
