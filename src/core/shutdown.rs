//! # Shutdown: triggers, signals and the grace-bounded teardown.
//!
//! ## Triggers
//! - `SIGINT` / `SIGTERM` on Unix, Ctrl-C elsewhere ([`ShutdownSignals`]);
//! - a process worker exiting on its own;
//! - a launch failure during startup.
//!
//! ## Teardown
//! ```text
//! teardown(registry, trigger)
//!   ├─► publish ShutdownRequested
//!   ├─► registry.begin_shutdown() ─► handles
//!   ├─► for each handle: publish StopRequested, cancel its stop token   (all at once)
//!   ├─► join all, each bounded by the same deadline (now + grace)
//!   │      ├─ task ended ────► sweep its process group (SIGTERM, SIGKILL at the deadline)
//!   │      └─ deadline hit ─► SIGKILL process group + abort task ─► publish ForceKilled
//!   ├─► publish AllStoppedWithin | GraceExceeded
//!   └─► registry.finish() ─► ShutdownReport
//! ```
//!
//! ## Rules
//! - Stop requests are delivered concurrently; one slow worker never delays
//!   another's signal.
//! - Teardown always completes: after the grace period nothing is awaited for
//!   longer than [`KILL_WAIT`].
//! - No process a worker started outlives the teardown, even when the worker's
//!   own child had already exited.
//! - A forced kill is reported but is not a failure.

use std::fmt;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{self, Instant};

use crate::{
    core::{
        registry::Registry,
        worker::{WorkerHandle, WorkerOutcome},
    },
    events::{Bus, Event, EventKind},
};

/// How long to wait for a worker task to unwind after it was killed.
pub const KILL_WAIT: Duration = Duration::from_secs(1);

/// OS signal that requested shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGINT or Ctrl-C.
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Interrupt => f.write_str("interrupt"),
            ShutdownSignal::Terminate => f.write_str("terminate"),
        }
    }
}

/// Installed signal listeners.
///
/// Install them before launching anything so a signal that arrives during
/// startup is not lost.
#[cfg(unix)]
pub struct ShutdownSignals {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    /// Registers SIGINT and SIGTERM handlers.
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Completes on the next SIGINT or SIGTERM.
    pub async fn recv(&mut self) -> ShutdownSignal {
        tokio::select! {
            _ = self.sigint.recv() => ShutdownSignal::Interrupt,
            _ = self.sigterm.recv() => ShutdownSignal::Terminate,
        }
    }
}

/// Installed signal listeners.
#[cfg(not(unix))]
pub struct ShutdownSignals {
    _priv: (),
}

#[cfg(not(unix))]
impl ShutdownSignals {
    /// Nothing to register ahead of time; Ctrl-C is awaited in [`recv`](Self::recv).
    pub fn install() -> std::io::Result<Self> {
        Ok(Self { _priv: () })
    }

    /// Completes on the next Ctrl-C.
    pub async fn recv(&mut self) -> ShutdownSignal {
        if tokio::signal::ctrl_c().await.is_err() {
            // Without a handler, never fire.
            std::future::pending::<()>().await;
        }
        ShutdownSignal::Interrupt
    }
}

/// What started the teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownTrigger {
    /// An OS signal.
    Signal(ShutdownSignal),
    /// A process worker exited without being asked to.
    WorkerExited {
        /// Worker name.
        worker: String,
    },
    /// A worker could not be launched.
    StartupFailed {
        /// Worker name.
        worker: String,
    },
}

impl fmt::Display for ShutdownTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownTrigger::Signal(sig) => write!(f, "{sig} signal"),
            ShutdownTrigger::WorkerExited { worker } => write!(f, "worker {worker:?} exited"),
            ShutdownTrigger::StartupFailed { worker } => {
                write!(f, "worker {worker:?} failed to launch")
            }
        }
    }
}

/// Result of a teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// What started the teardown.
    pub trigger: ShutdownTrigger,
    /// Per-worker outcome, in launch order.
    pub outcomes: Vec<(String, WorkerOutcome)>,
    /// At least one worker, or something left in its process group, had to
    /// be killed.
    pub grace_exceeded: bool,
}

impl ShutdownReport {
    /// Workers that reported a failure.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &WorkerOutcome)> {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_failure())
            .map(|(n, o)| (n.as_str(), o))
    }

    /// Outcome of one worker.
    pub fn outcome(&self, worker: &str) -> Option<&WorkerOutcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == worker)
            .map(|(_, o)| o)
    }

    /// Process exit status: 1 after a failed launch or any worker failure, else 0.
    pub fn exit_code(&self) -> u8 {
        let startup_failed = matches!(self.trigger, ShutdownTrigger::StartupFailed { .. });
        if startup_failed || self.failures().next().is_some() {
            1
        } else {
            0
        }
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger: {}", self.trigger)?;
        for (name, outcome) in &self.outcomes {
            match outcome {
                WorkerOutcome::Stopped => write!(f, "; {name}: stopped")?,
                WorkerOutcome::ForceKilled => write!(f, "; {name}: killed")?,
                WorkerOutcome::Failed { reason } => write!(f, "; {name}: failed ({reason})")?,
            }
        }
        Ok(())
    }
}

/// Stops every registered worker within a grace period.
pub struct ShutdownCoordinator {
    grace: Duration,
    bus: Bus,
}

impl ShutdownCoordinator {
    /// Creates a coordinator.
    pub fn new(grace: Duration, bus: Bus) -> Self {
        Self { grace, bus }
    }

    /// Stops all workers held by `registry` and reports how each ended.
    pub async fn teardown(&self, registry: &mut Registry, trigger: ShutdownTrigger) -> ShutdownReport {
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_reason(trigger.to_string()));

        let handles = registry.begin_shutdown();
        for h in &handles {
            self.bus
                .publish(Event::new(EventKind::StopRequested).with_worker(h.name()));
            h.request_stop();
        }

        let deadline = Instant::now() + self.grace;
        let reaped = join_all(handles.into_iter().map(|h| self.reap(h, deadline))).await;
        let killed: Vec<&str> = reaped
            .iter()
            .filter(|r| r.killed)
            .map(|r| r.name.as_str())
            .collect();
        let grace_exceeded = !killed.is_empty();

        if grace_exceeded {
            self.bus.publish(
                Event::new(EventKind::GraceExceeded)
                    .with_delay(self.grace)
                    .with_reason(killed.join(", ")),
            );
        } else {
            self.bus
                .publish(Event::new(EventKind::AllStoppedWithin).with_delay(self.grace));
        }
        registry.finish();

        ShutdownReport {
            trigger,
            outcomes: reaped.into_iter().map(|r| (r.name, r.outcome)).collect(),
            grace_exceeded,
        }
    }

    async fn reap(&self, mut handle: WorkerHandle, deadline: Instant) -> Reaped {
        let name = handle.name().to_string();

        let outcome = match time::timeout_at(deadline, handle.join_mut()).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => WorkerOutcome::Failed {
                reason: format!("worker task ended abnormally: {e}"),
            },
            Err(_elapsed) => {
                handle.force_terminate();
                self.publish_kill(&name, None);
                let _ = time::timeout(KILL_WAIT, handle.join_mut()).await;
                return Reaped {
                    name,
                    outcome: WorkerOutcome::ForceKilled,
                    killed: true,
                };
            }
        };

        // The outcome stands; only the leftovers are killed.
        let killed = handle.sweep_group(deadline).await;
        if killed {
            self.publish_kill(&name, Some("process group outlived the worker"));
        }
        Reaped {
            name,
            outcome,
            killed,
        }
    }

    fn publish_kill(&self, worker: &str, reason: Option<&str>) {
        let mut ev = Event::new(EventKind::ForceKilled)
            .with_worker(worker)
            .with_delay(self.grace);
        if let Some(reason) = reason {
            ev = ev.with_reason(reason);
        }
        self.bus.publish(ev);
    }
}

struct Reaped {
    name: String,
    outcome: WorkerOutcome,
    killed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::watch;
    use tokio_util::sync::CancellationToken;

    fn no_child() -> watch::Receiver<Option<u32>> {
        watch::channel(None).1
    }

    fn cooperative(name: &str, outcome: WorkerOutcome, unwind: Duration) -> WorkerHandle {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let join = tokio::spawn(async move {
            token.cancelled().await;
            time::sleep(unwind).await;
            outcome
        });
        WorkerHandle::new(name, join, stop, no_child())
    }

    fn stubborn(name: &str) -> WorkerHandle {
        let join = tokio::spawn(async {
            time::sleep(Duration::from_secs(3600)).await;
            WorkerOutcome::Stopped
        });
        WorkerHandle::new(name, join, CancellationToken::new(), no_child())
    }

    #[tokio::test(start_paused = true)]
    async fn all_stop_within_grace() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let mut reg = Registry::new();
        reg.insert(cooperative("news-cache", WorkerOutcome::Stopped, Duration::ZERO))
            .unwrap();
        reg.insert(cooperative("dashboard", WorkerOutcome::Stopped, Duration::from_secs(2)))
            .unwrap();
        reg.freeze();

        let coord = ShutdownCoordinator::new(Duration::from_secs(10), bus);
        let report = coord
            .teardown(&mut reg, ShutdownTrigger::Signal(ShutdownSignal::Interrupt))
            .await;

        assert!(!report.grace_exceeded);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(reg.phase(), crate::core::registry::Phase::Stopped);

        let mut kinds = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            kinds.push(ev.kind);
        }
        assert_eq!(kinds.first(), Some(&EventKind::ShutdownRequested));
        assert_eq!(kinds.last(), Some(&EventKind::AllStoppedWithin));
        assert_eq!(
            kinds.iter().filter(|k| **k == EventKind::StopRequested).count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stragglers_are_killed_after_grace() {
        let bus = Bus::new(64);
        let mut rx = bus.subscribe();
        let mut reg = Registry::new();
        reg.insert(cooperative("news-cache", WorkerOutcome::Stopped, Duration::ZERO))
            .unwrap();
        reg.insert(stubborn("trading-bot")).unwrap();

        let grace = Duration::from_secs(10);
        let started = Instant::now();
        let report = ShutdownCoordinator::new(grace, bus)
            .teardown(&mut reg, ShutdownTrigger::Signal(ShutdownSignal::Terminate))
            .await;

        assert!(started.elapsed() >= grace);
        assert!(started.elapsed() < grace + KILL_WAIT + Duration::from_millis(10));
        assert!(report.grace_exceeded);
        assert_eq!(report.outcome("trading-bot"), Some(&WorkerOutcome::ForceKilled));
        assert_eq!(report.outcome("news-cache"), Some(&WorkerOutcome::Stopped));
        assert_eq!(report.exit_code(), 0, "a forced kill is not a failure");

        let mut saw_kill = false;
        let mut last = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::ForceKilled {
                assert!(ev.is_for("trading-bot"));
                saw_kill = true;
            }
            last = Some(ev.kind);
        }
        assert!(saw_kill);
        assert_eq!(last, Some(EventKind::GraceExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn worker_failure_makes_exit_code_nonzero() {
        let mut reg = Registry::new();
        reg.insert(cooperative(
            "trading-bot",
            WorkerOutcome::Failed {
                reason: "exited unexpectedly".into(),
            },
            Duration::ZERO,
        ))
        .unwrap();

        let report = ShutdownCoordinator::new(Duration::from_secs(1), Bus::new(16))
            .teardown(
                &mut reg,
                ShutdownTrigger::WorkerExited {
                    worker: "trading-bot".into(),
                },
            )
            .await;

        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failures().count(), 1);
        assert!(report.to_string().contains("trading-bot: failed"));
    }

    #[tokio::test]
    async fn empty_registry_tears_down_immediately() {
        let mut reg = Registry::new();
        let report = ShutdownCoordinator::new(Duration::from_secs(10), Bus::new(8))
            .teardown(
                &mut reg,
                ShutdownTrigger::StartupFailed {
                    worker: "news-cache".into(),
                },
            )
            .await;
        assert!(report.outcomes.is_empty());
        assert_eq!(report.exit_code(), 1);
    }
}
