//! # PeriodicScheduler: run a task at a fixed cadence until stopped.
//!
//! ## State machine
//! ```text
//!            run_immediately            task returns (ok or failed)
//!   Idle ─────────────────────► RunningTask ───────────────────────► Sleeping
//!    │                               ▲                                  │
//!    │ !run_immediately              └────────── interval elapsed ──────┘
//!    └──────────────────────────────────────────────────────────────────►┘
//!
//!   any state ── stop ──► Stopped
//!     - Sleeping:    the sleep is interrupted immediately
//!     - RunningTask: the in-flight invocation finishes first
//! ```
//!
//! ## Rules
//! - The interval is measured from the **completion** of an invocation, so a
//!   slow run never shortens the pause that follows it.
//! - A failed invocation publishes `TaskFailed` and the loop carries on
//!   unchanged; only a stop request ends it.
//! - The invocation counter is monotonic for the life of the scheduler.

use std::time::Duration;

use tokio::{select, sync::watch, time};
use tokio_util::sync::CancellationToken;

use crate::{
    core::{runner::run_once, worker::WorkerOutcome},
    events::{Bus, Event, EventKind},
    tasks::{CommandSpec, RunResult, TaskRef},
};

/// Settings for one periodic scheduler. Immutable once the scheduler exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Wait between the end of one invocation and the start of the next.
    pub interval: Duration,
    /// Run one invocation at startup before the first sleep.
    pub run_immediately: bool,
    /// Command executed on every invocation.
    pub command: CommandSpec,
}

/// Observable scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, loop not started.
    Idle,
    /// An invocation is in flight.
    RunningTask,
    /// Waiting for the interval to elapse.
    Sleeping,
    /// Loop has exited.
    Stopped,
}

/// Repeats a [`Task`](crate::Task) every `interval` until stopped.
pub struct PeriodicScheduler {
    task: TaskRef,
    interval: Duration,
    run_immediately: bool,
    bus: Bus,
    state: watch::Sender<SchedulerState>,
    completed: watch::Sender<u32>,
}

impl PeriodicScheduler {
    /// Creates a scheduler around an arbitrary task.
    pub fn new(task: TaskRef, interval: Duration, run_immediately: bool, bus: Bus) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        let (completed, _) = watch::channel(0);
        Self {
            task,
            interval,
            run_immediately,
            bus,
            state,
            completed,
        }
    }

    /// Name of the scheduled task.
    pub fn name(&self) -> &str {
        self.task.name()
    }

    /// Watches the scheduler state.
    pub fn state(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Watches the number of completed invocations (successful or not).
    pub fn completed_runs(&self) -> watch::Receiver<u32> {
        self.completed.subscribe()
    }

    /// Runs the loop until `stop` is cancelled.
    ///
    /// Returns [`WorkerOutcome::Failed`] when the most recent invocation
    /// failed, [`WorkerOutcome::Stopped`] otherwise.
    pub async fn run(&self, stop: CancellationToken) -> WorkerOutcome {
        let mut attempt: u32 = 0;
        let mut last: Option<RunResult> = None;
        let mut run_next = self.run_immediately;

        loop {
            if stop.is_cancelled() {
                break;
            }

            if run_next {
                self.state.send_replace(SchedulerState::RunningTask);
                attempt = attempt.saturating_add(1);
                let res = run_once(self.task.as_ref(), attempt, &self.bus).await;
                self.completed.send_modify(|n| *n = n.saturating_add(1));
                last = Some(res);

                if stop.is_cancelled() {
                    break;
                }
            }
            run_next = true;

            self.state.send_replace(SchedulerState::Sleeping);
            self.bus.publish(
                Event::new(EventKind::SleepScheduled)
                    .with_worker(self.name())
                    .with_delay(self.interval),
            );

            let sleep = time::sleep(self.interval);
            tokio::pin!(sleep);
            select! {
                _ = &mut sleep => {}
                _ = stop.cancelled() => { break; }
            }
        }

        self.state.send_replace(SchedulerState::Stopped);
        self.bus
            .publish(Event::new(EventKind::SchedulerStopped).with_worker(self.name()));

        match last {
            Some(res) if !res.success => WorkerOutcome::Failed {
                reason: format!(
                    "last run failed: {}",
                    res.error_message().unwrap_or_else(|| "unknown failure".into())
                ),
            },
            _ => WorkerOutcome::Stopped,
        }
    }
}
