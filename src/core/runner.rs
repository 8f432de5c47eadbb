//! # Task runner: execute one invocation and report it.
//!
//! - [`run_command`] starts a child, waits for it, and maps its exit status to a
//!   [`RunResult`]. Launch errors and non-zero exits both become
//!   `RunResult { success: false, .. }`; neither is fatal to the caller. The
//!   child's pid is visible through a `watch` channel while it runs, so a
//!   forced shutdown can kill its whole process group.
//! - [`run_once`] invokes any [`Task`] and publishes its lifecycle events.
//!
//! ## Event flow
//! ```text
//! run_once(task, attempt)
//!   ├─► publish TaskStarting{ attempt }
//!   ├─► task.run() ──► RunResult
//!   └─► success ─► publish TaskSucceeded
//!       failure ─► publish TaskFailed{ reason, exit_code }
//! ```
//!
//! ## Rules
//! - Always publishes **exactly one** terminal event per invocation.
//! - Child output is inherited, never captured or parsed.
//! - Dropping the future kills the child (`kill_on_drop`).

use std::process::ExitStatus;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::{
    error::TaskError,
    events::{Bus, Event, EventKind},
    tasks::{CommandSpec, RunResult, Task},
};

/// Runs `spec` to completion and reports the outcome.
///
/// `pid` holds the child's pid from spawn until it has been reaped. If the
/// future is dropped mid-run the pid stays set.
pub async fn run_command(spec: &CommandSpec, pid: &watch::Sender<Option<u32>>) -> RunResult {
    let started = Instant::now();

    let outcome = match spec.to_command().spawn() {
        Ok(mut child) => {
            pid.send_replace(child.id());
            let status = child.wait().await;
            pid.send_replace(None);
            check_wait(status)
        }
        Err(e) => Err(TaskError::Launch {
            program: spec.program().to_string(),
            reason: e.to_string(),
        }),
    };

    RunResult::from_outcome(outcome).with_elapsed(started.elapsed())
}

/// Executes a single invocation of `task`, publishing lifecycle events to `bus`.
pub async fn run_once<T: Task + ?Sized>(task: &T, attempt: u32, bus: &Bus) -> RunResult {
    bus.publish(
        Event::new(EventKind::TaskStarting)
            .with_worker(task.name())
            .with_attempt(attempt),
    );

    let res = task.run().await;

    if res.success {
        publish_succeeded(bus, task.name(), attempt, &res);
    } else {
        publish_failed(bus, task.name(), attempt, &res);
    }
    res
}

/// Like [`check_status`], for the result of waiting on a child.
pub(crate) fn check_wait(status: std::io::Result<ExitStatus>) -> Result<(), TaskError> {
    match status {
        Ok(status) => check_status(status),
        Err(e) => Err(TaskError::Wait {
            reason: e.to_string(),
        }),
    }
}

/// Maps an exit status to `Ok` for status 0 and a [`TaskError`] otherwise.
fn check_status(status: ExitStatus) -> Result<(), TaskError> {
    if status.success() {
        return Ok(());
    }
    if let Some(code) = status.code() {
        return Err(TaskError::Exit { code });
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(TaskError::Signaled { signal });
        }
    }
    Err(TaskError::Wait {
        reason: format!("unrecognized exit status {status}"),
    })
}

fn publish_succeeded(bus: &Bus, name: &str, attempt: u32, res: &RunResult) {
    let mut ev = Event::new(EventKind::TaskSucceeded)
        .with_worker(name)
        .with_attempt(attempt);
    if let Some(code) = res.exit_code {
        ev = ev.with_exit_code(code);
    }
    bus.publish(ev);
}

fn publish_failed(bus: &Bus, name: &str, attempt: u32, res: &RunResult) {
    let mut ev = Event::new(EventKind::TaskFailed)
        .with_worker(name)
        .with_attempt(attempt)
        .with_reason(res.error_message().unwrap_or_else(|| "unknown failure".into()));
    if let Some(code) = res.exit_code {
        ev = ev.with_exit_code(code);
    }
    bus.publish(ev);
}
