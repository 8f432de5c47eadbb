//! # Long-running process workers.
//!
//! ```text
//! spawn(cmd) ──► Child ──► supervise(child, stop)
//!                              ├─ child exits first ─► publish WorkerExited
//!                              │                       exits.send(name)   (shutdown trigger)
//!                              │                       └─► Failed
//!                              └─ stop cancelled ────► SIGTERM to process group
//!                                                      wait ─► Stopped | Failed
//!
//! teardown, once the worker task ended:
//!   sweep_group(pid, deadline) ─► SIGTERM to what is left of the group
//!                                 └─ still alive at deadline ─► SIGKILL
//! ```
//!
//! ## Rules
//! - The child runs in its own process group; signals go to the whole group.
//! - The group leader exiting does not end the group. Descendants it left
//!   behind are swept at teardown.
//! - After a stop request, exit status 0, 143 or death by SIGTERM count as a
//!   clean stop. Anything else is a failure.
//! - An exit nobody asked for is always reported, whatever its status.

use tokio::process::Child;
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{runner::check_wait, worker::WorkerOutcome},
    error::TaskError,
    events::{Bus, Event, EventKind},
    tasks::CommandSpec,
};

/// Exit code shells report for a child terminated by SIGTERM.
const SIGTERM_EXIT_CODE: i32 = 128 + 15;

/// How often a sweep checks whether the group is gone.
#[cfg(unix)]
const SWEEP_POLL: std::time::Duration = std::time::Duration::from_millis(25);

/// Starts the child described by `spec`.
pub(crate) fn spawn(spec: &CommandSpec) -> Result<Child, TaskError> {
    spec.to_command().spawn().map_err(|e| TaskError::Launch {
        program: spec.program().to_string(),
        reason: e.to_string(),
    })
}

/// Watches `child` until it exits or `stop` is cancelled.
pub(crate) async fn supervise(
    name: String,
    mut child: Child,
    stop: CancellationToken,
    exits: mpsc::UnboundedSender<String>,
    bus: Bus,
) -> WorkerOutcome {
    select! {
        biased;

        _ = stop.cancelled() => {}
        status = child.wait() => {
            let outcome = check_wait(status);
            let mut ev = Event::new(EventKind::WorkerExited).with_worker(name.as_str());
            let reason = match &outcome {
                Ok(()) => "exited with status 0".to_string(),
                Err(e) => {
                    if let Some(code) = e.exit_code() {
                        ev = ev.with_exit_code(code);
                    }
                    e.to_string()
                }
            };
            bus.publish(ev.with_reason(reason.as_str()));
            let _ = exits.send(name);
            return WorkerOutcome::Failed {
                reason: format!("exited unexpectedly: {reason}"),
            };
        }
    }

    request_terminate(&name, &mut child);

    let status = check_wait(child.wait().await);
    let outcome = classify_after_stop(&status);
    let mut ev = Event::new(EventKind::WorkerStopped).with_worker(name.as_str());
    if let Some(code) = status.as_ref().err().and_then(TaskError::exit_code) {
        ev = ev.with_exit_code(code);
    }
    // A reason marks the stop as failed for subscribers.
    if let WorkerOutcome::Failed { reason } = &outcome {
        ev = ev.with_reason(reason.as_str());
    }
    bus.publish(ev);
    outcome
}

/// Outcome of a child that exited after it was asked to stop.
fn classify_after_stop(status: &Result<(), TaskError>) -> WorkerOutcome {
    match status {
        Ok(()) => WorkerOutcome::Stopped,
        Err(TaskError::Exit { code }) if *code == SIGTERM_EXIT_CODE => WorkerOutcome::Stopped,
        #[cfg(unix)]
        Err(TaskError::Signaled { signal }) if *signal == libc::SIGTERM => WorkerOutcome::Stopped,
        Err(e) => WorkerOutcome::Failed {
            reason: format!("exited badly after stop: {e}"),
        },
    }
}

#[cfg(unix)]
fn request_terminate(name: &str, child: &mut Child) {
    // No pid means the child was already reaped.
    if let Some(pid) = child.id() {
        if let Err(e) = signal_group(pid, libc::SIGTERM) {
            tracing::warn!(worker = %name, pid, error = %e, "failed to signal process group");
        }
    }
}

#[cfg(not(unix))]
fn request_terminate(name: &str, child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(worker = %name, error = %e, "failed to stop child");
    }
}

/// Sends SIGKILL to the process group led by `pid`.
#[cfg(unix)]
pub(crate) fn kill_group(pid: u32) -> std::io::Result<()> {
    signal_group(pid, libc::SIGKILL)
}

/// Without process groups the child is killed when its task is aborted and
/// the `Child` dropped.
#[cfg(not(unix))]
pub(crate) fn kill_group(_pid: u32) -> std::io::Result<()> {
    Ok(())
}

/// Terminates whatever is left of the process group led by `pid`.
///
/// Sends SIGTERM, then SIGKILL if members remain at `deadline`. Returns
/// `true` when SIGKILL was needed.
#[cfg(unix)]
pub(crate) async fn sweep_group(pid: u32, deadline: Instant) -> std::io::Result<bool> {
    if !group_alive(pid)? {
        return Ok(false);
    }
    signal_group(pid, libc::SIGTERM)?;

    while group_alive(pid)? {
        if Instant::now() >= deadline {
            kill_group(pid)?;
            return Ok(true);
        }
        tokio::time::sleep(SWEEP_POLL).await;
    }
    Ok(false)
}

#[cfg(not(unix))]
pub(crate) async fn sweep_group(_pid: u32, _deadline: Instant) -> std::io::Result<bool> {
    Ok(false)
}

/// True while any process is left in the group led by `pid`.
#[cfg(unix)]
fn group_alive(pid: u32) -> std::io::Result<bool> {
    let pgid = to_pgid(pid)?;
    // SAFETY: signal 0 only checks for existence and permission.
    if unsafe { libc::kill(-pgid, 0) } == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => Ok(false),
        // Members exist but belong to someone else.
        Some(libc::EPERM) => Ok(true),
        _ => Err(err),
    }
}

#[cfg(unix)]
fn to_pgid(pid: u32) -> std::io::Result<libc::pid_t> {
    libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))
}

/// Sends `sig` to the process group led by `pid`. A group that no longer
/// exists is not an error.
#[cfg(unix)]
fn signal_group(pid: u32, sig: libc::c_int) -> std::io::Result<()> {
    let pgid = to_pgid(pid)?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(-pgid, sig) };
    if rc == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

/// Alive and not a zombie waiting for its new parent to reap it.
#[cfg(all(test, unix))]
pub(crate) fn running(pid: libc::pid_t) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| !rest.trim_start().starts_with('Z')),
        Err(_) if std::path::Path::new("/proc/self").exists() => false,
        // SAFETY: signal 0 only checks for existence.
        Err(_) => (unsafe { libc::kill(pid, 0) }) == 0,
    }
}
