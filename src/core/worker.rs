//! # Worker definitions and handles.
//!
//! A [`WorkerSpec`] says *what* to run: a periodic scheduler or a single
//! long-running process, plus the settle delay the supervisor waits after
//! launching it. [`WorkerSpec::launch`] turns it into a [`WorkerHandle`]: a
//! spawned tokio task, the token that asks it to stop, and a watch on the pid
//! of its current child so teardown can reach the child's process group.
//!
//! ```text
//! WorkerSpec ──launch()──► WorkerHandle { join, stop, pid }
//!    ├─ Periodic(ScheduleConfig) ──► PeriodicScheduler::run(stop)    pid of the in-flight run
//!    └─ Process(CommandSpec)     ──► process::supervise(child, stop) pid of the child
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    core::{
        process,
        scheduler::{PeriodicScheduler, ScheduleConfig},
    },
    error::RuntimeError,
    events::Bus,
    tasks::{CommandSpec, CommandTask},
};

/// How a worker ended, as reported at shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Stopped cleanly after a stop request.
    Stopped,
    /// Reported a failure: exited on its own, exited badly after the stop
    /// request, or (periodic) its most recent run failed.
    Failed {
        /// Failure detail.
        reason: String,
    },
    /// Ignored the stop request for the whole grace period and was killed.
    ForceKilled,
}

impl WorkerOutcome {
    /// True for [`WorkerOutcome::Failed`].
    pub fn is_failure(&self) -> bool {
        matches!(self, WorkerOutcome::Failed { .. })
    }
}

/// What a worker runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerKind {
    /// Repeats a command at a fixed cadence.
    Periodic(ScheduleConfig),
    /// Launches a command once; it is expected to run until stopped.
    Process(CommandSpec),
}

/// Definition of one supervised worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    name: String,
    kind: WorkerKind,
    settle_delay: Duration,
    wait_first_run: bool,
}

impl WorkerSpec {
    /// A periodic worker.
    pub fn periodic(name: impl Into<String>, cfg: ScheduleConfig) -> Self {
        Self::new(name, WorkerKind::Periodic(cfg))
    }

    /// A single long-running process.
    pub fn process(name: impl Into<String>, command: CommandSpec) -> Self {
        Self::new(name, WorkerKind::Process(command))
    }

    fn new(name: impl Into<String>, kind: WorkerKind) -> Self {
        Self {
            name: name.into(),
            kind,
            settle_delay: Duration::ZERO,
            wait_first_run: false,
        }
    }

    /// Pause after launching this worker, before the next one starts.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// For periodic workers: hold the next launch until the first run completed.
    pub fn with_wait_first_run(mut self, wait: bool) -> Self {
        self.wait_first_run = wait;
        self
    }

    /// Worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Worker kind.
    pub fn kind(&self) -> &WorkerKind {
        &self.kind
    }

    /// Command the worker runs.
    pub fn command(&self) -> &CommandSpec {
        match &self.kind {
            WorkerKind::Periodic(cfg) => &cfg.command,
            WorkerKind::Process(command) => command,
        }
    }

    /// Settle delay after launch.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Whether the next launch waits for this worker's first run.
    pub fn wait_first_run(&self) -> bool {
        self.wait_first_run && matches!(self.kind, WorkerKind::Periodic(_))
    }

    /// Starts the worker as an independent tokio task.
    ///
    /// Fails when the program cannot be found or spawned. A periodic worker
    /// checks its program up front; its individual runs may still fail later
    /// without affecting the launch.
    pub(crate) fn launch(&self, ctx: &LaunchContext) -> Result<WorkerHandle, RuntimeError> {
        let launch_err = |e: crate::error::TaskError| RuntimeError::Launch {
            worker: self.name.clone(),
            reason: e.to_string(),
        };
        let stop = ctx.runtime_token.child_token();

        match &self.kind {
            WorkerKind::Periodic(cfg) => {
                cfg.command.resolve().map_err(launch_err)?;

                let task = CommandTask::new(self.name.clone(), cfg.command.clone());
                let pid = task.child_pid();
                let scheduler = PeriodicScheduler::new(
                    Arc::new(task),
                    cfg.interval,
                    cfg.run_immediately,
                    ctx.bus.clone(),
                );
                let first_run = scheduler.completed_runs();
                let token = stop.clone();
                let join = tokio::spawn(async move { scheduler.run(token).await });

                Ok(WorkerHandle::new(self.name.clone(), join, stop, pid)
                    .with_first_run(first_run))
            }
            WorkerKind::Process(command) => {
                let child = process::spawn(command).map_err(launch_err)?;
                let (_, pid) = watch::channel(child.id());
                let join = tokio::spawn(process::supervise(
                    self.name.clone(),
                    child,
                    stop.clone(),
                    ctx.exits.clone(),
                    ctx.bus.clone(),
                ));

                Ok(WorkerHandle::new(self.name.clone(), join, stop, pid))
            }
        }
    }
}

/// Shared pieces every launch needs.
pub(crate) struct LaunchContext {
    pub bus: Bus,
    pub runtime_token: CancellationToken,
    /// Process workers report an exit nobody asked for here.
    pub exits: mpsc::UnboundedSender<String>,
}

/// A running worker tracked by the registry.
pub struct WorkerHandle {
    name: String,
    join: JoinHandle<WorkerOutcome>,
    stop: CancellationToken,
    pid: watch::Receiver<Option<u32>>,
    first_run: Option<watch::Receiver<u32>>,
}

impl WorkerHandle {
    /// Wraps an already spawned worker task.
    pub(crate) fn new(
        name: impl Into<String>,
        join: JoinHandle<WorkerOutcome>,
        stop: CancellationToken,
        pid: watch::Receiver<Option<u32>>,
    ) -> Self {
        Self {
            name: name.into(),
            join,
            stop,
            pid,
            first_run: None,
        }
    }

    fn with_first_run(mut self, completed: watch::Receiver<u32>) -> Self {
        self.first_run = Some(completed);
        self
    }

    /// Worker name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pid of the worker's current child: the process itself, or the
    /// in-flight run of a periodic worker.
    pub fn pid(&self) -> Option<u32> {
        *self.pid.borrow()
    }

    /// Asks the worker to stop cooperatively.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    /// Join handle of the worker task.
    pub(crate) fn join_mut(&mut self) -> &mut JoinHandle<WorkerOutcome> {
        &mut self.join
    }

    /// Waits until a periodic worker has completed its first run.
    ///
    /// Returns immediately for process workers or if the scheduler is gone.
    pub(crate) async fn first_run_completed(&self) {
        if let Some(rx) = &self.first_run {
            let mut rx = rx.clone();
            let _ = rx.wait_for(|n| *n >= 1).await;
        }
    }

    /// Kills the worker: SIGKILL to the current child's process group, then
    /// aborts the task (dropping the child, which is `kill_on_drop`).
    pub(crate) fn force_terminate(&self) {
        if let Some(pid) = self.pid() {
            if let Err(e) = process::kill_group(pid) {
                tracing::warn!(worker = %self.name, pid, error = %e, "failed to kill process group");
            }
        }
        self.join.abort();
    }

    /// Clears out what the worker's child left in its process group once the
    /// task has ended. Returns `true` when SIGKILL was needed.
    pub(crate) async fn sweep_group(&self, deadline: Instant) -> bool {
        let Some(pid) = self.pid() else {
            return false;
        };
        match process::sweep_group(pid, deadline).await {
            Ok(killed) => killed,
            Err(e) => {
                tracing::warn!(worker = %self.name, pid, error = %e, "failed to sweep process group");
                false
            }
        }
    }
}
