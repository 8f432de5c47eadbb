//! Runtime core: scheduling, supervision and shutdown.
//!
//! Internal modules:
//! - [`runner`]: executes one task invocation and publishes its events;
//! - [`scheduler`]: repeats a task at a fixed cadence until stopped;
//! - [`process`]: watches a long-running child and stops it by signal;
//! - [`worker`]: worker definitions, launch, and handles;
//! - [`registry`]: launched workers plus the lifecycle phase;
//! - [`shutdown`]: triggers, signal handling and grace-bounded teardown;
//! - [`supervisor`]: sequential startup and the run loop.

mod process;
mod registry;
pub(crate) mod runner;
mod scheduler;
mod shutdown;
mod supervisor;
mod worker;

pub use registry::{Phase, Registry};
pub use scheduler::{PeriodicScheduler, ScheduleConfig, SchedulerState};
pub use shutdown::{
    KILL_WAIT, ShutdownCoordinator, ShutdownReport, ShutdownSignal, ShutdownSignals,
    ShutdownTrigger,
};
pub use supervisor::Supervisor;
pub use worker::{WorkerHandle, WorkerKind, WorkerOutcome, WorkerSpec};
