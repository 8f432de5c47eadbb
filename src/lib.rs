//! # tradevisor
//!
//! **Tradevisor** keeps a small trading stack alive as one unit: a periodic
//! news-cache refresher, a long-running trading bot, and its dashboard. It
//! launches them in order, watches them, and brings all of them down together
//! on a signal or when one of the long-running processes dies.
//!
//! ## Architecture
//! ```text
//!     ┌──────────────────┐   ┌──────────────────┐   ┌──────────────────┐
//!     │ WorkerSpec       │   │ WorkerSpec       │   │ WorkerSpec       │
//!     │ news-cache       │   │ trading-bot      │   │ dashboard        │
//!     │ (periodic)       │   │ (process)        │   │ (process)        │
//!     └────────┬─────────┘   └────────┬─────────┘   └────────┬─────────┘
//!              ▼  settle delay        ▼  settle delay        ▼
//! ┌───────────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                           │
//! │  - Registry (handles + lifecycle phase)                               │
//! │  - ShutdownCoordinator (stop all, grace, force-kill)                  │
//! │  - Bus (broadcast events) ─► SubscriberSet ─► LogWriter, ...          │
//! └──────┬────────────────────────────┬───────────────────────────┬───────┘
//!        ▼                            ▼                           ▼
//! ┌──────────────────┐       ┌──────────────────┐        ┌──────────────────┐
//! │ PeriodicScheduler│       │ process worker   │        │ process worker   │
//! │ run ─► sleep ─►  │       │ child in its own │        │ child in its own │
//! │ run ─► ...       │       │ process group    │        │ process group    │
//! └──────────────────┘       └──────────────────┘        └──────────────────┘
//! ```
//!
//! ### Triggers and teardown
//! ```text
//! SIGINT | SIGTERM | process worker exited | launch failed
//!    └─► ShutdownRequested
//!          ├─► StopRequested ─► every worker at once
//!          │     periodic: sleep interrupted, in-flight run finishes
//!          │     process:  SIGTERM to its process group
//!          ├─► wait up to grace ─► stragglers: SIGKILL + abort ─► ForceKilled
//!          └─► ShutdownReport { trigger, outcomes } ─► exit code
//! ```
//!
//! ## Features
//! | Area             | Description                                         | Key types                                  |
//! |------------------|-----------------------------------------------------|--------------------------------------------|
//! | **Supervision**  | Ordered launch, trigger wait, grouped teardown      | [`Supervisor`], [`WorkerSpec`]             |
//! | **Scheduling**   | Fixed-cadence task loop with cancellable sleep      | [`PeriodicScheduler`], [`ScheduleConfig`]  |
//! | **Tasks**        | Commands or closures invoked by the scheduler       | [`Task`], [`TaskFn`], [`CommandSpec`]      |
//! | **Events**       | Lifecycle events fanned out to subscribers          | [`Event`], [`Subscribe`], [`LogWriter`]    |
//! | **Errors**       | Typed errors for runtime, tasks and configuration   | [`RuntimeError`], [`TaskError`]            |
//! | **Configuration**| Grace period, bus capacity, CLI/env settings        | [`Config`], [`Cli`]                        |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tradevisor::{CommandSpec, Config, ShutdownSignal, Supervisor, WorkerSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = Config::default();
//!     cfg.grace = Duration::from_secs(2);
//!     let sup = Supervisor::new(cfg, Vec::new());
//!
//!     let workers = vec![WorkerSpec::process(
//!         "sleeper",
//!         CommandSpec::new("sleep").arg("30"),
//!     )];
//!
//!     let report = sup
//!         .run_until(workers, async {
//!             tokio::time::sleep(Duration::from_millis(200)).await;
//!             ShutdownSignal::Interrupt
//!         })
//!         .await?;
//!     sup.shutdown().await;
//!
//!     assert_eq!(report.exit_code(), 0);
//!     Ok(())
//! }
//! ```

mod cli;
mod config;
mod core;
mod error;
mod events;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use cli::{BOT_WORKER, Cli, DASHBOARD_WORKER, NEWS_WORKER};
pub use config::Config;
pub use crate::core::{
    KILL_WAIT, PeriodicScheduler, Phase, Registry, ScheduleConfig, SchedulerState,
    ShutdownCoordinator, ShutdownReport, ShutdownSignal, ShutdownSignals, ShutdownTrigger,
    Supervisor, WorkerHandle, WorkerKind, WorkerOutcome, WorkerSpec,
};
pub use error::{ConfigError, RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use tasks::{CommandSpec, CommandTask, RunResult, Task, TaskFn, TaskRef};
