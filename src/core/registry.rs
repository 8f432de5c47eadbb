//! # Worker registry.
//!
//! Tracks every launched worker and the supervisor's lifecycle phase. The
//! registry is owned by a single supervisor run and mutated only from it, so
//! it needs no locking.
//!
//! ```text
//! Starting ──freeze()──► Running ──begin_shutdown()──► ShuttingDown ──finish()──► Stopped
//!    │                                                      ▲
//!    └──────────────────── begin_shutdown() ────────────────┘   (trigger during startup)
//! ```
//!
//! ## Rules
//! - Names are unique.
//! - Nothing is admitted once shutdown has begun.
//! - `begin_shutdown` hands out every handle exactly once.

use crate::core::worker::WorkerHandle;
use crate::error::RuntimeError;

/// Supervisor lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Workers are being launched one by one.
    Starting,
    /// All workers launched; waiting for a shutdown trigger.
    Running,
    /// Stop requests sent; waiting on workers.
    ShuttingDown,
    /// Teardown finished.
    Stopped,
}

/// Launched workers plus the current phase.
pub struct Registry {
    phase: Phase,
    workers: Vec<WorkerHandle>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Empty registry in [`Phase::Starting`].
    pub fn new() -> Self {
        Self {
            phase: Phase::Starting,
            workers: Vec::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Checks that a worker named `name` may still be launched.
    pub fn ensure_admissible(&self, name: &str) -> Result<(), RuntimeError> {
        if matches!(self.phase, Phase::ShuttingDown | Phase::Stopped) {
            return Err(RuntimeError::ShutdownInProgress {
                worker: name.to_string(),
            });
        }
        if self.workers.iter().any(|w| w.name() == name) {
            return Err(RuntimeError::DuplicateWorker {
                worker: name.to_string(),
            });
        }
        Ok(())
    }

    /// Records a launched worker.
    pub fn insert(&mut self, handle: WorkerHandle) -> Result<(), RuntimeError> {
        self.ensure_admissible(handle.name())?;
        self.workers.push(handle);
        Ok(())
    }

    /// Looks up a worker by name.
    pub fn get(&self, name: &str) -> Option<&WorkerHandle> {
        self.workers.iter().find(|w| w.name() == name)
    }

    /// Marks startup as complete.
    pub fn freeze(&mut self) {
        if self.phase == Phase::Starting {
            self.phase = Phase::Running;
        }
    }

    /// Enters [`Phase::ShuttingDown`] and hands over all handles in launch order.
    ///
    /// A second call returns nothing.
    pub fn begin_shutdown(&mut self) -> Vec<WorkerHandle> {
        if matches!(self.phase, Phase::Starting | Phase::Running) {
            self.phase = Phase::ShuttingDown;
        }
        std::mem::take(&mut self.workers)
    }

    /// Marks teardown as finished.
    pub fn finish(&mut self) {
        self.phase = Phase::Stopped;
    }

    /// Names of the registered workers, in launch order.
    pub fn names(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.name().to_string()).collect()
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
