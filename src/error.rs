//! Error types used by the supervisor runtime, its tasks, and its configuration.
//!
//! - [`RuntimeError`]: errors raised by the supervisor itself (launch, registry phase).
//! - [`TaskError`]: why a single child command did not succeed.
//! - [`ConfigError`]: invalid settings detected before anything is launched.
//!
//! Runtime and task errors provide `as_label` for logs.

use thiserror::Error;

/// # Errors produced by the supervisor runtime.
///
/// A launch failure is fatal to the whole group: the supervisor tears down
/// every worker it already started before returning it.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A worker could not be started at all (missing executable, spawn error).
    #[error("worker {worker:?} failed to launch: {reason}")]
    Launch {
        /// Name of the worker that failed.
        worker: String,
        /// Underlying reason.
        reason: String,
    },

    /// A worker was offered to the registry after shutdown began.
    #[error("worker {worker:?} rejected: shutdown already initiated")]
    ShutdownInProgress {
        /// Name of the rejected worker.
        worker: String,
    },

    /// Two workers share a name.
    #[error("worker {worker:?} is already registered")]
    DuplicateWorker {
        /// Name that was registered twice.
        worker: String,
    },

    /// Signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use tradevisor::RuntimeError;
    ///
    /// let err = RuntimeError::Launch { worker: "bot".into(), reason: "not found".into() };
    /// assert_eq!(err.as_label(), "runtime_launch_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Launch { .. } => "runtime_launch_failed",
            RuntimeError::ShutdownInProgress { .. } => "runtime_shutdown_in_progress",
            RuntimeError::DuplicateWorker { .. } => "runtime_duplicate_worker",
            RuntimeError::Signal(_) => "runtime_signal_setup",
        }
    }
}

/// # Errors produced by one child command.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// The command could not be started.
    #[error("failed to launch {program:?}: {reason}")]
    Launch {
        /// Program that failed to start.
        program: String,
        /// Underlying OS error message.
        reason: String,
    },

    /// The command exited with a non-zero status.
    #[error("exited with status {code}")]
    Exit {
        /// Exit code reported by the OS.
        code: i32,
    },

    /// The command was terminated by a signal.
    #[error("terminated by signal {signal}")]
    Signaled {
        /// Signal number.
        signal: i32,
    },

    /// Waiting on the child failed.
    #[error("failed to wait for child: {reason}")]
    Wait {
        /// Underlying OS error message.
        reason: String,
    },
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Launch { .. } => "task_launch_failed",
            TaskError::Exit { .. } => "task_exit_nonzero",
            TaskError::Signaled { .. } => "task_signaled",
            TaskError::Wait { .. } => "task_wait_failed",
        }
    }

    /// Exit code carried by the error, if any.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            TaskError::Exit { code } => Some(*code),
            _ => None,
        }
    }

    /// True when the command never started.
    pub fn is_launch(&self) -> bool {
        matches!(self, TaskError::Launch { .. })
    }
}

/// # Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The refresh interval must be strictly positive.
    #[error("refresh interval must be greater than zero")]
    InvalidInterval,

    /// A command setting was empty or whitespace.
    #[error("{var} must name a command to run")]
    EmptyCommand {
        /// Setting that was empty.
        var: &'static str,
    },
}
