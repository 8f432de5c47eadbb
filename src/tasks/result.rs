//! # Outcome of one task invocation.

use std::time::{Duration, SystemTime};

use crate::error::TaskError;

/// Result of a single task invocation. Logged and published, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// True when the command exited with status 0.
    pub success: bool,
    /// Wall-clock time the invocation finished.
    pub at: SystemTime,
    /// How long the invocation took.
    pub elapsed: Duration,
    /// Exit code, when the child exited normally.
    pub exit_code: Option<i32>,
    /// Failure detail, when `success` is false.
    pub error: Option<TaskError>,
}

impl RunResult {
    /// A successful invocation.
    pub fn succeeded() -> Self {
        Self {
            success: true,
            at: SystemTime::now(),
            elapsed: Duration::ZERO,
            exit_code: Some(0),
            error: None,
        }
    }

    /// A failed invocation.
    pub fn failed(error: TaskError) -> Self {
        Self {
            success: false,
            at: SystemTime::now(),
            elapsed: Duration::ZERO,
            exit_code: error.exit_code(),
            error: Some(error),
        }
    }

    /// Builds a result from the outcome of a child command.
    pub fn from_outcome(outcome: Result<(), TaskError>) -> Self {
        match outcome {
            Ok(()) => Self::succeeded(),
            Err(e) => Self::failed(e),
        }
    }

    /// Records the invocation duration.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }

    /// Failure message for logs, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}
