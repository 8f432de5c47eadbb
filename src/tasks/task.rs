//! # Task abstraction.
//!
//! A [`Task`] is one unit of work a periodic scheduler invokes. It runs to
//! completion and always yields a [`RunResult`]; failures are values, not
//! errors, so the caller decides whether to carry on.
//!
//! Tasks are not handed a cancellation token: an invocation already underway
//! is allowed to finish when its scheduler is asked to stop.

use std::sync::Arc;

use async_trait::async_trait;

use crate::tasks::RunResult;

/// Shared handle to a task.
pub type TaskRef = Arc<dyn Task>;

/// # Run-to-completion unit of work.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tradevisor::{RunResult, Task};
///
/// struct Noop;
///
/// #[async_trait]
/// impl Task for Noop {
///     fn name(&self) -> &str { "noop" }
///
///     async fn run(&self) -> RunResult {
///         RunResult::succeeded()
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync + 'static {
    /// Stable, human-readable name.
    fn name(&self) -> &str;

    /// Executes one invocation to completion.
    async fn run(&self) -> RunResult;
}
