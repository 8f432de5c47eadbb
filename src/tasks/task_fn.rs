//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn() -> Fut`, producing a fresh future per
//! invocation. Shared state between invocations goes in an explicit `Arc`.
//!
//! ## Example
//! ```rust
//! use tradevisor::{RunResult, TaskFn, TaskRef};
//!
//! let t: TaskRef = TaskFn::arc("refresh", || async { RunResult::succeeded() });
//! assert_eq!(t.name(), "refresh");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::tasks::{RunResult, Task};

/// Function-backed task implementation.
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> Task for TaskFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RunResult> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> RunResult {
        (self.f)().await
    }
}
