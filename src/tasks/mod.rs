//! # Task abstractions.
//!
//! - [`Task`] - run-to-completion unit invoked by a periodic scheduler
//! - [`TaskFn`] - closure-backed task
//! - [`TaskRef`] - shared handle (`Arc<dyn Task>`)
//! - [`CommandSpec`] / [`CommandTask`] - external commands as tasks
//! - [`RunResult`] - outcome of one invocation

mod command;
mod result;
mod task;
mod task_fn;

pub use command::{CommandSpec, CommandTask};
pub use result::RunResult;
pub use task::{Task, TaskRef};
pub use task_fn::TaskFn;
