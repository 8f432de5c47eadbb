//! # External commands.
//!
//! [`CommandSpec`] describes a child process: program, arguments, extra
//! environment. [`CommandTask`] turns one into a [`Task`] executed by the
//! task runner.
//!
//! Every child is started with:
//! - stdin closed, stdout/stderr inherited (the operator sees worker output as-is);
//! - `kill_on_drop`, so dropping the owning future never leaves an orphan;
//! - on Unix, its own process group, so stop/kill reach its descendants too.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::core::runner::run_command;
use crate::error::TaskError;
use crate::tasks::{RunResult, Task};

/// Program, arguments and extra environment for a child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Creates a spec for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Splits a command line on whitespace into program and arguments.
    ///
    /// Returns `None` for an empty or blank line. No shell quoting is applied.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            env: Vec::new(),
        })
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable for the child.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments passed to the program.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Extra environment for the child.
    pub fn envs(&self) -> &[(String, String)] {
        &self.env
    }

    /// Command line for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Resolves the program against `PATH` (or checks it directly when it is a path).
    pub fn resolve(&self) -> Result<PathBuf, TaskError> {
        which::which(&self.program).map_err(|e| TaskError::Launch {
            program: self.program.clone(),
            reason: e.to_string(),
        })
    }

    /// Builds the tokio command.
    pub(crate) fn to_command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::inherit());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

/// A [`Task`] that runs a [`CommandSpec`] to completion.
pub struct CommandTask {
    name: String,
    spec: CommandSpec,
    pid: watch::Sender<Option<u32>>,
}

impl CommandTask {
    /// Creates a command task.
    pub fn new(name: impl Into<String>, spec: CommandSpec) -> Self {
        let (pid, _) = watch::channel(None);
        Self {
            name: name.into(),
            spec,
            pid,
        }
    }

    /// The command this task runs.
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Watches the pid of the in-flight child; `None` between runs.
    pub fn child_pid(&self) -> watch::Receiver<Option<u32>> {
        self.pid.subscribe()
    }
}

#[async_trait]
impl Task for CommandTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self) -> RunResult {
        run_command(&self.spec, &self.pid).await
    }
}
