#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tradevisor::{
    CommandSpec, Config, Event, EventKind, ScheduleConfig, Subscribe, Supervisor, WorkerSpec,
};

/// Keeps every event it sees.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds_for(&self, worker: &str) -> Vec<EventKind> {
        self.events()
            .into_iter()
            .filter(|e| e.is_for(worker))
            .map(|e| e.kind)
            .collect()
    }

    /// Workers with a `WorkerLaunched` event, in order.
    pub fn launched(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == EventKind::WorkerLaunched)
            .filter_map(|e| e.worker.as_deref().map(str::to_string))
            .collect()
    }

    /// Position of the first event of `kind` for `worker`.
    pub fn position(&self, kind: EventKind, worker: &str) -> Option<usize> {
        self.events()
            .iter()
            .position(|e| e.kind == kind && e.is_for(worker))
    }
}

#[async_trait]
impl Subscribe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.events.lock().unwrap().push(ev.clone());
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

pub fn supervisor(grace: Duration) -> (Supervisor, Recorder) {
    let rec = Recorder::default();
    let cfg = Config {
        grace,
        ..Config::default()
    };
    (Supervisor::new(cfg, vec![Arc::new(rec.clone())]), rec)
}

pub fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c", script])
}

pub fn news(script: &str, settle: Duration) -> WorkerSpec {
    WorkerSpec::periodic(
        "news-cache",
        ScheduleConfig {
            interval: Duration::from_secs(10800),
            run_immediately: true,
            command: sh(script),
        },
    )
    .with_settle_delay(settle)
}

pub fn long_running(name: &str) -> WorkerSpec {
    WorkerSpec::process(name, CommandSpec::new("sleep").arg("30"))
}

pub async fn after(delay: Duration) -> tradevisor::ShutdownSignal {
    tokio::time::sleep(delay).await;
    tradevisor::ShutdownSignal::Interrupt
}

/// Scratch file a test script writes a background pid into.
pub fn pid_file(tag: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("tradevisor-{tag}-{}.pid", std::process::id()));
    let _ = std::fs::remove_file(&path);
    path
}

/// Pid written by a script, once it is there.
pub async fn read_pid(path: &Path) -> libc::pid_t {
    for _ in 0..200 {
        let written = std::fs::read_to_string(path).ok();
        if let Some(pid) = written.and_then(|s| s.trim().parse().ok()) {
            let _ = std::fs::remove_file(path);
            return pid;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("no pid written to {}", path.display());
}

/// Alive and not a zombie waiting to be reaped by its new parent.
pub fn running(pid: libc::pid_t) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| !rest.trim_start().starts_with('Z')),
        Err(_) if Path::new("/proc/self").exists() => false,
        Err(_) => (unsafe { libc::kill(pid, 0) }) == 0,
    }
}

/// Polls for up to a second until `pid` is gone.
pub async fn gone(pid: libc::pid_t) -> bool {
    for _ in 0..40 {
        if !running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}
