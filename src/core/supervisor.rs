//! # Supervisor: sequential startup, trigger wait, and teardown.
//!
//! The [`Supervisor`] owns the event bus and the subscriber fan-out. A call to
//! [`Supervisor::run`] launches the configured workers one by one, waits for a
//! shutdown trigger, and stops everything within the grace period.
//!
//! ## High-level architecture
//! ```text
//! Supervisor::new(cfg, subscribers)
//!   └─► listener: Bus.subscribe() ─► SubscriberSet::emit(Event)   (fire-and-forget)
//!
//! Supervisor::run(workers)
//!   ├─ install signal handlers (before anything is launched)
//!   ├─ startup (sequential):
//!   │     for spec in workers:
//!   │        spec.launch() ──► Registry.insert(handle)      publish WorkerLaunched
//!   │           └─ Err ─► publish WorkerLaunchFailed ─► teardown ─► Err(RuntimeError::Launch)
//!   │        [wait first run]  settle delay                 (both race the triggers)
//!   ├─ Registry.freeze()                                    publish StartupComplete
//!   ├─ wait for trigger:  signal | process worker exited
//!   └─ ShutdownCoordinator::teardown(&mut registry, trigger) ─► ShutdownReport
//!
//! Supervisor::shutdown()
//!   └─► listener drains the bus ─► SubscriberSet::flush()   (repeat while the
//!                                  drain published more) ─► SubscriberSet::shutdown()
//! ```
//!
//! ## Rules
//! - Launch order is the order of the `workers` vector.
//! - A task-level failure of a periodic worker never aborts startup; a failed
//!   launch always does.
//! - A trigger that arrives during startup skips the remaining launches.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tradevisor::{CommandSpec, Config, LogWriter, ScheduleConfig, Supervisor, WorkerSpec};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sup = Supervisor::new(Config::default(), vec![Arc::new(LogWriter::new())]);
//!
//!     let workers = vec![
//!         WorkerSpec::periodic(
//!             "news-cache",
//!             ScheduleConfig {
//!                 interval: Duration::from_secs(10800),
//!                 run_immediately: true,
//!                 command: CommandSpec::new("python3").args(["-m", "bot.news_cache"]),
//!             },
//!         )
//!         .with_settle_delay(Duration::from_secs(5)),
//!         WorkerSpec::process("trading-bot", CommandSpec::new("python3").args(["-m", "bot.main"])),
//!     ];
//!
//!     let report = sup.run(workers).await;
//!     sup.shutdown().await;
//!     println!("{}", report?);
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Config,
    core::{
        registry::Registry,
        shutdown::{ShutdownCoordinator, ShutdownReport, ShutdownSignal, ShutdownSignals, ShutdownTrigger},
        worker::{LaunchContext, WorkerSpec},
    },
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    subscribers::{Subscribe, SubscriberSet},
};

/// Launches workers in order and tears them down on the first trigger.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    listener: JoinHandle<()>,
    listener_done: CancellationToken,
}

impl Supervisor {
    /// Creates a supervisor delivering events to `subscribers`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(cfg: Config, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        let subs = SubscriberSet::new(subscribers, bus.clone());
        let listener_done = CancellationToken::new();
        let listener = tokio::spawn(forward_events(
            bus.subscribe(),
            subs,
            listener_done.clone(),
        ));

        Self {
            cfg,
            bus,
            listener,
            listener_done,
        }
    }

    /// Event bus shared with all workers.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Runs `workers` until SIGINT/SIGTERM or an unexpected worker exit.
    pub async fn run(&self, workers: Vec<WorkerSpec>) -> Result<ShutdownReport, RuntimeError> {
        let mut signals = ShutdownSignals::install()?;
        self.run_until(workers, async move { signals.recv().await })
            .await
    }

    /// Like [`run`](Self::run) with a caller-provided shutdown signal.
    ///
    /// Returns [`RuntimeError::Launch`] (after stopping every worker already
    /// started) when a worker cannot be launched.
    pub async fn run_until<S>(
        &self,
        workers: Vec<WorkerSpec>,
        signal: S,
    ) -> Result<ShutdownReport, RuntimeError>
    where
        S: Future<Output = ShutdownSignal>,
    {
        tokio::pin!(signal);

        let runtime_token = CancellationToken::new();
        let (exits_tx, mut exits) = mpsc::unbounded_channel();
        let ctx = LaunchContext {
            bus: self.bus.clone(),
            runtime_token: runtime_token.clone(),
            exits: exits_tx,
        };
        let mut registry = Registry::new();

        let mut trigger: Option<ShutdownTrigger> = None;
        let mut launch_error: Option<RuntimeError> = None;

        for (i, spec) in workers.iter().enumerate() {
            if let Ok(worker) = exits.try_recv() {
                trigger = Some(ShutdownTrigger::WorkerExited { worker });
                break;
            }

            if let Err(e) = self.launch_one(spec, &ctx, &mut registry) {
                trigger = Some(ShutdownTrigger::StartupFailed {
                    worker: spec.name().to_string(),
                });
                launch_error = Some(e);
                break;
            }

            if i + 1 == workers.len() {
                break;
            }

            let pause = self.pause_after(spec, &registry);
            select! {
                _ = pause => {}
                t = next_trigger(signal.as_mut(), &mut exits) => {
                    trigger = Some(t);
                    break;
                }
            }
        }

        let trigger = match trigger {
            Some(t) => t,
            None => {
                registry.freeze();
                self.bus.publish(
                    Event::new(EventKind::StartupComplete)
                        .with_reason(format!("{} workers running", registry.len())),
                );
                next_trigger(signal.as_mut(), &mut exits).await
            }
        };

        let report = ShutdownCoordinator::new(self.cfg.grace, self.bus.clone())
            .teardown(&mut registry, trigger)
            .await;
        runtime_token.cancel();

        match launch_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// Flushes pending events to every subscriber and stops the fan-out.
    pub async fn shutdown(self) {
        self.listener_done.cancel();
        let _ = self.listener.await;
    }

    fn launch_one(
        &self,
        spec: &WorkerSpec,
        ctx: &LaunchContext,
        registry: &mut Registry,
    ) -> Result<(), RuntimeError> {
        let launched = registry
            .ensure_admissible(spec.name())
            .and_then(|()| spec.launch(ctx));

        match launched {
            Ok(handle) => {
                let detail = match handle.pid() {
                    Some(pid) => format!("pid {pid}: {}", spec.command().display()),
                    None => spec.command().display(),
                };
                self.bus.publish(
                    Event::new(EventKind::WorkerLaunched)
                        .with_worker(spec.name())
                        .with_reason(detail),
                );
                registry.insert(handle)
            }
            Err(e) => {
                self.bus.publish(
                    Event::new(EventKind::WorkerLaunchFailed)
                        .with_worker(spec.name())
                        .with_reason(e.to_string()),
                );
                Err(e)
            }
        }
    }

    /// Waits out the prerequisite and settle delay that follow `spec`'s launch.
    async fn pause_after(&self, spec: &WorkerSpec, registry: &Registry) {
        if spec.wait_first_run() {
            if let Some(handle) = registry.get(spec.name()) {
                handle.first_run_completed().await;
            }
        }

        let delay = spec.settle_delay();
        if !delay.is_zero() {
            self.bus.publish(
                Event::new(EventKind::SettleDelay)
                    .with_worker(spec.name())
                    .with_delay(delay),
            );
            time::sleep(delay).await;
        }
    }
}

/// Completes on the next shutdown trigger.
async fn next_trigger<S>(
    signal: Pin<&mut S>,
    exits: &mut mpsc::UnboundedReceiver<String>,
) -> ShutdownTrigger
where
    S: Future<Output = ShutdownSignal>,
{
    select! {
        sig = signal => ShutdownTrigger::Signal(sig),
        Some(worker) = exits.recv() => ShutdownTrigger::WorkerExited { worker },
    }
}

/// Forwards bus events to the subscriber set until `done`, then drains.
async fn forward_events(
    mut rx: broadcast::Receiver<Event>,
    subs: SubscriberSet,
    done: CancellationToken,
) {
    loop {
        select! {
            res = rx.recv() => match res {
                Ok(ev) => subs.emit(ev),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "event listener lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = done.cancelled() => break,
        }
    }

    // Handling the backlog may publish panic or overflow reports; keep going
    // until a flush leaves nothing new on the bus.
    loop {
        loop {
            match rx.try_recv() {
                Ok(ev) => subs.emit(ev),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        subs.flush().await;
        if rx.is_empty() {
            break;
        }
    }
    subs.shutdown().await;
}
