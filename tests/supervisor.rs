#![cfg(unix)]

mod common;

use std::future;
use std::time::Duration;

use tokio::time::{Instant, timeout};
use tradevisor::{
    EventKind, RuntimeError, ShutdownSignal, ShutdownTrigger, WorkerOutcome, WorkerSpec,
};

use common::{after, gone, long_running, news, pid_file, read_pid, sh, supervisor};

const SETTLE: Duration = Duration::from_millis(200);

#[tokio::test]
async fn interrupt_stops_all_three_workers_cleanly() {
    let (sup, rec) = supervisor(Duration::from_secs(5));
    let workers = vec![
        news("exit 0", SETTLE),
        long_running("trading-bot").with_settle_delay(SETTLE),
        long_running("dashboard"),
    ];

    let report = sup
        .run_until(workers, after(Duration::from_secs(1)))
        .await
        .expect("startup succeeds");
    sup.shutdown().await;

    assert_eq!(report.trigger, ShutdownTrigger::Signal(ShutdownSignal::Interrupt));
    assert_eq!(report.exit_code(), 0);
    assert!(!report.grace_exceeded);
    for name in ["news-cache", "trading-bot", "dashboard"] {
        assert_eq!(report.outcome(name), Some(&WorkerOutcome::Stopped), "{name}");
    }
    assert_eq!(rec.launched(), ["news-cache", "trading-bot", "dashboard"]);

    let startup = rec
        .events()
        .iter()
        .position(|e| e.kind == EventKind::StartupComplete)
        .expect("startup completed");
    let shutdown = rec
        .events()
        .iter()
        .position(|e| e.kind == EventKind::ShutdownRequested)
        .expect("shutdown requested");
    assert!(startup < shutdown);
}

#[tokio::test]
async fn failed_first_news_run_still_launches_bot_and_dashboard() {
    let (sup, rec) = supervisor(Duration::from_secs(5));
    let workers = vec![
        news("exit 3", SETTLE),
        long_running("trading-bot").with_settle_delay(SETTLE),
        long_running("dashboard"),
    ];

    let report = sup
        .run_until(workers, after(Duration::from_secs(1)))
        .await
        .expect("startup succeeds");
    sup.shutdown().await;

    assert_eq!(rec.launched(), ["news-cache", "trading-bot", "dashboard"]);
    assert!(rec.kinds_for("news-cache").contains(&EventKind::TaskFailed));
    assert_eq!(report.outcome("trading-bot"), Some(&WorkerOutcome::Stopped));
    assert_eq!(report.outcome("dashboard"), Some(&WorkerOutcome::Stopped));
    assert!(report.outcome("news-cache").is_some_and(WorkerOutcome::is_failure));
}

#[tokio::test]
async fn unexpected_bot_exit_brings_the_group_down() {
    let (sup, rec) = supervisor(Duration::from_secs(5));
    let workers = vec![
        news("exit 0", Duration::ZERO),
        WorkerSpec::process("trading-bot", sh("sleep 0.5; exit 2")),
        long_running("dashboard"),
    ];

    let report = timeout(
        Duration::from_secs(10),
        sup.run_until(workers, future::pending::<ShutdownSignal>()),
    )
    .await
    .expect("teardown in bounded time")
    .expect("startup succeeds");
    sup.shutdown().await;

    assert_eq!(
        report.trigger,
        ShutdownTrigger::WorkerExited {
            worker: "trading-bot".into()
        }
    );
    assert_eq!(report.exit_code(), 1);
    assert!(report.outcome("trading-bot").is_some_and(WorkerOutcome::is_failure));
    assert_eq!(report.outcome("dashboard"), Some(&WorkerOutcome::Stopped));
    assert_eq!(report.outcome("news-cache"), Some(&WorkerOutcome::Stopped));

    let exited = rec
        .position(EventKind::WorkerExited, "trading-bot")
        .expect("exit reported");
    let stop = rec
        .position(EventKind::StopRequested, "dashboard")
        .expect("dashboard told to stop");
    assert!(exited < stop);
}

#[tokio::test]
async fn worker_ignoring_stop_is_killed_after_grace() {
    let grace = Duration::from_millis(500);
    let (sup, rec) = supervisor(grace);
    let workers = vec![
        WorkerSpec::process("trading-bot", sh("trap '' TERM; while :; do sleep 1; done")),
        long_running("dashboard"),
    ];

    let started = Instant::now();
    let report = sup
        .run_until(workers, after(Duration::from_millis(300)))
        .await
        .expect("startup succeeds");
    let elapsed = started.elapsed();
    sup.shutdown().await;

    assert!(report.grace_exceeded);
    assert_eq!(report.outcome("trading-bot"), Some(&WorkerOutcome::ForceKilled));
    assert_eq!(report.outcome("dashboard"), Some(&WorkerOutcome::Stopped));
    assert_eq!(report.exit_code(), 0);
    assert!(elapsed < Duration::from_secs(5), "teardown took {elapsed:?}");

    assert!(rec.kinds_for("trading-bot").contains(&EventKind::ForceKilled));
    assert!(rec.events().iter().any(|e| e.kind == EventKind::GraceExceeded));
}

#[tokio::test]
async fn missing_executable_aborts_startup_and_stops_earlier_workers() {
    let (sup, rec) = supervisor(Duration::from_secs(5));
    let workers = vec![
        news("exit 0", Duration::ZERO),
        WorkerSpec::process(
            "trading-bot",
            tradevisor::CommandSpec::new("tradevisor-missing-binary-xyz"),
        ),
        long_running("dashboard"),
    ];

    let err = sup
        .run_until(workers, future::pending::<ShutdownSignal>())
        .await
        .unwrap_err();
    sup.shutdown().await;

    match err {
        RuntimeError::Launch { worker, .. } => assert_eq!(worker, "trading-bot"),
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(rec.launched(), ["news-cache"]);
    assert!(rec.kinds_for("trading-bot").contains(&EventKind::WorkerLaunchFailed));
    assert!(rec.kinds_for("news-cache").contains(&EventKind::StopRequested));
    assert!(rec.kinds_for("dashboard").is_empty());
}

#[tokio::test]
async fn missing_periodic_executable_is_a_launch_failure() {
    let (sup, rec) = supervisor(Duration::from_secs(5));
    let workers = vec![
        WorkerSpec::periodic(
            "news-cache",
            tradevisor::ScheduleConfig {
                interval: Duration::from_secs(60),
                run_immediately: true,
                command: tradevisor::CommandSpec::new("tradevisor-missing-binary-xyz"),
            },
        ),
        long_running("trading-bot"),
    ];

    let res = sup
        .run_until(workers, future::pending::<ShutdownSignal>())
        .await;
    sup.shutdown().await;

    assert!(matches!(res, Err(RuntimeError::Launch { .. })));
    assert!(rec.launched().is_empty());
}

#[tokio::test]
async fn signal_during_settle_delay_skips_remaining_launches() {
    let (sup, rec) = supervisor(Duration::from_secs(5));
    let workers = vec![
        news("exit 0", Duration::from_secs(30)),
        long_running("trading-bot"),
    ];

    let started = Instant::now();
    let report = sup
        .run_until(workers, after(Duration::from_millis(300)))
        .await
        .expect("no launch failure");
    sup.shutdown().await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(rec.launched(), ["news-cache"]);
    assert_eq!(report.outcomes.len(), 1);
    assert!(!rec.events().iter().any(|e| e.kind == EventKind::StartupComplete));
}

#[tokio::test]
async fn bot_waits_for_first_news_run_when_configured() {
    let (sup, rec) = supervisor(Duration::from_secs(5));
    let workers = vec![
        news("sleep 0.5", Duration::ZERO).with_wait_first_run(true),
        long_running("trading-bot"),
    ];

    let report = sup
        .run_until(workers, after(Duration::from_secs(2)))
        .await
        .expect("startup succeeds");
    sup.shutdown().await;

    assert_eq!(report.exit_code(), 0);
    let news_done = rec
        .position(EventKind::TaskSucceeded, "news-cache")
        .expect("first run finished");
    let bot_launch = rec
        .position(EventKind::WorkerLaunched, "trading-bot")
        .expect("bot launched");
    assert!(news_done < bot_launch);
}

#[tokio::test]
async fn descendants_of_an_exited_bot_do_not_outlive_teardown() {
    let (sup, _rec) = supervisor(Duration::from_secs(5));
    let marker = pid_file("bot-helper");
    let script = format!("sleep 30 & echo $! > {}; sleep 0.3; exit 2", marker.display());
    let workers = vec![
        WorkerSpec::process("trading-bot", sh(&script)),
        long_running("dashboard"),
    ];

    let (report, helper) = tokio::join!(
        timeout(
            Duration::from_secs(10),
            sup.run_until(workers, future::pending::<ShutdownSignal>()),
        ),
        read_pid(&marker),
    );
    let report = report
        .expect("teardown in bounded time")
        .expect("startup succeeds");
    sup.shutdown().await;

    assert_eq!(
        report.trigger,
        ShutdownTrigger::WorkerExited {
            worker: "trading-bot".into()
        }
    );
    assert!(report.outcome("trading-bot").is_some_and(WorkerOutcome::is_failure));
    assert!(gone(helper).await, "background sleep {helper} survived the supervisor");
}

#[tokio::test]
async fn killed_news_run_takes_its_descendants_with_it() {
    let (sup, rec) = supervisor(Duration::from_millis(500));
    let marker = pid_file("news-run");
    let script = format!("sleep 30 & echo $! > {}; wait", marker.display());
    let workers = vec![news(&script, Duration::ZERO), long_running("dashboard")];

    let (report, grandchild) = tokio::join!(
        sup.run_until(workers, after(Duration::from_millis(300))),
        read_pid(&marker),
    );
    let report = report.expect("startup succeeds");
    sup.shutdown().await;

    assert_eq!(report.outcome("news-cache"), Some(&WorkerOutcome::ForceKilled));
    assert_eq!(report.outcome("dashboard"), Some(&WorkerOutcome::Stopped));
    assert!(rec.kinds_for("news-cache").contains(&EventKind::ForceKilled));
    assert!(gone(grandchild).await, "sleep {grandchild} outlived the killed run");
}

#[tokio::test]
async fn clean_stop_leaves_no_group_members_behind() {
    let (sup, _rec) = supervisor(Duration::from_secs(5));
    let marker = pid_file("dashboard-helper");
    let script = format!(
        "sleep 30 & echo $! > {}; trap 'exit 0' TERM; while :; do sleep 0.1; done",
        marker.display()
    );
    let workers = vec![WorkerSpec::process("dashboard", sh(&script))];

    let (report, helper) = tokio::join!(
        sup.run_until(workers, after(Duration::from_millis(500))),
        read_pid(&marker),
    );
    let report = report.expect("startup succeeds");
    sup.shutdown().await;

    assert_eq!(report.outcome("dashboard"), Some(&WorkerOutcome::Stopped));
    assert!(gone(helper).await, "helper {helper} survived a clean stop");
}
