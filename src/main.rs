use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tradevisor::{Cli, LogWriter, Supervisor};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // A missing .env file is fine; the environment and flags still apply.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let workers = cli.workers().context("invalid configuration")?;
    let sup = Supervisor::new(cli.config(), vec![Arc::new(LogWriter::new())]);

    let result = sup.run(workers).await;
    sup.shutdown().await;

    match result {
        Ok(report) => {
            let code = report.exit_code();
            if code == 0 {
                info!(%report, "all workers stopped");
            } else {
                error!(%report, "stopped with failures");
            }
            Ok(ExitCode::from(code))
        }
        Err(e) => {
            error!(error = %e, label = e.as_label(), "startup aborted");
            Ok(ExitCode::FAILURE)
        }
    }
}
