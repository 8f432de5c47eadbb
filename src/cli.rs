//! # Command line and environment settings.
//!
//! Every setting can come from a long flag or from the environment (a `.env`
//! file is loaded by `main` before parsing). [`Cli::workers`] turns them into
//! the three worker definitions, in launch order:
//!
//! ```text
//! news-cache  (periodic, NEWS_CACHE_CMD every NEWS_REFRESH_INTERVAL)
//!     │ NEWS_SETTLE_DELAY   (+ first run, with NEWS_WAIT_FIRST_RUN)
//!     ▼
//! trading-bot (process, BOT_CMD)
//!     │ BOT_SETTLE_DELAY
//!     ▼
//! dashboard   (process, DASHBOARD_CMD with {port} = DASHBOARD_PORT)
//! ```

use std::time::Duration;

use clap::{ArgAction, Parser, builder::BoolishValueParser};

use crate::{
    config::Config,
    core::{ScheduleConfig, WorkerSpec},
    error::ConfigError,
    tasks::CommandSpec,
};

/// Name of the periodic news refresher.
pub const NEWS_WORKER: &str = "news-cache";
/// Name of the trading bot process.
pub const BOT_WORKER: &str = "trading-bot";
/// Name of the dashboard process.
pub const DASHBOARD_WORKER: &str = "dashboard";

/// Placeholder replaced by the dashboard port in `DASHBOARD_CMD`.
const PORT_PLACEHOLDER: &str = "{port}";

#[derive(Parser, Debug, Clone)]
#[command(name = "tradevisor")]
#[command(about = "Supervises the news cache refresher, the trading bot and its dashboard")]
#[command(version)]
pub struct Cli {
    /// Seconds between the end of one news refresh and the start of the next
    #[arg(long, env = "NEWS_REFRESH_INTERVAL", default_value_t = 10800)]
    pub news_refresh_interval: u64,

    /// Refresh the news cache once at startup before the first sleep
    #[arg(
        long,
        env = "NEWS_RUN_IMMEDIATELY",
        default_value = "true",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub news_run_immediately: bool,

    /// Command that refreshes the news cache
    #[arg(long, env = "NEWS_CACHE_CMD", default_value = "python3 -m bot.news_cache")]
    pub news_cache_cmd: String,

    /// Command that runs the trading bot
    #[arg(long, env = "BOT_CMD", default_value = "python3 -m bot.main")]
    pub bot_cmd: String,

    /// Command that serves the dashboard; `{port}` is replaced by the port
    #[arg(
        long,
        env = "DASHBOARD_CMD",
        default_value = "streamlit run dashboard.py --server.port {port} --server.headless true"
    )]
    pub dashboard_cmd: String,

    /// Dashboard port, also exported to the dashboard as DASHBOARD_PORT
    #[arg(long, env = "DASHBOARD_PORT", default_value_t = 8501)]
    pub dashboard_port: u16,

    /// Seconds to wait after launching the news refresher
    #[arg(long, env = "NEWS_SETTLE_DELAY", default_value_t = 5)]
    pub news_settle_delay: u64,

    /// Seconds to wait after launching the trading bot
    #[arg(long, env = "BOT_SETTLE_DELAY", default_value_t = 3)]
    pub bot_settle_delay: u64,

    /// Hold the bot launch until the first news refresh has finished
    #[arg(
        long,
        env = "NEWS_WAIT_FIRST_RUN",
        default_value = "false",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub news_wait_first_run: bool,

    /// Seconds workers get to stop before they are killed
    #[arg(long, env = "SHUTDOWN_GRACE", default_value_t = 10)]
    pub shutdown_grace: u64,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Supervisor settings.
    pub fn config(&self) -> Config {
        Config {
            grace: Duration::from_secs(self.shutdown_grace),
            ..Config::default()
        }
    }

    /// Validates the settings and builds the worker definitions in launch order.
    pub fn workers(&self) -> Result<Vec<WorkerSpec>, ConfigError> {
        if self.news_refresh_interval == 0 {
            return Err(ConfigError::InvalidInterval);
        }

        let news = parse_command("NEWS_CACHE_CMD", &self.news_cache_cmd)?;
        let bot = parse_command("BOT_CMD", &self.bot_cmd)?;
        let port = self.dashboard_port.to_string();
        let dashboard = parse_command(
            "DASHBOARD_CMD",
            &self.dashboard_cmd.replace(PORT_PLACEHOLDER, &port),
        )?
        .env("DASHBOARD_PORT", port);

        Ok(vec![
            WorkerSpec::periodic(
                NEWS_WORKER,
                ScheduleConfig {
                    interval: Duration::from_secs(self.news_refresh_interval),
                    run_immediately: self.news_run_immediately,
                    command: news,
                },
            )
            .with_settle_delay(Duration::from_secs(self.news_settle_delay))
            .with_wait_first_run(self.news_wait_first_run),
            WorkerSpec::process(BOT_WORKER, bot)
                .with_settle_delay(Duration::from_secs(self.bot_settle_delay)),
            WorkerSpec::process(DASHBOARD_WORKER, dashboard),
        ])
    }
}

fn parse_command(var: &'static str, line: &str) -> Result<CommandSpec, ConfigError> {
    CommandSpec::parse(line).ok_or(ConfigError::EmptyCommand { var })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorkerKind;

    // Flags take precedence over the environment, so tests pass every value
    // they assert on explicitly.
    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tradevisor").chain(args.iter().copied()))
            .expect("valid arguments")
    }

    #[test]
    fn builds_three_workers_in_launch_order() {
        let cli = parse(&[
            "--news-cache-cmd",
            "python3 -m bot.news_cache",
            "--bot-cmd",
            "python3 -m bot.main",
            "--dashboard-cmd",
            "streamlit run dashboard.py --server.port {port}",
            "--dashboard-port",
            "9000",
            "--news-refresh-interval",
            "60",
            "--news-settle-delay",
            "5",
            "--bot-settle-delay",
            "3",
            "--news-run-immediately",
            "false",
            "--news-wait-first-run",
            "yes",
        ]);
        let workers = cli.workers().expect("valid settings");
        let names: Vec<_> = workers.iter().map(|w| w.name()).collect();
        assert_eq!(names, [NEWS_WORKER, BOT_WORKER, DASHBOARD_WORKER]);

        match workers[0].kind() {
            WorkerKind::Periodic(cfg) => {
                assert_eq!(cfg.interval, Duration::from_secs(60));
                assert!(!cfg.run_immediately);
                assert_eq!(cfg.command.display(), "python3 -m bot.news_cache");
            }
            other => panic!("unexpected kind {other:?}"),
        }
        assert_eq!(workers[0].settle_delay(), Duration::from_secs(5));
        assert!(workers[0].wait_first_run());
        assert_eq!(workers[1].settle_delay(), Duration::from_secs(3));

        let dashboard = workers[2].command();
        assert_eq!(
            dashboard.display(),
            "streamlit run dashboard.py --server.port 9000"
        );
        assert_eq!(dashboard.envs(), [("DASHBOARD_PORT".to_string(), "9000".to_string())]);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cli = parse(&["--news-refresh-interval", "0"]);
        assert_eq!(cli.workers().unwrap_err(), ConfigError::InvalidInterval);
    }

    #[test]
    fn blank_command_is_rejected() {
        let cli = parse(&["--news-refresh-interval", "60", "--bot-cmd", "   "]);
        assert_eq!(
            cli.workers().unwrap_err(),
            ConfigError::EmptyCommand { var: "BOT_CMD" }
        );
    }

    #[test]
    fn grace_comes_from_settings() {
        let cli = parse(&["--shutdown-grace", "4"]);
        assert_eq!(cli.config().grace, Duration::from_secs(4));
    }

    #[test]
    fn non_numeric_interval_fails_to_parse() {
        let res = Cli::try_parse_from(["tradevisor", "--news-refresh-interval", "soon"]);
        assert!(res.is_err());
    }
}
