#![warn(clippy::all)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{info, level_filters::LevelFilter};

mod config;
mod consumer;
mod error;
mod monitoring;
mod notify;
mod orchestrator;
mod sinks;
mod zone;

use config::Config;
use monitoring::{RetryPolicy, Target};
use orchestrator::Orchestrator;

/// Probe URLs (including .onion services) and alert on up/down transitions
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML config file (created with defaults if missing)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Monitor the configured URLs until interrupted (default)
    Run,
    /// Monitor a single URL with retries and exponential backoff
    Watch {
        url: String,
        /// Attempt ceiling per probe
        #[arg(long)]
        attempts: Option<u32>,
    },
    /// Probe every configured URL once and exit non-zero if any is down
    Once,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    logger::init_tracing_with(if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO });
    info!("Starting pingwatch {}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_until_shutdown(config).await?,
        Command::Watch { url, attempts } => {
            configure_watchdog(&mut config, url, attempts);
            run_until_shutdown(config).await?;
        }
        Command::Once => return run_once(config).await,
        Command::Config => println!("{config}"),
    }

    Ok(ExitCode::SUCCESS)
}

/// Narrow the config to one URL and make sure retrying is on.
fn configure_watchdog(config: &mut Config, url: String, attempts: Option<u32>) {
    config.tor.enabled |= Target::new(url.as_str()).is_onion();
    config.monitor.urls = vec![url];

    // Only the ceiling is raised, the configured backoff stays.
    if config.retry.max_attempts <= 1 {
        config.retry.max_attempts = RetryPolicy::default().max_attempts;
    }
    if let Some(attempts) = attempts {
        config.retry.max_attempts = attempts;
    }

    config.sanitize();
}

async fn run_until_shutdown(config: Config) -> Result<()> {
    tokio::select! {
        result = Orchestrator::start(config) => result?,
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received. Stopping pingwatch...");
        }
    }
    Ok(())
}

async fn run_once(config: Config) -> Result<ExitCode> {
    let orchestrator = Orchestrator::new(config)?;
    let results = orchestrator.run_once().await;

    let mut failed = 0;
    for result in &results {
        match &result.error {
            Some(err) => {
                failed += 1;
                println!("DOWN {:<40} {}", result.url, err);
            }
            None => println!(
                "UP   {:<40} {} ({})",
                result.url,
                result.status_text(),
                humantime::format_duration(result.latency)
            ),
        }
    }

    info!("{} of {} URLs down", failed, results.len());
    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_watch_subcommand_parses() {
        let cli = Cli::parse_from(["pingwatch", "watch", "https://ok.example", "--attempts", "3"]);
        match cli.command {
            Some(Command::Watch { url, attempts }) => {
                assert_eq!(url, "https://ok.example");
                assert_eq!(attempts, Some(3));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_watchdog_enables_retry_and_onion() {
        let mut config = Config::default();
        config.monitor.urls = vec!["https://other.example".into()];

        configure_watchdog(&mut config, "http://abc.onion".into(), None);

        assert_eq!(config.monitor.urls, vec!["http://abc.onion"]);
        assert!(config.tor.enabled);
        assert_eq!(config.retry_policy(), Some(RetryPolicy::default()));
    }

    #[test]
    fn test_watchdog_attempts_override() {
        let mut config = Config::default();
        configure_watchdog(&mut config, "https://ok.example".into(), Some(2));
        assert_eq!(config.retry_policy().map(|p| p.max_attempts), Some(2));
    }

    #[test]
    fn test_watchdog_keeps_configured_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 250;

        configure_watchdog(&mut config, "https://ok.example".into(), None);

        assert_eq!(
            config.retry_policy(),
            Some(RetryPolicy::new(5, std::time::Duration::from_millis(250)))
        );
    }
}
