//! Campus CLI - authenticated client for the learning platform

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::Commands;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "campus")]
#[command(about = "Command line client for the Campus learning platform")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Configuration file (defaults to campus.toml in the config directory)
    #[arg(short = 'c', long, global = true, env = "CAMPUS_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the saved session and logs
    #[arg(short = 'd', long, global = true, env = "CAMPUS_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Override the API base URL from the configuration
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Timeout for one-shot commands in seconds (0 = no timeout)
    #[arg(short = 't', long, global = true, default_value = "30")]
    timeout: u64,

    /// Disable file logging (only log to stderr)
    #[arg(long, global = true)]
    no_file_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = config::load(cli.config.as_deref())?;
    if let Some(base_url) = cli.base_url {
        settings.api.base_url = base_url;
    }
    let state_dir = config::resolve_state_dir(cli.state_dir, &settings);

    logging::init_logging(cli.log_level.into(), &state_dir, cli.no_file_log)?;
    debug!(
        state_dir = %state_dir.display(),
        base_url = %settings.api.base_url,
        "Starting Campus CLI"
    );

    let long_running = cli.command.is_long_running();
    let run = cli.command.execute(settings, state_dir);

    // Execute command with optional timeout
    let outcome = if cli.timeout == 0 || long_running {
        run.await
    } else {
        match tokio::time::timeout(Duration::from_secs(cli.timeout), run).await {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("Command timed out after {} seconds", cli.timeout);
                std::process::exit(1);
            }
        }
    };

    if let Err(e) = outcome {
        error!("Command failed: {e:#}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    Ok(())
}

#[derive(Clone, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
