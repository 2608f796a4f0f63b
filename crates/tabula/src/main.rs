//! Tabula - Schema manager for time-series SQL tables
//!
//! # Usage
//!
//! ```bash
//! # Match a JSON-lines batch against the store, creating what is missing
//! tabula apply --input metrics.jsonl
//! tabula apply --config tabula.toml --input - --rows
//!
//! # Show a table's live structure
//! tabula columns cpu
//! ```

mod cmd;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tabula_config::{Config, LogFormat};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tabula - Schema manager for time-series SQL tables
#[derive(Parser, Debug)]
#[command(name = "tabula")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (defaults apply when it does not exist)
    #[arg(short, long, default_value = "tabula.toml", global = true)]
    config: std::path::PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log] level
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Match a batch of metrics against the store
    Apply(cmd::apply::ApplyArgs),

    /// Show the live columns of a table
    Columns(cmd::columns::ColumnsArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.log.level.directive());
    init_logging(&level, config.log.format)?;

    match cli.command {
        Command::Apply(args) => cmd::apply::run(args, &config).await,
        Command::Columns(args) => cmd::columns::run(args, &config).await,
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    Config::from_file(path).with_context(|| format!("failed to load config {}", path.display()))
}

/// Initialize the tracing subscriber for logging
///
/// Logs go to stderr; stdout carries command output.
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr).with_target(true))
            .init(),
    }

    Ok(())
}
