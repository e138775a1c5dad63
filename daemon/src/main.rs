//! Block scanner daemon: entry point for running the collector.

mod replay;

use clap::Parser;
use scan_collector::{init_logging, CollectorConfig, LogFormat, ShutdownController};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "block-scanner", about = "Finalized-block scanner and classifier")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "SCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SCAN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "SCAN_LOG_FORMAT")]
    log_format: Option<String>,

    /// Collect Prometheus metrics and print them on exit.
    #[arg(long, env = "SCAN_ENABLE_METRICS")]
    metrics: bool,

    /// Probe token-shaped contracts as soon as their events are seen.
    #[arg(long, env = "SCAN_PROBE_IMMEDIATE")]
    probe_immediate: bool,

    /// Capacity of the block event queue.
    #[arg(long, env = "SCAN_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Replay blocks from a JSON file against in-memory storage.
    Replay {
        /// File holding `blocks` plus optional `tokens`, `contracts` and
        /// `initial_tx_count`.
        #[arg(long)]
        blocks: PathBuf,
    },

    /// Print the effective configuration as TOML.
    Config,
}

impl Cli {
    fn effective_config(&self) -> anyhow::Result<CollectorConfig> {
        let mut config = match &self.config {
            Some(path) => CollectorConfig::from_toml_file(&path.to_string_lossy())?,
            None => CollectorConfig::default(),
        };
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.log_format = format.clone();
        }
        if let Some(capacity) = self.queue_capacity {
            config.queue_capacity = capacity;
        }
        config.enable_metrics |= self.metrics;
        config.probe.immediate |= self.probe_immediate;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.effective_config()?;

    let format: LogFormat = config.log_format.parse()?;
    init_logging(format, &config.log_level)?;
    if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {}", path.display());
    }

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string());
        }
        Command::Replay { blocks } => {
            let file = replay::ReplayFile::load(&blocks)?;

            let shutdown = Arc::new(ShutdownController::new());
            let signals = Arc::clone(&shutdown);
            tokio::spawn(async move { signals.wait_for_signal().await });

            let report = replay::run(file, &config, &shutdown).await?;
            tracing::info!(
                committed = report.blocks_committed,
                skipped = report.blocks_skipped,
                attempts = report.attempts,
                last_height = ?report.last_height,
                "block scanner exited cleanly"
            );
        }
    }

    Ok(())
}
