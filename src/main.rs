//! glreplay - MySQL General Log Replay
//!
//! This is the main entry point for the replay tool.
//! It parses the configuration, sets up logging and the MySQL backend, runs
//! the replay and prints the final summary.

use anyhow::Context;
use clap::Parser;
use glreplay::backend::MysqlBackend;
use glreplay::config::{Cli, Input, ReplayConfig};
use glreplay::querylog::LogReader;
use glreplay::replay::{replay, ProgressReporter, ReplayStats, ReplaySummary, SessionContext};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncRead;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Set up logging; stdout is reserved for the summary
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ReplayConfig::try_from(cli).context("invalid configuration")?;
    info!(
        version = glreplay::VERSION,
        server = %config.addr,
        "glreplay starting"
    );

    let input = open_input(&config.input).await?;
    let reader = LogReader::new(input);

    // Shared across all workers and the progress reporter
    let stats = Arc::new(ReplayStats::new());
    let ctx = SessionContext {
        backend: Arc::new(MysqlBackend::new(config.mysql_opts())),
        stats: Arc::clone(&stats),
        filter: config.filter,
    };

    let start = Instant::now();
    let progress = ProgressReporter::start(Arc::clone(&stats), config.progress_interval);

    tokio::select! {
        result = replay(reader, ctx, &config.replay) => {
            drop(progress);
            let summary = result.context("replay aborted")?;
            println!("\n{}", summary);
        }
        Ok(()) = signal::ctrl_c() => {
            // In-flight sessions are abandoned, not drained
            drop(progress);
            warn!("Interrupted, abandoning in-flight connections");
            let summary = ReplaySummary {
                elapsed: start.elapsed(),
                stats: stats.snapshot(),
                unterminated: 0,
            };
            println!("\n{}", summary);
            std::process::exit(0);
        }
    }

    Ok(())
}

/// Opens the general log for reading.
async fn open_input(input: &Input) -> anyhow::Result<Box<dyn AsyncRead + Unpin + Send>> {
    match input {
        Input::Stdin => Ok(Box::new(tokio::io::stdin())),
        Input::File(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open general log {}", path.display()))?;
            Ok(Box::new(file))
        }
    }
}
