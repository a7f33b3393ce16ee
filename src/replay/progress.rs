//! Background Progress Reporter
//!
//! Logs one progress line per interval while a replay is running:
//!
//! ```text
//! Conns: 12	Queries: 48210	QPS: 5321
//! ```
//!
//! The reporter runs as a Tokio task and stops when its handle is stopped or
//! dropped.

use crate::replay::stats::{ReplayStats, StatsSnapshot};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Default interval between progress lines
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// One progress line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressTick {
    /// Sessions currently open
    pub conns: i64,
    /// Queries sent to the backend so far
    pub queries: i64,
    /// Queries per second since the previous tick
    pub qps: f64,
}

impl ProgressTick {
    /// Builds a tick from the current counters and the executed query count
    /// at the previous tick, `interval` ago.
    pub fn new(snapshot: &StatsSnapshot, last_queries: i64, interval: Duration) -> Self {
        let queries = snapshot.executed_queries();
        let secs = interval.as_secs_f64();
        let qps = if secs > 0.0 {
            (queries - last_queries) as f64 / secs
        } else {
            0.0
        };
        Self {
            conns: snapshot.conn_open,
            queries,
            qps,
        }
    }
}

impl fmt::Display for ProgressTick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Conns: {}\tQueries: {}\tQPS: {:.0}",
            self.conns, self.queries, self.qps
        )
    }
}

/// A handle to the running progress reporter.
///
/// When this handle is dropped, the reporter task will be stopped.
#[derive(Debug)]
pub struct ProgressReporter {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl ProgressReporter {
    /// Starts reporting progress for `stats` every `interval`.
    pub fn start(stats: Arc<ReplayStats>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(reporter_loop(stats, interval, shutdown_rx));

        debug!(interval_ms = interval.as_millis(), "Progress reporter started");

        Self { shutdown_tx }
    }

    /// Stops the reporter.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn reporter_loop(
    stats: Arc<ReplayStats>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_queries = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Progress reporter received shutdown signal");
                    return;
                }
            }
        }

        let tick = ProgressTick::new(&stats.snapshot(), last_queries, interval);
        log_tick(&tick);
        last_queries = tick.queries;
    }
}

fn log_tick(tick: &ProgressTick) {
    info!("{}", tick);
}
