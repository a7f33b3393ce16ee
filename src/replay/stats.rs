//! Replay Statistics
//!
//! A fixed set of counters shared by every worker, the progress reporter and
//! the final summary. Each counter is its own atomic, so workers never
//! contend on a lock to record an event.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Live replay counters.
///
/// Created once at startup and shared through an `Arc`.
#[derive(Debug, Default)]
pub struct ReplayStats {
    /// Query entries reached by a worker
    pub query_count: AtomicI64,
    /// Queries the backend rejected
    pub query_failed: AtomicI64,
    /// Queries not executed (no session, or filtered out)
    pub query_skipped: AtomicI64,
    /// Connect entries reached by a worker
    pub conn_count: AtomicI64,
    /// Sessions currently open
    pub conn_open: AtomicI64,
    /// Connect entries whose open failed
    pub conn_failed: AtomicI64,
    /// Entries of other command kinds reached by a worker
    pub commands_ignored: AtomicI64,
}

impl ReplayStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_attempted(&self) {
        self.conn_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_failed(&self) {
        self.conn_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_opened(&self) {
        self.conn_open.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.conn_open.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn query_attempted(&self) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn query_failed(&self) {
        self.query_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn query_skipped(&self) {
        self.query_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_ignored(&self) {
        self.commands_ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads every counter. Counters are read one by one, so the snapshot is
    /// not atomic across counters while workers are running.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            query_count: self.query_count.load(Ordering::Relaxed),
            query_failed: self.query_failed.load(Ordering::Relaxed),
            query_skipped: self.query_skipped.load(Ordering::Relaxed),
            conn_count: self.conn_count.load(Ordering::Relaxed),
            conn_open: self.conn_open.load(Ordering::Relaxed),
            conn_failed: self.conn_failed.load(Ordering::Relaxed),
            commands_ignored: self.commands_ignored.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ReplayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub query_count: i64,
    pub query_failed: i64,
    pub query_skipped: i64,
    pub conn_count: i64,
    pub conn_open: i64,
    pub conn_failed: i64,
    pub commands_ignored: i64,
}

impl StatsSnapshot {
    /// Queries actually sent to the backend, failed or not.
    pub fn executed_queries(&self) -> i64 {
        self.query_count - self.query_skipped
    }
}

/// Final report of a replay run.
#[derive(Debug, Clone, Copy)]
pub struct ReplaySummary {
    pub elapsed: Duration,
    pub stats: StatsSnapshot,
    /// Connections that never saw a `Quit` and were discarded
    pub unterminated: usize,
}

impl ReplaySummary {
    pub fn queries_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.executed_queries() as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for ReplaySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total time:         {:.6}s", self.elapsed.as_secs_f64())?;
        writeln!(f, "Queries per second: {:.6}", self.queries_per_second())?;
        writeln!(f, "Total queries:      {}", self.stats.query_count)?;
        writeln!(f, "Failed queries:     {}", self.stats.query_failed)?;
        writeln!(f, "Skipped queries:    {}", self.stats.query_skipped)?;
        writeln!(f, "Total connections:  {}", self.stats.conn_count)?;
        write!(f, "Failed connections: {}", self.stats.conn_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters() {
        let stats = ReplayStats::new();
        stats.connection_attempted();
        stats.connection_opened();
        stats.query_attempted();
        stats.query_attempted();
        stats.query_skipped();
        stats.query_failed();
        stats.connection_closed();

        let snap = stats.snapshot();
        assert_eq!(snap.conn_count, 1);
        assert_eq!(snap.conn_open, 0);
        assert_eq!(snap.query_count, 2);
        assert_eq!(snap.query_skipped, 1);
        assert_eq!(snap.query_failed, 1);
        assert_eq!(snap.executed_queries(), 1);
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = Arc::new(ReplayStats::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.query_attempted();
                        stats.connection_opened();
                        stats.connection_closed();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.query_count, 8000);
        assert_eq!(snap.conn_open, 0);
    }

    #[test]
    fn test_summary_report() {
        let summary = ReplaySummary {
            elapsed: Duration::from_secs(2),
            stats: StatsSnapshot {
                query_count: 10,
                query_skipped: 2,
                query_failed: 1,
                conn_count: 3,
                conn_failed: 1,
                ..Default::default()
            },
            unterminated: 0,
        };
        assert_eq!(summary.queries_per_second(), 4.0);

        let report = summary.to_string();
        assert!(report.contains("Total time:         2.000000s"));
        assert!(report.contains("Queries per second: 4.000000"));
        assert!(report.contains("Skipped queries:    2"));
        assert!(report.ends_with("Failed connections: 1"));
    }

    #[test]
    fn test_zero_elapsed() {
        let summary = ReplaySummary {
            elapsed: Duration::ZERO,
            stats: StatsSnapshot::default(),
            unterminated: 0,
        };
        assert_eq!(summary.queries_per_second(), 0.0);
    }
}
