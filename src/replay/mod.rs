//! Replay Engine
//!
//! Reads entries from a [`LogReader`], groups them into sessions and runs the
//! sessions against a [`Backend`] on a fixed pool of workers.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐    ┌────────────┐    ┌─────────────┐    ┌──────────────┐
//! │ LogReader │───>│ Dispatcher │───>│ batch queue │───>│ WorkerPool   │──> Backend
//! │           │    │ (per-conn  │    │ (bounded)   │    │ N × Session  │
//! └───────────┘    │  batches)  │    └─────────────┘    └──────┬───────┘
//!                  └────────────┘                              │
//!                                                              ▼
//!                  ┌──────────────────┐              ┌──────────────────┐
//!                  │ ProgressReporter │ <─── reads ──│   ReplayStats    │
//!                  └──────────────────┘              └──────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `stats`: Atomic counters and the final summary
//! - `session`: Applies one connection's entries to a backend handle
//! - `dispatcher`: Groups entries into per-connection batches
//! - `worker`: Worker pool draining the batch queue
//! - `keyed_lock`: Per-key mutexes
//! - `keyed`: The keyed-lock strategy (no ordering guarantee)
//! - `progress`: Periodic progress line

pub mod dispatcher;
pub mod keyed;
pub mod keyed_lock;
pub mod progress;
pub mod session;
pub mod stats;
pub mod worker;

pub use dispatcher::{ConnectionBatch, DispatchError, Dispatcher};
pub use keyed::KeyedLockPool;
pub use keyed_lock::KeyedLock;
pub use progress::{ProgressReporter, ProgressTick, DEFAULT_PROGRESS_INTERVAL};
pub use session::{Session, SessionContext, StatementFilter};
pub use stats::{ReplayStats, ReplaySummary, StatsSnapshot};
pub use worker::WorkerPool;

use crate::backend::Backend;
use crate::querylog::{LogReader, ReadError};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tracing::info;

/// Default capacity of the batch queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// How entries are handed to workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Whole sessions, dispatched on `Quit`. Keeps log order per connection.
    #[default]
    Batched,
    /// Single entries under a per-connection lock. No ordering guarantee.
    KeyedLock,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Batched => f.write_str("batched"),
            Strategy::KeyedLock => f.write_str("keyed-lock"),
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batched" => Ok(Strategy::Batched),
            "keyed-lock" => Ok(Strategy::KeyedLock),
            other => Err(format!(
                "unknown strategy '{}', expected 'batched' or 'keyed-lock'",
                other
            )),
        }
    }
}

/// Tuning of a replay run.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Number of workers
    pub concurrency: NonZeroUsize,
    /// Capacity of the queue between the reader and the workers
    pub queue_capacity: NonZeroUsize,
    pub strategy: Strategy,
    /// Dispatch sessions without a `Quit` at the end of the log
    pub flush_unterminated: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            concurrency: NonZeroUsize::MIN,
            queue_capacity: NonZeroUsize::new(DEFAULT_QUEUE_CAPACITY)
                .unwrap_or(NonZeroUsize::MIN),
            strategy: Strategy::Batched,
            flush_unterminated: false,
        }
    }
}

/// Errors that abort a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The log could not be read
    #[error(transparent)]
    Read(#[from] ReadError),

    /// Workers went away while entries were still being dispatched
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A worker task panicked
    #[error("worker task failed: {0}")]
    Worker(#[from] JoinError),
}

/// Replays every session in `reader` and waits for all of them to finish.
///
/// A read error aborts the replay immediately; sessions already handed to
/// workers are not waited for in that case.
pub async fn replay<R, B>(
    mut reader: LogReader<R>,
    ctx: SessionContext<B>,
    options: &ReplayOptions,
) -> Result<ReplaySummary, ReplayError>
where
    R: AsyncRead + Unpin,
    B: Backend,
{
    let start = Instant::now();
    info!(
        workers = options.concurrency.get(),
        strategy = %options.strategy,
        read_only = ctx.filter.is_read_only(),
        "Starting replay"
    );

    let unterminated = match options.strategy {
        Strategy::Batched => replay_batched(&mut reader, &ctx, options).await?,
        Strategy::KeyedLock => {
            replay_keyed(&mut reader, &ctx, options).await?;
            0
        }
    };

    let summary = ReplaySummary {
        elapsed: start.elapsed(),
        stats: ctx.stats.snapshot(),
        unterminated,
    };
    info!(
        entries = reader.entries_read(),
        elapsed_ms = summary.elapsed.as_millis(),
        unterminated,
        "Replay finished"
    );
    Ok(summary)
}

async fn replay_batched<R, B>(
    reader: &mut LogReader<R>,
    ctx: &SessionContext<B>,
    options: &ReplayOptions,
) -> Result<usize, ReplayError>
where
    R: AsyncRead + Unpin,
    B: Backend,
{
    let (tx, rx) = mpsc::channel(options.queue_capacity.get());
    let pool = WorkerPool::spawn(options.concurrency, ctx.clone(), rx);
    let mut dispatcher = Dispatcher::new(tx);

    while let Some(entry) = reader.next_entry().await? {
        if let Err(e) = dispatcher.push(entry).await {
            drop(dispatcher);
            return Err(worker_failure(pool.join().await, e));
        }
    }

    let unterminated = match dispatcher.finish(options.flush_unterminated).await {
        Ok(n) => n,
        Err(e) => return Err(worker_failure(pool.join().await, e)),
    };
    pool.join().await?;
    Ok(unterminated)
}

async fn replay_keyed<R, B>(
    reader: &mut LogReader<R>,
    ctx: &SessionContext<B>,
    options: &ReplayOptions,
) -> Result<(), ReplayError>
where
    R: AsyncRead + Unpin,
    B: Backend,
{
    let (tx, rx) = mpsc::channel(options.queue_capacity.get());
    let pool = KeyedLockPool::spawn(options.concurrency, ctx.clone(), rx);

    while let Some(entry) = reader.next_entry().await? {
        let conn = entry.connection_id;
        if tx.send(entry).await.is_err() {
            drop(tx);
            return Err(worker_failure(
                pool.join().await,
                DispatchError::QueueClosed(conn),
            ));
        }
    }

    drop(tx);
    pool.join().await?;
    Ok(())
}

/// The queue only closes early when every worker has exited, so a failed
/// send is reported as the worker failure behind it when there is one.
fn worker_failure(joined: Result<(), JoinError>, dispatch: DispatchError) -> ReplayError {
    match joined {
        Err(e) => ReplayError::Worker(e),
        Ok(()) => ReplayError::Dispatch(dispatch),
    }
}
