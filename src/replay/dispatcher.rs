//! Connection Batching Dispatcher
//!
//! Groups parsed entries by connection id and hands each connection to the
//! worker pool as one [`ConnectionBatch`], once its `Quit` has been seen.
//!
//! ```text
//!  entries ──> ┌──────────────────────────┐
//!              │ pending: id -> batch     │   Quit for id
//!              │   15: [Connect, Query]   │ ───────────────> bounded queue ──> workers
//!              │   16: [Connect]          │
//!              └──────────────────────────┘
//! ```
//!
//! A batch is moved into the queue as a whole, so a single worker owns every
//! entry of a connection and runs them in log order. Sending blocks while the
//! queue is full, which throttles reading the log to the replay speed.

use crate::querylog::LogEntry;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{trace, warn};

/// The ordered entries of one client session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionBatch {
    pub connection_id: u64,
    pub entries: Vec<LogEntry>,
}

impl ConnectionBatch {
    pub fn new(connection_id: u64) -> Self {
        Self {
            connection_id,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors that can occur while dispatching.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DispatchError {
    /// Every worker has gone away
    #[error("work queue closed, no workers left to run connection {0}")]
    QueueClosed(u64),
}

/// Accumulates entries per connection and dispatches finished sessions.
pub struct Dispatcher {
    /// Sessions that have not seen their `Quit` yet
    pending: HashMap<u64, ConnectionBatch>,

    /// Bounded queue drained by the worker pool
    queue: mpsc::Sender<ConnectionBatch>,

    /// Number of batches sent so far
    dispatched: u64,
}

impl Dispatcher {
    pub fn new(queue: mpsc::Sender<ConnectionBatch>) -> Self {
        Self {
            pending: HashMap::new(),
            queue,
            dispatched: 0,
        }
    }

    /// Adds an entry to its connection's batch, dispatching the batch if the
    /// entry ends the session. Waits while the queue is full.
    pub async fn push(&mut self, entry: LogEntry) -> Result<(), DispatchError> {
        let id = entry.connection_id;
        let ends_session = entry.command.is_quit();

        self.pending
            .entry(id)
            .or_insert_with(|| ConnectionBatch::new(id))
            .entries
            .push(entry);

        if ends_session {
            if let Some(batch) = self.pending.remove(&id) {
                self.send(batch).await?;
            }
        }
        Ok(())
    }

    /// Number of sessions still waiting for their `Quit`.
    pub fn pending_connections(&self) -> usize {
        self.pending.len()
    }

    /// Number of batches sent to the queue.
    pub fn dispatched(&self) -> u64 {
        self.dispatched
    }

    /// Ends dispatching and closes the queue.
    ///
    /// Sessions that never saw a `Quit` are discarded unless
    /// `flush_unterminated` is set, in which case they are dispatched in
    /// connection id order. Returns the number of discarded sessions.
    pub async fn finish(mut self, flush_unterminated: bool) -> Result<usize, DispatchError> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        if flush_unterminated {
            let mut batches: Vec<_> = self.pending.drain().map(|(_, batch)| batch).collect();
            batches.sort_by_key(|batch| batch.connection_id);
            for batch in batches {
                self.send(batch).await?;
            }
            return Ok(0);
        }

        let discarded = self.pending.len();
        warn!(
            connections = discarded,
            "Discarding connections that never quit before the end of the log"
        );
        Ok(discarded)
    }

    async fn send(&mut self, batch: ConnectionBatch) -> Result<(), DispatchError> {
        let id = batch.connection_id;
        trace!(conn = id, entries = batch.len(), "Dispatching connection");
        self.queue
            .send(batch)
            .await
            .map_err(|_| DispatchError::QueueClosed(id))?;
        self.dispatched += 1;
        Ok(())
    }
}
