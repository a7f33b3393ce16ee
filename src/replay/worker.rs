//! Worker Pool
//!
//! A fixed number of tokio tasks drain the batch queue. Each batch is run
//! from start to finish by the task that dequeued it, against a single
//! backend handle that no other task ever sees.
//!
//! ```text
//!                   ┌──────────┐
//!             ┌───> │ worker 0 │ ── Session ──> Backend
//! queue ──────┼───> │ worker 1 │ ── Session ──> Backend
//! (batches)   └───> │ worker N │ ── Session ──> Backend
//!                   └──────────┘
//! ```
//!
//! Workers exit once the queue is closed and empty.

use crate::backend::Backend;
use crate::replay::dispatcher::ConnectionBatch;
use crate::replay::session::{Session, SessionContext};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, trace};

/// Shared receiving end of the batch queue
type SharedQueue = Arc<Mutex<mpsc::Receiver<ConnectionBatch>>>;

/// Handle to a running set of workers.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `size` workers draining `queue`.
    pub fn spawn<B: Backend>(
        size: NonZeroUsize,
        ctx: SessionContext<B>,
        queue: mpsc::Receiver<ConnectionBatch>,
    ) -> Self {
        let queue: SharedQueue = Arc::new(Mutex::new(queue));

        let workers = (0..size.get())
            .map(|id| tokio::spawn(worker_loop(id, ctx.clone(), Arc::clone(&queue))))
            .collect();

        debug!(workers = size.get(), "Worker pool started");

        Self { workers }
    }

    /// Number of workers in the pool.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every worker to finish. Workers finish once the sending
    /// side of the queue is dropped and every queued batch has been run.
    pub async fn join(self) -> Result<(), JoinError> {
        for worker in self.workers {
            worker.await?;
        }
        Ok(())
    }
}

async fn worker_loop<B: Backend>(id: usize, ctx: SessionContext<B>, queue: SharedQueue) {
    let mut batches = 0u64;

    loop {
        // Only the receive is under the lock; the batch runs without it
        let batch = queue.lock().await.recv().await;
        let Some(batch) = batch else {
            break;
        };
        run_batch(&ctx, batch).await;
        batches += 1;
    }

    debug!(worker = id, batches, "Worker finished");
}

/// Runs every entry of a batch in order, then closes the session.
pub async fn run_batch<B: Backend>(ctx: &SessionContext<B>, batch: ConnectionBatch) {
    trace!(conn = batch.connection_id, entries = batch.len(), "Running connection");

    let mut session = Session::new(batch.connection_id);
    for entry in &batch.entries {
        session.apply(ctx, entry).await;
    }
    session.close(ctx).await;
}
