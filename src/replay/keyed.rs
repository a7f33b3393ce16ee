//! Keyed-Lock Replay Strategy
//!
//! Entries are sent to the workers one by one over a shared queue, without
//! batching. A worker locks the entry's connection in a [`KeyedLock`] of
//! sessions, applies the entry, and releases the lock.
//!
//! This keeps a session's backend handle exclusive, but it does **not**
//! keep a session's entries in log order: see the caveat in
//! [`keyed_lock`](crate::replay::keyed_lock). The batched strategy is the
//! default for that reason.
//!
//! There is no notion of an unterminated connection here. Entries run as
//! soon as they are read, and sessions still open when the queue drains are
//! closed at the end.

use crate::backend::Backend;
use crate::querylog::LogEntry;
use crate::replay::keyed_lock::KeyedLock;
use crate::replay::session::{Session, SessionContext};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

type SharedQueue = Arc<Mutex<mpsc::Receiver<LogEntry>>>;
type Sessions<B> = Arc<KeyedLock<u64, Session<B>>>;

/// Workers applying single entries under per-connection locks.
pub struct KeyedLockPool<B: Backend> {
    workers: Vec<JoinHandle<()>>,
    sessions: Sessions<B>,
    ctx: SessionContext<B>,
}

impl<B: Backend> KeyedLockPool<B> {
    pub fn spawn(
        size: NonZeroUsize,
        ctx: SessionContext<B>,
        queue: mpsc::Receiver<LogEntry>,
    ) -> Self {
        let queue: SharedQueue = Arc::new(Mutex::new(queue));
        let sessions: Sessions<B> = Arc::new(KeyedLock::new());

        let workers = (0..size.get())
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    ctx.clone(),
                    Arc::clone(&queue),
                    Arc::clone(&sessions),
                ))
            })
            .collect();

        debug!(workers = size.get(), "Keyed-lock worker pool started");

        Self {
            workers,
            sessions,
            ctx,
        }
    }

    /// Waits for the workers, then closes every session left open.
    pub async fn join(self) -> Result<(), JoinError> {
        for worker in self.workers {
            worker.await?;
        }
        for mut session in self.sessions.drain() {
            session.close(&self.ctx).await;
        }
        Ok(())
    }
}

async fn worker_loop<B: Backend>(
    id: usize,
    ctx: SessionContext<B>,
    queue: SharedQueue,
    sessions: Sessions<B>,
) {
    let mut entries = 0u64;

    loop {
        let entry = queue.lock().await.recv().await;
        let Some(entry) = entry else {
            break;
        };

        let conn = entry.connection_id;
        let mut session = sessions.lock(&conn, || Session::new(conn)).await;
        session.apply(&ctx, &entry).await;
        if entry.command.is_quit() {
            sessions.remove(&conn);
        }
        drop(session);
        entries += 1;
    }

    debug!(worker = id, entries, "Keyed-lock worker finished");
}
