//! In-memory backend that records every call, for tests.

use crate::backend::{Backend, BackendError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open { handle: u64, target: String },
    Execute { handle: u64, target: String, statement: String },
    Close { handle: u64, target: String },
}

#[derive(Debug)]
pub struct RecordingHandle {
    id: u64,
    target: String,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<Call>>,
    refused_targets: HashSet<String>,
    failing_statements: HashSet<String>,
    panicking_statements: HashSet<String>,
    execute_delay: Option<Duration>,
    next_handle: AtomicU64,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_target(mut self, target: &str) -> Self {
        self.refused_targets.insert(target.to_string());
        self
    }

    pub fn fail_statement(mut self, statement: &str) -> Self {
        self.failing_statements.insert(statement.to_string());
        self
    }

    pub fn panic_on_statement(mut self, statement: &str) -> Self {
        self.panicking_statements.insert(statement.to_string());
        self
    }

    pub fn with_execute_delay(mut self, delay: Duration) -> Self {
        self.execute_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Statements executed for `target`, in execution order.
    pub fn executed_for(&self, target: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Execute { target: t, statement, .. } if t == target => Some(statement),
                _ => None,
            })
            .collect()
    }

    /// Handles that executed statements for `target`.
    pub fn handles_for(&self, target: &str) -> HashSet<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Execute { target: t, handle, .. } if t == target => Some(handle),
                _ => None,
            })
            .collect()
    }

    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    type Handle = RecordingHandle;

    async fn open(&self, target: &str) -> Result<RecordingHandle, BackendError> {
        if self.refused_targets.contains(target) {
            return Err(BackendError::Refused(target.to_string()));
        }
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        let open = self.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_open.fetch_max(open, Ordering::SeqCst);
        self.record(Call::Open {
            handle: id,
            target: target.to_string(),
        });
        Ok(RecordingHandle {
            id,
            target: target.to_string(),
        })
    }

    async fn execute(
        &self,
        handle: &mut RecordingHandle,
        statement: &str,
    ) -> Result<(), BackendError> {
        if let Some(delay) = self.execute_delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking_statements.contains(statement) {
            panic!("backend crashed on {:?}", statement);
        }
        self.record(Call::Execute {
            handle: handle.id,
            target: handle.target.clone(),
            statement: statement.to_string(),
        });
        if self.failing_statements.contains(statement) {
            return Err(BackendError::Statement(statement.to_string()));
        }
        Ok(())
    }

    async fn close(&self, handle: RecordingHandle) {
        self.open_now.fetch_sub(1, Ordering::SeqCst);
        self.record(Call::Close {
            handle: handle.id,
            target: handle.target,
        });
    }
}
