//! Per-entry background task tracking.
//!
//! Every upload or original-image download runs under a cancellation token
//! keyed by the entry id, so deleting the entry cancels its in-flight work.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use cs_core::EntryId;

/// Handle for one registered task. Pass it back to [`EntryTasks::finish`].
#[derive(Debug, Clone)]
pub struct TaskTicket {
    pub id: EntryId,
    pub token: CancellationToken,
    seq: u64,
}

#[derive(Debug, Default)]
pub struct EntryTasks {
    running: Mutex<HashMap<EntryId, (u64, CancellationToken)>>,
    next_seq: AtomicU64,
    /// Parent of every task token; cancelled on shutdown.
    root: CancellationToken,
}

impl EntryTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register work for `id`, cancelling whatever was running for it before.
    pub fn register(&self, id: &EntryId) -> TaskTicket {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let token = self.root.child_token();
        let previous = self
            .lock()
            .insert(id.clone(), (seq, token.clone()));
        if let Some((_, previous)) = previous {
            debug!(entry_id = %id, "Superseding running task");
            previous.cancel();
        }
        TaskTicket {
            id: id.clone(),
            token,
            seq,
        }
    }

    /// Forget the task if it is still the registered one.
    pub fn finish(&self, ticket: &TaskTicket) {
        let mut running = self.lock();
        if matches!(running.get(&ticket.id), Some((seq, _)) if *seq == ticket.seq) {
            running.remove(&ticket.id);
        }
    }

    pub fn cancel(&self, id: &EntryId) -> bool {
        match self.lock().remove(id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether [`cancel_all`](Self::cancel_all) has run.
    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    pub fn is_running(&self, id: &EntryId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn cancel_all(&self) {
        self.root.cancel();
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EntryId, (u64, CancellationToken)>> {
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
