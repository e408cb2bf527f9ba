//! Observable engine signals.
//!
//! UI-facing notifications go out on a broadcast channel; the draft count is
//! a watch value so late subscribers always see the current number.

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::warn;

use cs_core::ports::ApiError;
use cs_core::{ChannelState, EntryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadOutcome {
    Succeeded,
    Duplicate,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The entry collection changed; re-read it through the handle.
    EntriesChanged,
    EntryCaptured { id: EntryId },
    UploadFinished { id: EntryId, outcome: UploadOutcome },
    /// 401 from the server; the user has to sign in again.
    AuthExpired,
    StorageLimitReached,
    ChannelStateChanged { state: ChannelState },
}

#[derive(Debug, Clone)]
pub struct EngineSignals {
    events: broadcast::Sender<EngineEvent>,
    draft_count: watch::Sender<usize>,
}

impl Default for EngineSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineSignals {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        let (draft_count, _) = watch::channel(0);
        Self {
            events,
            draft_count,
        }
    }

    pub fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn set_draft_count(&self, count: usize) {
        self.draft_count.send_replace(count);
    }

    pub fn draft_count(&self) -> usize {
        *self.draft_count.borrow()
    }

    pub fn watch_draft_count(&self) -> watch::Receiver<usize> {
        self.draft_count.subscribe()
    }

    /// Surface the errors that need user action. Everything else is only logged.
    pub fn report_api_error(&self, context: &str, err: &ApiError) {
        match err {
            ApiError::Unauthorized => {
                warn!(context, "Authentication expired");
                self.emit(EngineEvent::AuthExpired);
            }
            ApiError::StorageLimit => {
                warn!(context, "Storage limit reached");
                self.emit(EngineEvent::StorageLimitReached);
            }
            other => warn!(context, error = %other, "Remote call failed"),
        }
    }
}
