//! Upload pipeline
//! 上传管线
//!
//! Submits captured entries, drives the upload state machine and keeps the
//! draft store in step: `Failed` ⇔ present in the draft store.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, info_span, warn, Instrument};

use cs_core::ports::{ApiError, ClipboardApiPort, DeviceIdentityPort, DraftStorePort};
use cs_core::{ClipboardEntry, EntryId, UploadRequest, UploadState};

use crate::events::{EngineEvent, EngineSignals, UploadOutcome};
use crate::history::SharedHistory;
use crate::tasks::{EntryTasks, TaskTicket};

#[derive(Debug, Clone, PartialEq)]
pub enum UploadResult {
    /// Confirmed by the server; carries the entry under its server id.
    Success(ClipboardEntry),
    /// 409: the server already had it. Not an error.
    Duplicate,
    Failure(ApiError),
    /// Cancelled before the server answered (entry deleted or shutdown).
    Cancelled,
}

impl UploadResult {
    pub fn outcome(&self) -> UploadOutcome {
        match self {
            UploadResult::Success(_) => UploadOutcome::Succeeded,
            UploadResult::Duplicate => UploadOutcome::Duplicate,
            UploadResult::Failure(_) => UploadOutcome::Failed,
            UploadResult::Cancelled => UploadOutcome::Cancelled,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RetryError {
    #[error("entry {0} not found")]
    NotFound(EntryId),

    #[error("entry {0} is not a failed upload")]
    NotFailed(EntryId),
}

pub struct UploadPipeline {
    api: Arc<dyn ClipboardApiPort>,
    drafts: Arc<dyn DraftStorePort>,
    device_identity: Arc<dyn DeviceIdentityPort>,
    history: SharedHistory,
    tasks: Arc<EntryTasks>,
    signals: EngineSignals,
    tracker: TaskTracker,
}

impl UploadPipeline {
    pub fn new(
        api: Arc<dyn ClipboardApiPort>,
        drafts: Arc<dyn DraftStorePort>,
        device_identity: Arc<dyn DeviceIdentityPort>,
        history: SharedHistory,
        tasks: Arc<EntryTasks>,
        signals: EngineSignals,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            api,
            drafts,
            device_identity,
            history,
            tasks,
            signals,
            tracker,
        }
    }

    /// Upload one entry. Inserts it into the collection if it is not there yet.
    pub async fn upload(&self, entry: ClipboardEntry) -> UploadResult {
        let span = info_span!("usecase.upload.execute", entry_id = %entry.id);
        async move {
            let local_id = entry.id.clone();
            let result = self.run(entry).await;
            self.publish_draft_count().await;
            self.signals.emit(EngineEvent::UploadFinished {
                id: match &result {
                    UploadResult::Success(confirmed) => confirmed.id.clone(),
                    _ => local_id,
                },
                outcome: result.outcome(),
            });
            result
        }
        .instrument(span)
        .await
    }

    /// Run [`upload`](Self::upload) as a tracked background task.
    pub fn spawn_upload(self: &Arc<Self>, entry: ClipboardEntry) -> JoinHandle<UploadResult> {
        let pipeline = Arc::clone(self);
        self.tracker.spawn(async move { pipeline.upload(entry).await })
    }

    /// Manual retry of a `Failed` entry. There is no automatic retry loop.
    pub async fn retry(&self, id: &EntryId) -> Result<UploadResult, RetryError> {
        let entry = {
            let history = self.history.lock().await;
            let entry = history
                .get(id)
                .cloned()
                .ok_or_else(|| RetryError::NotFound(id.clone()))?;
            if entry.upload_state != UploadState::Failed {
                return Err(RetryError::NotFailed(id.clone()));
            }
            entry
        };
        info!(entry_id = %id, "Retrying failed upload");
        Ok(self.upload(entry).await)
    }

    /// Put persisted drafts back into the collection as `Failed` entries.
    pub async fn restore_drafts(&self) -> usize {
        let drafts = match self.drafts.load_all().await {
            Ok(drafts) => drafts,
            Err(err) => {
                warn!(error = %err, "Failed to load drafts");
                Vec::new()
            }
        };

        let mut restored = 0;
        {
            let mut history = self.history.lock().await;
            for mut draft in drafts {
                draft.upload_state = UploadState::Failed;
                if history.insert_if_absent(draft) {
                    restored += 1;
                }
            }
        }

        if restored > 0 {
            info!(restored, "Restored drafts from previous session");
            self.signals.emit(EngineEvent::EntriesChanged);
        }
        self.publish_draft_count().await;
        restored
    }

    /// Refresh the observable draft count from the store.
    pub async fn publish_draft_count(&self) {
        match self.drafts.count().await {
            Ok(count) => self.signals.set_draft_count(count),
            Err(err) => warn!(error = %err, "Failed to count drafts"),
        }
    }

    async fn run(&self, entry: ClipboardEntry) -> UploadResult {
        let local_id = entry.id.clone();
        // Held until the outcome is applied: a delete cancels this token while
        // holding the collection lock, which is how a missing entry is told
        // apart from one that was never removed.
        let ticket = self.tasks.register(&local_id);

        let entry = {
            let mut history = self.history.lock().await;
            history.insert_if_absent(entry.clone());
            history.set_upload_state(&local_id, UploadState::Uploading);
            history.get(&local_id).cloned().unwrap_or(entry)
        };
        self.signals.emit(EngineEvent::EntriesChanged);

        let device_id = self.device_identity.current_device_id();
        let request = entry
            .validate()
            .ok()
            .and_then(|_| UploadRequest::from_entry(&entry, &device_id));

        let response = match request {
            Some(request) => {
                tokio::select! {
                    biased;
                    _ = ticket.token.cancelled() => None,
                    response = self.api.create_item(request) => Some(response),
                }
            }
            None => Some(Err(ApiError::InvalidRequest(format!(
                "entry {local_id} has no uploadable payload"
            )))),
        };

        let result = match response {
            None => self.on_cancelled(&local_id, &entry).await,
            Some(Ok(confirmed)) => self.on_success(&ticket, &entry, confirmed).await,
            Some(Err(ApiError::Conflict)) => self.on_duplicate(&local_id).await,
            Some(Err(err)) => self.on_failure(&ticket, &entry, err).await,
        };
        self.tasks.finish(&ticket);
        result
    }

    async fn on_success(
        &self,
        ticket: &TaskTicket,
        local: &ClipboardEntry,
        confirmed: ClipboardEntry,
    ) -> UploadResult {
        let local_id = &local.id;
        let server_id = confirmed.id.clone();

        let stored = {
            let mut history = self.history.lock().await;
            if history.migrate_id(local_id, &server_id) {
                history.merge_remote(confirmed);
                history.get(&server_id).cloned()
            } else if ticket.token.is_cancelled() {
                None
            } else {
                warn!(entry_id = %local_id, "Uploaded entry vanished from history, restoring it");
                let mut restored = local.clone();
                restored.id = server_id.clone();
                restored.upload_state = UploadState::Succeeded;
                history.insert_if_absent(restored);
                history.merge_remote(confirmed);
                history.get(&server_id).cloned()
            }
        };

        self.remove_draft(local_id).await;

        let Some(stored) = stored else {
            debug!(entry_id = %local_id, server_id = %server_id, "Upload finished for deleted entry");
            if let Err(err) = self.api.delete_item(&server_id).await {
                if err != ApiError::NotFound {
                    warn!(server_id = %server_id, error = %err, "Failed to delete orphaned upload");
                }
            }
            return UploadResult::Cancelled;
        };

        if *local_id != server_id {
            debug!(entry_id = %local_id, server_id = %server_id, "Migrated entry id");
        }
        info!(entry_id = %server_id, "Upload succeeded");
        self.signals.emit(EngineEvent::EntriesChanged);
        UploadResult::Success(stored)
    }

    async fn on_duplicate(&self, local_id: &EntryId) -> UploadResult {
        self.history
            .lock()
            .await
            .set_upload_state(local_id, UploadState::Succeeded);
        self.remove_draft(local_id).await;
        info!(entry_id = %local_id, "Server already has this entry");
        self.signals.emit(EngineEvent::EntriesChanged);
        UploadResult::Duplicate
    }

    async fn on_failure(
        &self,
        ticket: &TaskTicket,
        local: &ClipboardEntry,
        err: ApiError,
    ) -> UploadResult {
        self.signals.report_api_error("upload", &err);
        if ticket.token.is_cancelled() && !self.history.lock().await.contains(&local.id) {
            self.remove_draft(&local.id).await;
        } else {
            self.park_as_draft(local).await;
        }
        UploadResult::Failure(err)
    }

    async fn on_cancelled(&self, local_id: &EntryId, local: &ClipboardEntry) -> UploadResult {
        let still_present = self.history.lock().await.contains(local_id);
        if !still_present {
            self.remove_draft(local_id).await;
        } else if self.tasks.is_shutting_down() {
            // Shutdown: keep it for the next session.
            self.park_as_draft(local).await;
        }
        debug!(entry_id = %local_id, "Upload cancelled");
        UploadResult::Cancelled
    }

    /// Persist the entry as a draft first, then flip it to `Failed`.
    ///
    /// An entry that is no longer in the collection is put back from
    /// `fallback` so the draft stays retryable.
    async fn park_as_draft(&self, fallback: &ClipboardEntry) {
        let id = &fallback.id;
        let current = self.history.lock().await.get(id).cloned();
        let restoring = current.is_none();
        let mut snapshot = current.unwrap_or_else(|| fallback.clone());
        snapshot.upload_state = UploadState::Failed;

        if let Err(err) = self.drafts.save(&snapshot).await {
            warn!(entry_id = %id, error = %err, "Failed to save draft");
        }
        let kept = {
            let mut history = self.history.lock().await;
            history.set_upload_state(id, UploadState::Failed)
                || (restoring && history.insert_if_absent(snapshot))
        };
        if !kept {
            // Deleted while the draft was being written.
            self.remove_draft(id).await;
            return;
        }
        self.signals.emit(EngineEvent::EntriesChanged);
    }

    async fn remove_draft(&self, id: &EntryId) {
        if let Err(err) = self.drafts.remove(id).await {
            warn!(entry_id = %id, error = %err, "Failed to remove draft");
        }
    }
}
