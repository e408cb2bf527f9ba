//! User actions on single entries: bookmark, edit, delete, fetch original,
//! copy back to the system clipboard.
//!
//! Remote-backed actions apply optimistically and roll back on failure.
//! Entries that never reached the server are changed locally only, with the
//! draft record kept in step.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use cs_core::ports::{ApiError, ClipboardApiPort, DraftStorePort, ImageSpoolPort, SystemClipboardPort};
use cs_core::{
    ClipboardEntry, ContentType, EntryId, ImageFidelity, ImageRef, UploadState,
};

use crate::events::{EngineEvent, EngineSignals};
use crate::history::SharedHistory;
use crate::tasks::EntryTasks;
use crate::usecases::capture_watcher::CaptureWatcher;

#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("entry {0} not found")]
    NotFound(EntryId),

    #[error("entry {id} does not support {action}")]
    Unsupported { id: EntryId, action: &'static str },

    #[error("original image for entry {0} was deleted on the server")]
    OriginalDeleted(EntryId),

    #[error("entry {0} is still uploading")]
    Busy(EntryId),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("local storage error: {0}")]
    Storage(String),

    #[error("clipboard error: {0}")]
    Clipboard(String),
}

pub struct EntryActions {
    api: Arc<dyn ClipboardApiPort>,
    drafts: Arc<dyn DraftStorePort>,
    spool: Arc<dyn ImageSpoolPort>,
    clipboard: Arc<dyn SystemClipboardPort>,
    watcher: Arc<CaptureWatcher>,
    history: SharedHistory,
    tasks: Arc<EntryTasks>,
    signals: EngineSignals,
}

impl EntryActions {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn ClipboardApiPort>,
        drafts: Arc<dyn DraftStorePort>,
        spool: Arc<dyn ImageSpoolPort>,
        clipboard: Arc<dyn SystemClipboardPort>,
        watcher: Arc<CaptureWatcher>,
        history: SharedHistory,
        tasks: Arc<EntryTasks>,
        signals: EngineSignals,
    ) -> Self {
        Self {
            api,
            drafts,
            spool,
            clipboard,
            watcher,
            history,
            tasks,
            signals,
        }
    }

    /// Flip the bookmark flag. Returns the new value.
    #[instrument(name = "usecase.toggle_bookmark", skip_all, fields(entry_id = %id))]
    pub async fn toggle_bookmark(&self, id: &EntryId) -> Result<bool, ActionError> {
        let (previous, snapshot) = {
            let mut history = self.history.lock().await;
            let previous = history
                .get(id)
                .map(|entry| entry.is_bookmarked)
                .ok_or_else(|| ActionError::NotFound(id.clone()))?;
            history.update(id, |entry| entry.is_bookmarked = !previous);
            (previous, history.get(id).cloned())
        };
        self.signals.emit(EngineEvent::EntriesChanged);
        let bookmarked = !previous;

        let Some(snapshot) = snapshot else {
            return Ok(bookmarked);
        };
        if !snapshot.upload_state.is_confirmed() {
            self.sync_draft(&snapshot).await;
            return Ok(bookmarked);
        }

        if let Err(err) = self.api.set_bookmark(id, bookmarked).await {
            self.rollback(id, |entry| {
                if entry.is_bookmarked == bookmarked {
                    entry.is_bookmarked = previous;
                }
            })
            .await;
            self.signals.report_api_error("toggle_bookmark", &err);
            return Err(err.into());
        }
        Ok(bookmarked)
    }

    /// Replace the text of a text or url entry.
    #[instrument(name = "usecase.edit_content", skip_all, fields(entry_id = %id))]
    pub async fn edit_content(&self, id: &EntryId, content: String) -> Result<(), ActionError> {
        let (previous, snapshot) = {
            let mut history = self.history.lock().await;
            let entry = history
                .get(id)
                .ok_or_else(|| ActionError::NotFound(id.clone()))?;
            if !entry.content_type.is_textual() {
                return Err(ActionError::Unsupported {
                    id: id.clone(),
                    action: "editing",
                });
            }
            if entry.upload_state == UploadState::Uploading {
                return Err(ActionError::Busy(id.clone()));
            }
            let previous = (entry.content.clone(), entry.content_type);
            let new_type = ContentType::classify_text(&content);
            let new_content = content.clone();
            history.update(id, move |entry| {
                entry.content = Some(new_content);
                entry.content_type = new_type;
            });
            (previous, history.get(id).cloned())
        };
        self.signals.emit(EngineEvent::EntriesChanged);

        let Some(snapshot) = snapshot else {
            return Ok(());
        };
        if !snapshot.upload_state.is_confirmed() {
            self.sync_draft(&snapshot).await;
            return Ok(());
        }

        let result = self.api.update_content(id, &content).await;
        if let Err(err) = result {
            let (previous_content, previous_type) = previous;
            self.rollback(id, move |entry| {
                if entry.content.as_deref() == Some(content.as_str()) {
                    entry.content = previous_content;
                    entry.content_type = previous_type;
                }
            })
            .await;
            self.signals.report_api_error("edit_content", &err);
            return Err(err.into());
        }
        Ok(())
    }

    /// Delete an entry locally and on the server. A 404 counts as deleted.
    #[instrument(name = "usecase.delete_entry", skip_all, fields(entry_id = %id))]
    pub async fn delete(&self, id: &EntryId) -> Result<(), ActionError> {
        let removed = {
            let mut history = self.history.lock().await;
            let removed = history
                .remove(id)
                .ok_or_else(|| ActionError::NotFound(id.clone()))?;
            if self.tasks.cancel(id) {
                debug!("Cancelled background work for deleted entry");
            }
            removed
        };
        self.signals.emit(EngineEvent::EntriesChanged);

        if !removed.upload_state.is_confirmed() {
            if let Err(err) = self.drafts.remove(id).await {
                warn!(error = %err, "Failed to remove draft");
            }
            self.publish_draft_count().await;
            self.discard_image(&removed).await;
            info!("Deleted local-only entry");
            return Ok(());
        }

        match self.api.delete_item(id).await {
            Ok(()) | Err(ApiError::NotFound) => {
                self.discard_image(&removed).await;
                info!("Deleted entry");
                Ok(())
            }
            Err(err) => {
                self.history.lock().await.insert_if_absent(removed);
                self.signals.emit(EngineEvent::EntriesChanged);
                self.signals.report_api_error("delete", &err);
                Err(err.into())
            }
        }
    }

    /// Download the full-resolution image and switch the entry to it.
    #[instrument(name = "usecase.fetch_original", skip_all, fields(entry_id = %id))]
    pub async fn fetch_original(&self, id: &EntryId) -> Result<ImageRef, ActionError> {
        let entry = self.get(id).await?;
        if !entry.is_image() {
            return Err(ActionError::Unsupported {
                id: id.clone(),
                action: "original download",
            });
        }
        if entry.image_fidelity == ImageFidelity::Original {
            if let Some(image_ref) = entry.image_ref {
                return Ok(image_ref);
            }
        }
        if entry.original_deleted {
            return Err(ActionError::OriginalDeleted(id.clone()));
        }
        if !entry.upload_state.is_confirmed() {
            return Err(ActionError::Busy(id.clone()));
        }

        let ticket = self.tasks.register(id);
        let response = tokio::select! {
            biased;
            _ = ticket.token.cancelled() => None,
            response = self.api.fetch_original(id) => Some(response),
        };
        self.tasks.finish(&ticket);

        let bytes = match response {
            None => return Err(ActionError::Cancelled),
            Some(Ok(bytes)) => bytes,
            Some(Err(ApiError::NotFound)) => {
                self.history
                    .lock()
                    .await
                    .update(id, |entry| entry.original_deleted = true);
                self.signals.emit(EngineEvent::EntriesChanged);
                return Err(ActionError::OriginalDeleted(id.clone()));
            }
            Some(Err(err)) => {
                self.signals.report_api_error("fetch_original", &err);
                return Err(err.into());
            }
        };

        let image_ref = self
            .spool
            .store_original(id, &bytes)
            .await
            .map_err(|err| ActionError::Storage(err.to_string()))?;

        let applied = {
            let stored = image_ref.clone();
            self.history.lock().await.update(id, move |entry| {
                entry.image_ref = Some(stored);
                entry.image_fidelity = ImageFidelity::Original;
            })
        };
        if !applied {
            // Deleted while downloading.
            if let Err(err) = self.spool.discard(&image_ref).await {
                warn!(error = %err, "Failed to discard orphaned original");
            }
            return Err(ActionError::NotFound(id.clone()));
        }

        self.signals.emit(EngineEvent::EntriesChanged);
        info!(bytes = bytes.len(), "Cached original image");
        Ok(image_ref)
    }

    /// Write an entry back to the OS clipboard without re-capturing it.
    #[instrument(name = "usecase.copy_to_clipboard", skip_all, fields(entry_id = %id))]
    pub async fn copy_to_clipboard(&self, id: &EntryId) -> Result<(), ActionError> {
        let entry = self.get(id).await?;

        let image_bytes = match (&entry.content, &entry.image_ref) {
            (Some(_), _) if entry.content_type.is_textual() => None,
            (_, Some(image_ref)) => Some(
                self.spool
                    .read(image_ref)
                    .await
                    .map_err(|err| ActionError::Storage(err.to_string()))?,
            ),
            _ => {
                return Err(ActionError::Unsupported {
                    id: id.clone(),
                    action: "copying",
                })
            }
        };

        self.watcher.mark_self_write();
        let written = match (image_bytes, entry.content.as_deref()) {
            (Some(bytes), _) => self.clipboard.write_image(&bytes),
            (None, Some(text)) => self.clipboard.write_text(text),
            (None, None) => Ok(()),
        };
        written.map_err(|err| ActionError::Clipboard(err.to_string()))?;
        debug!("Copied entry to system clipboard");
        Ok(())
    }

    async fn get(&self, id: &EntryId) -> Result<ClipboardEntry, ActionError> {
        self.history
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ActionError::NotFound(id.clone()))
    }

    async fn rollback<F>(&self, id: &EntryId, undo: F)
    where
        F: FnOnce(&mut ClipboardEntry),
    {
        if self.history.lock().await.update(id, undo) {
            debug!(entry_id = %id, "Rolled back optimistic update");
            self.signals.emit(EngineEvent::EntriesChanged);
        }
    }

    /// Keep the persisted draft identical to the in-memory failed entry.
    async fn sync_draft(&self, entry: &ClipboardEntry) {
        if entry.upload_state != UploadState::Failed {
            return;
        }
        if let Err(err) = self.drafts.save(entry).await {
            warn!(entry_id = %entry.id, error = %err, "Failed to update draft");
        }
    }

    async fn discard_image(&self, entry: &ClipboardEntry) {
        if let Some(image_ref) = &entry.image_ref {
            if let Err(err) = self.spool.discard(image_ref).await {
                warn!(entry_id = %entry.id, error = %err, "Failed to discard image");
            }
        }
    }

    async fn publish_draft_count(&self) {
        match self.drafts.count().await {
            Ok(count) => self.signals.set_draft_count(count),
            Err(err) => warn!(error = %err, "Failed to count drafts"),
        }
    }
}
