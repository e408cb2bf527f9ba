//! Engine composition root
//! 引擎组合根
//!
//! Owns every component, funnels commands, push events and captures through a
//! single loop, and exposes a small cloneable [`EngineHandle`] to the host.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use cs_core::{ChannelState, ClipboardEntry, DeviceId, EntryId, ItemFilter, PushEvent};

use crate::deps::{EngineDeps, EngineSettings};
use crate::events::{EngineEvent, EngineSignals};
use crate::history::{shared_history, SharedHistory};
use crate::realtime::RealtimeSyncChannel;
use crate::tasks::EntryTasks;
use crate::usecases::{
    CaptureWatcher, CategoryService, EntryActions, PushOutcome, ReconciliationEngine,
    UploadPipeline,
};

/// Commands accepted by the engine loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    /// Start a new query context (search, category, bookmarks, or everything).
    Refresh(ItemFilter),
    LoadMore,
    Retry(EntryId),
    ToggleBookmark(EntryId),
    EditContent { id: EntryId, content: String },
    Delete(EntryId),
    FetchOriginal(EntryId),
    CopyToClipboard(EntryId),
    Reconnect,
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine is not running")]
    Closed,
}

/// Host-facing handle: command in, state out.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    reconcile: Arc<ReconciliationEngine>,
    signals: EngineSignals,
    channel_state: watch::Receiver<ChannelState>,
    categories: Arc<CategoryService>,
}

impl EngineHandle {
    pub async fn send(&self, command: EngineCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| EngineError::Closed)
    }

    /// Entries of the current view, newest first.
    pub async fn entries(&self) -> Vec<ClipboardEntry> {
        self.reconcile.visible_entries().await
    }

    pub fn draft_count(&self) -> usize {
        self.signals.draft_count()
    }

    pub fn channel_state(&self) -> ChannelState {
        *self.channel_state.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.signals.subscribe()
    }

    pub fn categories(&self) -> &CategoryService {
        &self.categories
    }
}

pub struct SyncEngine {
    settings: EngineSettings,
    device_id: DeviceId,
    change_source: Arc<dyn cs_core::ports::ClipboardChangeSourcePort>,
    history: SharedHistory,
    signals: EngineSignals,
    tasks: Arc<EntryTasks>,
    tracker: TaskTracker,
    watcher: Arc<CaptureWatcher>,
    pipeline: Arc<UploadPipeline>,
    reconcile: Arc<ReconciliationEngine>,
    actions: Arc<EntryActions>,
    channel: RealtimeSyncChannel,
    commands: mpsc::Receiver<EngineCommand>,
    captured: mpsc::UnboundedReceiver<ClipboardEntry>,
    pushed: mpsc::UnboundedReceiver<PushEvent>,
}

impl SyncEngine {
    pub fn new(deps: EngineDeps, settings: EngineSettings) -> (Self, EngineHandle) {
        let history = shared_history();
        let signals = EngineSignals::new();
        let tasks = Arc::new(EntryTasks::new());
        let tracker = TaskTracker::new();

        let (watcher, captured) = CaptureWatcher::new(
            deps.clock.clone(),
            deps.image_spool.clone(),
            deps.device_identity.clone(),
            settings.self_write_protection_ms,
        );
        let pipeline = Arc::new(UploadPipeline::new(
            deps.api.clone(),
            deps.drafts.clone(),
            deps.device_identity.clone(),
            history.clone(),
            tasks.clone(),
            signals.clone(),
            tracker.clone(),
        ));
        let reconcile = Arc::new(ReconciliationEngine::new(
            deps.api.clone(),
            deps.drafts.clone(),
            deps.entry_cache.clone(),
            history.clone(),
            tasks.clone(),
            signals.clone(),
            settings.page_size,
        ));
        let actions = Arc::new(EntryActions::new(
            deps.api.clone(),
            deps.drafts.clone(),
            deps.image_spool.clone(),
            deps.clipboard.clone(),
            watcher.clone(),
            history.clone(),
            tasks.clone(),
            signals.clone(),
        ));
        let categories = Arc::new(CategoryService::new(deps.api.clone(), signals.clone()));
        let (channel, pushed) = RealtimeSyncChannel::new(deps.transport.clone(), settings.channel);
        let (commands_tx, commands) = mpsc::channel(64);

        let handle = EngineHandle {
            commands: commands_tx,
            reconcile: reconcile.clone(),
            signals: signals.clone(),
            channel_state: channel.subscribe_state(),
            categories,
        };

        let engine = Self {
            device_id: deps.device_identity.current_device_id(),
            settings,
            change_source: deps.change_source,
            history,
            signals,
            tasks,
            tracker,
            watcher,
            pipeline,
            reconcile,
            actions,
            channel,
            commands,
            captured,
            pushed,
        };
        (engine, handle)
    }

    pub fn history(&self) -> SharedHistory {
        self.history.clone()
    }

    /// Run until `Shutdown` is received or every handle is dropped.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(device_id = %self.device_id, "Starting sync engine");

        self.pipeline.restore_drafts().await;

        if let Err(err) = self.watcher.start(self.change_source.clone()).await {
            error!(error = %err, "Failed to start clipboard watcher; capture disabled");
        }

        self.spawn_channel_observer();
        if self.settings.token.is_empty() {
            warn!("No server token configured; realtime channel stays offline");
        } else if let Err(err) = self
            .channel
            .connect(&self.settings.token, &self.device_id)
            .await
        {
            warn!(error = %err, "Initial realtime connect failed; retry scheduled");
        }

        self.spawn_refresh(ItemFilter::All);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(EngineCommand::Shutdown) | None => break,
                    Some(command) => self.dispatch(command),
                },
                Some(event) = self.pushed.recv() => {
                    if self.reconcile.apply_push_event(event).await == PushOutcome::ResyncRequested {
                        let filter = self.reconcile.current_filter();
                        self.spawn_refresh(filter);
                    }
                }
                Some(entry) = self.captured.recv() => self.on_captured(entry).await,
            }
        }

        self.shutdown().await
    }

    async fn on_captured(&self, entry: ClipboardEntry) {
        let id = entry.id.clone();
        let inserted = self.history.lock().await.insert_if_absent(entry.clone());
        if !inserted {
            return;
        }
        debug!(entry_id = %id, preview = %entry.preview(40), "Captured clipboard entry");
        self.signals.emit(EngineEvent::EntryCaptured { id });
        self.signals.emit(EngineEvent::EntriesChanged);
        self.pipeline.spawn_upload(entry);
    }

    fn dispatch(&self, command: EngineCommand) {
        debug!(?command, "Engine command");
        match command {
            EngineCommand::Refresh(filter) => self.spawn_refresh(filter),
            EngineCommand::LoadMore => {
                let reconcile = self.reconcile.clone();
                self.tracker.spawn(async move {
                    reconcile.load_next_page().await;
                });
            }
            EngineCommand::Retry(id) => {
                let pipeline = self.pipeline.clone();
                self.tracker.spawn(async move {
                    if let Err(err) = pipeline.retry(&id).await {
                        warn!(error = %err, "Retry rejected");
                    }
                });
            }
            EngineCommand::ToggleBookmark(id) => {
                let actions = self.actions.clone();
                self.tracker.spawn(async move {
                    if let Err(err) = actions.toggle_bookmark(&id).await {
                        warn!(entry_id = %id, error = %err, "Toggle bookmark failed");
                    }
                });
            }
            EngineCommand::EditContent { id, content } => {
                let actions = self.actions.clone();
                self.tracker.spawn(async move {
                    if let Err(err) = actions.edit_content(&id, content).await {
                        warn!(entry_id = %id, error = %err, "Edit failed");
                    }
                });
            }
            EngineCommand::Delete(id) => {
                let actions = self.actions.clone();
                self.tracker.spawn(async move {
                    if let Err(err) = actions.delete(&id).await {
                        warn!(entry_id = %id, error = %err, "Delete failed");
                    }
                });
            }
            EngineCommand::FetchOriginal(id) => {
                let actions = self.actions.clone();
                self.tracker.spawn(async move {
                    if let Err(err) = actions.fetch_original(&id).await {
                        warn!(entry_id = %id, error = %err, "Fetching original failed");
                    }
                });
            }
            EngineCommand::CopyToClipboard(id) => {
                let actions = self.actions.clone();
                self.tracker.spawn(async move {
                    if let Err(err) = actions.copy_to_clipboard(&id).await {
                        warn!(entry_id = %id, error = %err, "Copy to clipboard failed");
                    }
                });
            }
            EngineCommand::Reconnect => {
                let channel = self.channel.clone();
                self.tracker.spawn(async move {
                    if let Err(err) = channel.reconnect_now().await {
                        warn!(error = %err, "Manual reconnect failed");
                    }
                });
            }
            EngineCommand::Shutdown => {}
        }
    }

    fn spawn_refresh(&self, filter: ItemFilter) {
        let reconcile = self.reconcile.clone();
        self.tracker.spawn(async move {
            reconcile.refresh(filter).await;
        });
    }

    fn spawn_channel_observer(&self) {
        let mut state = self.channel.subscribe_state();
        let signals = self.signals.clone();
        // Not tracked: it ends when the channel is dropped.
        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                let current = *state.borrow_and_update();
                signals.emit(EngineEvent::ChannelStateChanged { state: current });
            }
        });
    }

    async fn shutdown(self) -> anyhow::Result<()> {
        info!("Shutting down sync engine");
        if let Err(err) = self.watcher.stop().await {
            warn!(error = %err, "Failed to stop clipboard watcher");
        }
        self.channel.stop();
        self.tasks.cancel_all();
        self.reconcile.cancel_in_flight();
        self.tracker.close();
        if tokio::time::timeout(self.settings.shutdown_grace, self.tracker.wait())
            .await
            .is_err()
        {
            warn!("Background tasks did not finish before shutdown grace period");
        }
        Ok(())
    }
}
