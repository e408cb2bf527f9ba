//! Clipboard capture watcher
//! 剪贴板捕获监控器
//!
//! Reacts to clipboard change notifications from the platform layer, runs the
//! payload through the deduplicator and emits each accepted entry exactly once.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use cs_core::ports::{
    ClipboardChangeHandler, ClipboardChangeSourcePort, ClockPort, DeviceIdentityPort,
    ImageSpoolPort,
};
use cs_core::{CaptureCandidate, ClipboardEntry, DedupDecision, Deduplicator, EntryId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Stopped,
    Listening,
}

/// What happened to one clipboard notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Emitted(EntryId),
    Duplicate,
    SelfWrite,
    Empty,
    /// Notification arrived while stopped.
    Ignored,
    /// The payload could not be made durable (image spool failure).
    Dropped,
}

struct Inner {
    state: WatcherState,
    source: Option<Arc<dyn ClipboardChangeSourcePort>>,
}

pub struct CaptureWatcher {
    inner: tokio::sync::Mutex<Inner>,
    dedup: Mutex<Deduplicator>,
    clock: Arc<dyn ClockPort>,
    spool: Arc<dyn ImageSpoolPort>,
    device_identity: Arc<dyn DeviceIdentityPort>,
    captured_tx: mpsc::UnboundedSender<ClipboardEntry>,
}

impl CaptureWatcher {
    /// Returns the watcher and the stream of accepted entries.
    pub fn new(
        clock: Arc<dyn ClockPort>,
        spool: Arc<dyn ImageSpoolPort>,
        device_identity: Arc<dyn DeviceIdentityPort>,
        protection_window_ms: i64,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<ClipboardEntry>) {
        let (captured_tx, captured_rx) = mpsc::unbounded_channel();
        let watcher = Arc::new(Self {
            inner: tokio::sync::Mutex::new(Inner {
                state: WatcherState::Stopped,
                source: None,
            }),
            dedup: Mutex::new(Deduplicator::with_protection_window(protection_window_ms)),
            clock,
            spool,
            device_identity,
            captured_tx,
        });
        (watcher, captured_rx)
    }

    pub async fn state(&self) -> WatcherState {
        self.inner.lock().await.state
    }

    /// Subscribe to `source` and start listening. Idempotent.
    pub async fn start(self: &Arc<Self>, source: Arc<dyn ClipboardChangeSourcePort>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == WatcherState::Listening {
            debug!("Capture watcher already listening");
            return Ok(());
        }

        let handler: Arc<dyn ClipboardChangeHandler> = self.clone();
        source.start(handler).await?;
        inner.source = Some(source);
        inner.state = WatcherState::Listening;
        info!("Capture watcher listening");
        Ok(())
    }

    /// Unsubscribe and stop. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.state = WatcherState::Stopped;
        if let Some(source) = inner.source.take() {
            source.stop().await?;
            info!("Capture watcher stopped");
        }
        Ok(())
    }

    /// Arm the self-write window before the app writes to the clipboard.
    pub fn mark_self_write(&self) {
        let now = self.clock.now_ms();
        self.lock_dedup().mark_self_write(now);
    }

    pub async fn process(&self, candidate: CaptureCandidate) -> CaptureOutcome {
        if self.inner.lock().await.state != WatcherState::Listening {
            return CaptureOutcome::Ignored;
        }

        let now_ms = self.clock.now_ms();
        let decision = self.lock_dedup().evaluate(&candidate, now_ms);
        match decision {
            DedupDecision::Accept(signature) => {
                debug!(kind = candidate.kind(), %signature, "Clipboard capture accepted");
            }
            DedupDecision::Duplicate => return CaptureOutcome::Duplicate,
            DedupDecision::SelfWrite => {
                debug!("Ignoring clipboard change written by this app");
                return CaptureOutcome::SelfWrite;
            }
            DedupDecision::Empty => return CaptureOutcome::Empty,
        }

        let created_at = self.clock.now();
        let mut entry = match candidate {
            CaptureCandidate::Text(text) => ClipboardEntry::new_text(text, created_at),
            CaptureCandidate::Image(image) => {
                let id = EntryId::new();
                match self.spool.persist_capture(&id, &image).await {
                    Ok(image_ref) => ClipboardEntry::new_image(image_ref, created_at).with_id(id),
                    Err(err) => {
                        warn!(error = %err, "Failed to persist captured image, dropping capture");
                        return CaptureOutcome::Dropped;
                    }
                }
            }
        };
        entry.device_id = Some(self.device_identity.current_device_id());

        let id = entry.id.clone();
        if self.captured_tx.send(entry).is_err() {
            debug!(entry_id = %id, "No capture subscriber");
        }
        CaptureOutcome::Emitted(id)
    }

    fn lock_dedup(&self) -> std::sync::MutexGuard<'_, Deduplicator> {
        self.dedup.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ClipboardChangeHandler for CaptureWatcher {
    async fn on_clipboard_changed(&self, candidate: CaptureCandidate) -> Result<()> {
        self.process(candidate).await;
        Ok(())
    }
}
