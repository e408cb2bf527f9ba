//! Polling clipboard change source.
//!
//! Reads the clipboard on a fixed interval and reports every non-empty read.
//! Repeats are collapsed downstream by the capture deduplicator.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use cs_core::ports::{ClipboardChangeHandler, ClipboardChangeSourcePort, SystemClipboardPort};

const MIN_INTERVAL: Duration = Duration::from_millis(50);

struct Poller {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct PollingClipboardSource {
    clipboard: Arc<dyn SystemClipboardPort>,
    interval: Duration,
    poller: Mutex<Option<Poller>>,
}

impl PollingClipboardSource {
    pub fn new(clipboard: Arc<dyn SystemClipboardPort>, interval: Duration) -> Self {
        Self {
            clipboard,
            interval: interval.max(MIN_INTERVAL),
            poller: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

async fn poll_loop(
    clipboard: Arc<dyn SystemClipboardPort>,
    handler: Arc<dyn ClipboardChangeHandler>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let reader = clipboard.clone();
        let read = match tokio::task::spawn_blocking(move || reader.read()).await {
            Ok(read) => read,
            Err(e) => {
                warn!(error = %e, "Clipboard read task failed");
                continue;
            }
        };

        match read {
            Ok(Some(candidate)) => {
                if let Err(e) = handler.on_clipboard_changed(candidate).await {
                    warn!(error = %e, "Failed to handle clipboard change");
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "Clipboard poll read failed"),
        }
    }
}

#[async_trait]
impl ClipboardChangeSourcePort for PollingClipboardSource {
    async fn start(&self, handler: Arc<dyn ClipboardChangeHandler>) -> Result<()> {
        let mut poller = self.poller.lock().await;
        if poller.is_some() {
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.clipboard.clone(),
            handler,
            self.interval,
            cancel.clone(),
        ));
        info!(interval_ms = self.interval.as_millis() as u64, "Clipboard polling started");
        *poller = Some(Poller { cancel, task });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(poller) = self.poller.lock().await.take() else {
            return Ok(());
        };
        poller.cancel.cancel();
        if let Err(e) = poller.task.await {
            warn!(error = %e, "Clipboard polling task ended abnormally");
        }
        info!("Clipboard polling stopped");
        Ok(())
    }
}
