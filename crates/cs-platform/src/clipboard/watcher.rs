//! Native clipboard change notifications.
//!
//! clipboard-rs runs its watch loop on a blocking thread; each notification
//! reads the clipboard there and hands the candidate to an async forwarder,
//! which calls the engine's handler.
//!
//! 原生剪贴板通知在阻塞线程中读取内容，再交给异步转发任务调用处理器。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clipboard_rs::{
    ClipboardHandler, ClipboardWatcher as RSClipboardWatcher, ClipboardWatcherContext,
    WatcherShutdown,
};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cs_core::ports::{ClipboardChangeHandler, ClipboardChangeSourcePort, SystemClipboardPort};
use cs_core::CaptureCandidate;

const WATCH_STOP_TIMEOUT: Duration = Duration::from_secs(2);

struct ChangeForwarder {
    clipboard: Arc<dyn SystemClipboardPort>,
    tx: mpsc::UnboundedSender<CaptureCandidate>,
}

impl ClipboardHandler for ChangeForwarder {
    fn on_clipboard_change(&mut self) {
        match self.clipboard.read() {
            Ok(Some(candidate)) => {
                if self.tx.send(candidate).is_err() {
                    debug!("Clipboard forwarder gone, dropping change");
                }
            }
            Ok(None) => debug!("Clipboard changed but holds nothing capturable"),
            Err(e) => debug!(error = %e, "Failed to read clipboard after change"),
        }
    }
}

struct Running {
    shutdown: WatcherShutdown,
    watch: JoinHandle<()>,
    forward: JoinHandle<()>,
}

pub struct NativeClipboardSource {
    clipboard: Arc<dyn SystemClipboardPort>,
    running: Mutex<Option<Running>>,
}

impl NativeClipboardSource {
    pub fn new(clipboard: Arc<dyn SystemClipboardPort>) -> Self {
        Self {
            clipboard,
            running: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ClipboardChangeSourcePort for NativeClipboardSource {
    async fn start(&self, handler: Arc<dyn ClipboardChangeHandler>) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Clipboard watcher already running, skipping start");
            return Ok(());
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<CaptureCandidate>();
        let mut watcher_ctx = ClipboardWatcherContext::new()
            .map_err(|e| anyhow!("Failed to create watcher context: {}", e))?;
        let shutdown = watcher_ctx
            .add_handler(ChangeForwarder {
                clipboard: self.clipboard.clone(),
                tx,
            })
            .get_shutdown_channel();

        let watch = tokio::task::spawn_blocking(move || {
            info!("start clipboard watch");
            watcher_ctx.start_watch();
            info!("clipboard watch stopped");
        });

        let forward = tokio::spawn(async move {
            while let Some(candidate) = rx.recv().await {
                if let Err(e) = handler.on_clipboard_changed(candidate).await {
                    warn!(error = %e, "Failed to handle clipboard change");
                }
            }
        });

        *running = Some(Running {
            shutdown,
            watch,
            forward,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };
        running.shutdown.stop();
        running.forward.abort();
        match tokio::time::timeout(WATCH_STOP_TIMEOUT, running.watch).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Clipboard watch thread ended abnormally"),
            Err(_) => warn!("Clipboard watch thread did not stop in time"),
        }
        Ok(())
    }
}
