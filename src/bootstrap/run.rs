//! Host loop: relays engine events to the log until Ctrl-C.

use anyhow::Context;
use tokio::select;
use tokio::signal::ctrl_c;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use cs_app::{EngineCommand, EngineEvent, EngineHandle, SyncEngine, UploadOutcome};

/// Run the engine until Ctrl-C, then shut it down and wait for it.
pub async fn run_until_shutdown(engine: SyncEngine, handle: EngineHandle) -> anyhow::Result<()> {
    let mut events = handle.subscribe();
    let mut running = tokio::spawn(engine.run());

    loop {
        select! {
            _ = ctrl_c() => {
                info!("收到 Ctrl+C，正在停止...");
                break;
            }
            finished = &mut running => {
                // Engine stopped on its own; nothing left to shut down.
                return finished.context("Sync engine task failed")?;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&handle, &event),
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "Event log lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    if handle.send(EngineCommand::Shutdown).await.is_err() {
        debug!("Engine already stopped");
    }
    running.await.context("Sync engine task failed")??;
    info!("剪贴板同步已停止");
    Ok(())
}

fn log_event(handle: &EngineHandle, event: &EngineEvent) {
    match event {
        EngineEvent::EntriesChanged => {}
        EngineEvent::EntryCaptured { id } => info!(entry_id = %id, "Captured clipboard entry"),
        EngineEvent::UploadFinished { id, outcome } => match outcome {
            UploadOutcome::Failed => warn!(
                entry_id = %id,
                drafts = handle.draft_count(),
                "Upload failed, kept as draft"
            ),
            other => info!(entry_id = %id, outcome = ?other, "Upload finished"),
        },
        EngineEvent::AuthExpired => {
            warn!("Server rejected the token; update CLIPSYNC_TOKEN and restart")
        }
        EngineEvent::StorageLimitReached => warn!("Server storage limit reached"),
        EngineEvent::ChannelStateChanged { state } => info!(?state, "Realtime channel"),
    }
}
