//! Composition of the concrete adapters into a [`SyncEngine`].
//! 将具体适配器组装为同步引擎。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use cs_app::{EngineDeps, EngineHandle, EngineSettings, SyncEngine};
use cs_core::config::CaptureConfig;
use cs_core::ports::{ClipboardChangeSourcePort, SystemClipboardPort};
use cs_core::AppConfig;
use cs_infra::{
    FsImageSpool, HttpClipboardApi, JsonDraftStore, JsonEntryCache, LocalDeviceIdentity,
    SystemClock, WsRealtimeTransport,
};
use cs_platform::{LocalClipboard, NativeClipboardSource, PollingClipboardSource};

use super::paths::AppPaths;

/// How clipboard changes are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Native,
    Polling(Duration),
}

impl CaptureMode {
    pub fn from_config(capture: &CaptureConfig) -> Self {
        match capture.poll_interval_ms {
            Some(ms) => CaptureMode::Polling(Duration::from_millis(ms)),
            None => CaptureMode::Native,
        }
    }
}

fn change_source(
    mode: CaptureMode,
    clipboard: Arc<dyn SystemClipboardPort>,
) -> Arc<dyn ClipboardChangeSourcePort> {
    match mode {
        CaptureMode::Native => Arc::new(NativeClipboardSource::new(clipboard)),
        CaptureMode::Polling(interval) => Arc::new(PollingClipboardSource::new(clipboard, interval)),
    }
}

/// Build the engine and its host handle from configuration.
pub fn build_engine(
    config: &AppConfig,
    paths: &AppPaths,
) -> anyhow::Result<(SyncEngine, EngineHandle)> {
    let api = Arc::new(
        HttpClipboardApi::from_config(&config.server).context("Failed to build HTTP client")?,
    );
    let transport = Arc::new(WsRealtimeTransport::from_config(&config.server));

    let device_identity = Arc::new(
        LocalDeviceIdentity::load_or_create(paths.device_dir.clone())
            .context("Failed to load device identity")?,
    );

    let clipboard: Arc<dyn SystemClipboardPort> =
        Arc::new(LocalClipboard::new().context("Failed to open system clipboard")?);
    let mode = CaptureMode::from_config(&config.capture);
    info!(?mode, data_root = %paths.data_root.display(), "Wiring sync engine");

    let deps = EngineDeps {
        api,
        transport,
        drafts: Arc::new(JsonDraftStore::new(paths.drafts_path.clone())),
        entry_cache: Arc::new(JsonEntryCache::new(paths.entries_path.clone())),
        image_spool: Arc::new(FsImageSpool::new(paths.data_root.clone())),
        change_source: change_source(mode, clipboard.clone()),
        clipboard,
        device_identity,
        clock: Arc::new(SystemClock),
    };

    Ok(SyncEngine::new(deps, EngineSettings::from_config(config)))
}
