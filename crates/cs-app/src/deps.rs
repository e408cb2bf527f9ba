//! # Engine Dependencies / 引擎依赖
//!
//! Parameter grouping for [`SyncEngine`](crate::SyncEngine) construction.
//! 仅用于参数打包。
//!
//! **Note / 注意**: This is NOT a Builder pattern. Every port is required.

use std::sync::Arc;
use std::time::Duration;

use cs_core::ports::*;
use cs_core::AppConfig;

use crate::realtime::ChannelConfig;

/// Engine dependency grouping (non-Builder, just parameter grouping)
/// 引擎依赖分组（非 Builder，仅参数打包）
pub struct EngineDeps {
    // Remote / 远端
    pub api: Arc<dyn ClipboardApiPort>,
    pub transport: Arc<dyn RealtimeTransportPort>,

    // Local persistence / 本地持久化
    pub drafts: Arc<dyn DraftStorePort>,
    pub entry_cache: Arc<dyn EntryCachePort>,
    pub image_spool: Arc<dyn ImageSpoolPort>,

    // Platform / 平台
    pub clipboard: Arc<dyn SystemClipboardPort>,
    pub change_source: Arc<dyn ClipboardChangeSourcePort>,

    // System / 系统
    pub device_identity: Arc<dyn DeviceIdentityPort>,
    pub clock: Arc<dyn ClockPort>,
}

/// Engine tunables derived from [`AppConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Bearer token; empty keeps the realtime channel offline.
    pub token: String,
    pub page_size: u32,
    pub channel: ChannelConfig,
    pub self_write_protection_ms: i64,
    /// How long shutdown waits for background tasks.
    pub shutdown_grace: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            token: config.server.token.clone(),
            page_size: config.sync.page_size,
            channel: ChannelConfig::from(&config.sync),
            self_write_protection_ms: config.capture.self_write_protection_ms,
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config_defaults() {
        let settings = EngineSettings::from_config(&AppConfig::default());
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.channel.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(settings.channel.pong_timeout, Duration::from_secs(10));
        assert_eq!(settings.channel.reconnect_delay, Duration::from_secs(5));
        assert_eq!(settings.self_write_protection_ms, 1000);
        assert!(settings.token.is_empty());
    }
}
