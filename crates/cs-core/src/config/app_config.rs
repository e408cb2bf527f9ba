//! Application configuration domain model

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application configuration
/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
}

/// Remote service endpoints and credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// REST base url, e.g. `https://clip.example.com/api`
    pub api_base_url: String,
    /// WebSocket base url; `{token}/{device_id}` is appended
    pub ws_base_url: String,
    /// Bearer token (may be empty - the engine then stays offline)
    pub token: String,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/api".to_string(),
            ws_base_url: "ws://127.0.0.1:8000/ws".to_string(),
            token: String::new(),
            request_timeout_secs: 10,
        }
    }
}

/// Realtime channel and paging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub heartbeat_interval_secs: u64,
    pub pong_timeout_secs: u64,
    pub reconnect_delay_secs: u64,
    pub page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 30,
            pong_timeout_secs: 10,
            reconnect_delay_secs: 5,
            page_size: 50,
        }
    }
}

/// Clipboard capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Poll interval; `None` uses native OS change notifications
    /// 轮询间隔；为空时使用系统剪贴板变更通知
    pub poll_interval_ms: Option<u64>,
    pub self_write_protection_ms: i64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: None,
            self_write_protection_ms: crate::clipboard::SELF_WRITE_PROTECTION_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory override; `None` means the platform data-local dir
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Create AppConfig from TOML value
    /// 从 TOML 值创建 AppConfig
    ///
    /// Missing sections and keys fall back to their defaults.
    pub fn from_toml(toml_value: &toml::Value) -> anyhow::Result<Self> {
        Ok(toml_value.clone().try_into()?)
    }
}
