//! # Configuration Loader / 配置加载器
//!
//! ## Responsibilities / 职责
//!
//! - Read the TOML configuration file / 读取 TOML 配置文件
//! - Apply environment overrides (`.env` is loaded by `main`) / 应用环境变量覆盖
//! - Report I/O and parsing errors with context / 报告带上下文的 I/O 和解析错误
//!
//! Defaults live in the `AppConfig` DTO, not here.

use std::path::{Path, PathBuf};

use anyhow::Context;
use cs_core::ports::AppDirsPort;
use cs_core::AppConfig;
use cs_platform::DirsAppDirsAdapter;
use tracing::info;

pub const CONFIG_FILE: &str = "config.toml";

pub const API_URL_ENV: &str = "CLIPSYNC_API_URL";
pub const WS_URL_ENV: &str = "CLIPSYNC_WS_URL";
pub const TOKEN_ENV: &str = "CLIPSYNC_TOKEN";

/// Load configuration from a TOML file
/// 从 TOML 文件加载配置
///
/// # Errors / 错误
///
/// Returns error if the file cannot be read or is not a valid config.
/// 无法读取文件或内容不是有效配置时返回错误。
pub fn load_config(config_path: PathBuf) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let toml_value: toml::Value =
        toml::from_str(&content).context("Failed to parse config as TOML")?;
    AppConfig::from_toml(&toml_value)
        .with_context(|| format!("Invalid config file: {}", config_path.display()))
}

/// Resolve and load the configuration for this run.
///
/// An explicit path must exist. The default `<data_root>/config.toml` is
/// optional; without it every section takes its defaults.
pub fn resolve_config(explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config(path.to_path_buf());
    }

    let app_dirs = DirsAppDirsAdapter::new().get_app_dirs()?;
    let default_path = app_dirs.app_data_root.join(CONFIG_FILE);
    if default_path.exists() {
        load_config(default_path)
    } else {
        info!(path = %default_path.display(), "No config file, using defaults");
        Ok(AppConfig::default())
    }
}

/// Override server settings from the environment.
///
/// `lookup` is `std::env::var(..).ok()` in production. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(url) = read(API_URL_ENV) {
        config.server.api_base_url = url;
    }
    if let Some(url) = read(WS_URL_ENV) {
        config.server.ws_base_url = url;
    }
    if let Some(token) = read(TOKEN_ENV) {
        config.server.token = token.trim().to_string();
    }
}
