//! # Configuration Data / 配置数据
//!
//! TOML → DTO mapping only. Environment overrides and path resolution live in
//! the bootstrap layer.
//! 仅负责 TOML → DTO 映射；环境变量覆盖与路径解析在 bootstrap 层完成。
mod app_config;

pub use app_config::{AppConfig, CaptureConfig, ServerConfig, StorageConfig, SyncConfig};
