//! Port interfaces for the engine
//!
//! Ports define the contract between the engine logic (use cases) and the
//! infrastructure / platform implementations. Every adapter the engine talks
//! to sits behind one of these traits so tests can swap in fakes.
//!
//! 端口定义了引擎逻辑与基础设施 / 平台实现之间的契约。

pub mod app_dirs;
mod clipboard;
mod clipboard_api;
mod clipboard_change_handler;
mod clock;
pub mod device_identity;
mod drafts;
mod entry_cache;
pub mod errors;
mod image_spool;
mod realtime;

pub use app_dirs::{AppDirs, AppDirsPort};
pub use clipboard::SystemClipboardPort;
pub use clipboard_api::ClipboardApiPort;
pub use clipboard_change_handler::{ClipboardChangeHandler, ClipboardChangeSourcePort};
pub use clock::*;
pub use device_identity::DeviceIdentityPort;
pub use drafts::DraftStorePort;
pub use entry_cache::EntryCachePort;
pub use errors::{ApiError, AppDirsError, STORAGE_LIMIT_MARKER};
pub use image_spool::ImageSpoolPort;
pub use realtime::{RealtimeLink, RealtimeTransportPort, TransportFrame};
