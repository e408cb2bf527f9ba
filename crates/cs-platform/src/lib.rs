//! # cs-platform
//!
//! OS integration for the ClipSync engine: system clipboard access, clipboard
//! change sources (native notifications or polling) and data directories.

pub mod app_dirs;
pub mod clipboard;

pub use app_dirs::DirsAppDirsAdapter;
pub use clipboard::{LocalClipboard, NativeClipboardSource, PollingClipboardSource};
