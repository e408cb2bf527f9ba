mod local;
mod polling;
mod watcher;

pub use local::LocalClipboard;
pub use polling::PollingClipboardSource;
pub use watcher::NativeClipboardSource;
