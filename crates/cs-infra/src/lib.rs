//! # cs-infra
//!
//! Infrastructure adapters for the ClipSync engine: JSON persistence, the
//! image spool, the REST client and the websocket transport.

pub mod device;
pub mod drafts;
pub mod entry_cache;
pub mod fs;
pub mod http;
pub mod realtime;
pub mod time;

pub use device::LocalDeviceIdentity;
pub use drafts::JsonDraftStore;
pub use entry_cache::JsonEntryCache;
pub use fs::FsImageSpool;
pub use http::HttpClipboardApi;
pub use realtime::WsRealtimeTransport;
pub use time::SystemClock;
