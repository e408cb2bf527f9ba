//! ClipSync engine orchestration layer
//!
//! Capture, upload, realtime sync and reconciliation use cases wired
//! together by [`SyncEngine`].

pub mod deps;
pub mod engine;
pub mod events;
pub mod history;
pub mod realtime;
pub mod tasks;
pub mod usecases;

pub use deps::{EngineDeps, EngineSettings};
pub use engine::{EngineCommand, EngineError, EngineHandle, SyncEngine};
pub use events::{EngineEvent, EngineSignals, UploadOutcome};
pub use history::{EntryCollection, SharedHistory};
pub use realtime::{ChannelConfig, RealtimeSyncChannel};
