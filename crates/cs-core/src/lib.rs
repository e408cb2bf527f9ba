//! # cs-core
//!
//! Core domain models and ports for the ClipSync synchronization engine.
//!
//! This crate contains pure business logic without any infrastructure dependencies.

pub mod clipboard;
pub mod config;
pub mod ids;
pub mod network;
pub mod ports;
pub mod remote;

// Re-export commonly used types at the crate root
pub use clipboard::{
    CaptureCandidate, CapturedImage, ClipboardEntry, ContentType, DedupDecision, Deduplicator,
    EntryError, ImageFidelity, ImageRef, Signature, UploadState,
};
pub use config::AppConfig;
pub use ids::{DeviceId, EntryId};
pub use network::{ChannelState, DisconnectReason, InboundMessage, OutboundMessage, PushEvent};
pub use remote::{
    Category, FetchQuery, ItemFilter, ItemPage, PageRequest, RemoteItem, RemotePatch, UploadBody,
    UploadRequest,
};
