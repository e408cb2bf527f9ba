//! Clipboard domain models.
mod candidate;
mod content_type;
mod dedup;
mod entry;
mod image;
mod signature;

pub use candidate::{CaptureCandidate, CapturedImage};
pub use content_type::ContentType;
pub use dedup::{DedupDecision, Deduplicator, SELF_WRITE_PROTECTION_MS};
pub use entry::{ClipboardEntry, EntryError, UploadState};
pub use image::{ImageFidelity, ImageRef};
pub use signature::{fingerprint, Signature};
