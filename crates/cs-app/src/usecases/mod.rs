//! Engine use cases
//!
//! ```text
//! [ClipboardChangeSource]
//!         ↓
//! CaptureWatcher ──→ UploadPipeline ──→ (DraftStore on failure)
//!                          ↓
//!                    SharedHistory  ←── ReconciliationEngine ←── RealtimeSyncChannel
//!                          ↑
//!                    EntryActions / CategoryService
//! ```

pub mod capture_watcher;
pub mod categories;
pub mod entry_actions;
pub mod reconcile;
pub mod upload_pipeline;

pub use capture_watcher::{CaptureOutcome, CaptureWatcher, WatcherState};
pub use categories::CategoryService;
pub use entry_actions::{ActionError, EntryActions};
pub use reconcile::{FetchOutcome, PushOutcome, ReconciliationEngine};
pub use upload_pipeline::{RetryError, UploadPipeline, UploadResult};
