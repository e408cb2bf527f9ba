//! Clipboard change handler port
//!
//! The platform layer owns the notification source and calls back into the
//! engine; the engine implements the handler.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::clipboard::CaptureCandidate;

/// Callback handler for clipboard change events.
///
/// The candidate has already been read by the platform layer.
#[async_trait]
pub trait ClipboardChangeHandler: Send + Sync {
    async fn on_clipboard_changed(&self, candidate: CaptureCandidate) -> Result<()>;
}

/// A source of clipboard change notifications (OS events or polling).
///
/// `start` and `stop` should be idempotent.
/// `start` 与 `stop` 应当具备幂等性。
#[async_trait]
pub trait ClipboardChangeSourcePort: Send + Sync {
    async fn start(&self, handler: Arc<dyn ClipboardChangeHandler>) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clipboard_change_handler_is_object_safe() {
        fn _assert_object_safe(_handler: &dyn ClipboardChangeHandler) {}
        fn _assert_source_object_safe(_source: &dyn ClipboardChangeSourcePort) {}
    }
}
