use anyhow::Result;

use crate::clipboard::CaptureCandidate;

/// System clipboard access.
///
/// Reads prefer text; an image is returned only when no text is present.
/// `Ok(None)` means the clipboard holds nothing capturable.
pub trait SystemClipboardPort: Send + Sync {
    fn read(&self) -> Result<Option<CaptureCandidate>>;

    fn write_text(&self, text: &str) -> Result<()>;

    /// Write encoded image bytes (PNG).
    fn write_image(&self, bytes: &[u8]) -> Result<()>;
}
