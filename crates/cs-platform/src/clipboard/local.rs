use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::UNIX_EPOCH;

use anyhow::{anyhow, Result};
use clipboard_rs::common::RustImage;
use clipboard_rs::{Clipboard, ClipboardContext, ContentFormat, RustImageData};
use tracing::{debug, debug_span};

use cs_core::ports::SystemClipboardPort;
use cs_core::{CaptureCandidate, CapturedImage};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp", "tiff"];

fn map_clipboard_err<T>(
    result: std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>,
) -> Result<T> {
    result.map_err(|e| anyhow!(e))
}

/// System clipboard backed by clipboard-rs.
pub struct LocalClipboard {
    inner: Mutex<ClipboardContext>,
}

impl LocalClipboard {
    pub fn new() -> Result<Self> {
        let context = ClipboardContext::new()
            .map_err(|e| anyhow!("Failed to create clipboard context: {}", e))?;
        Ok(Self {
            inner: Mutex::new(context),
        })
    }

    fn with_ctx<T>(&self, f: impl FnOnce(&mut ClipboardContext) -> Result<T>) -> Result<T> {
        let mut ctx = self
            .inner
            .lock()
            .map_err(|_| anyhow!("clipboard context lock poisoned"))?;
        f(&mut ctx)
    }
}

/// Text first, then a copied image file, then raw image data.
fn read_candidate(ctx: &mut ClipboardContext) -> Result<Option<CaptureCandidate>> {
    if ctx.has(ContentFormat::Text) {
        if let Ok(text) = ctx.get_text() {
            if !text.trim().is_empty() {
                return Ok(Some(CaptureCandidate::Text(text)));
            }
        }
    }

    if ctx.has(ContentFormat::Files) {
        if let Ok(files) = ctx.get_files() {
            let image = files
                .iter()
                .filter_map(|uri| image_path_from_uri(uri))
                .find_map(|path| captured_file(&path));
            if let Some(image) = image {
                return Ok(Some(CaptureCandidate::Image(image)));
            }
        }
    }

    if ctx.has(ContentFormat::Image) {
        let image = map_clipboard_err(ctx.get_image())?;
        let png = map_clipboard_err(image.to_png())?;
        let bytes = png.get_bytes().to_vec();
        if !bytes.is_empty() {
            return Ok(Some(CaptureCandidate::Image(CapturedImage::Bytes { bytes })));
        }
    }

    Ok(None)
}

/// Clipboard file lists carry plain paths or `file://` URIs.
fn image_path_from_uri(uri: &str) -> Option<PathBuf> {
    let raw = uri.trim();
    let raw = raw.strip_prefix("file://").unwrap_or(raw);
    if raw.is_empty() {
        return None;
    }
    let path = PathBuf::from(raw);
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()).then_some(path)
}

fn captured_file(path: &Path) -> Option<CapturedImage> {
    let meta = std::fs::metadata(path).ok()?;
    if !meta.is_file() || meta.len() == 0 {
        return None;
    }
    let modified_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();
    Some(CapturedImage::File {
        path: path.to_path_buf(),
        len: meta.len(),
        modified_ms,
    })
}

impl SystemClipboardPort for LocalClipboard {
    fn read(&self) -> Result<Option<CaptureCandidate>> {
        let span = debug_span!("platform.read_clipboard");
        span.in_scope(|| {
            let candidate = self.with_ctx(read_candidate)?;
            if let Some(candidate) = &candidate {
                debug!(kind = candidate.kind(), "Read system clipboard");
            }
            Ok(candidate)
        })
    }

    fn write_text(&self, text: &str) -> Result<()> {
        self.with_ctx(|ctx| map_clipboard_err(ctx.set_text(text.to_string())))
    }

    fn write_image(&self, bytes: &[u8]) -> Result<()> {
        let image = RustImageData::from_bytes(bytes).map_err(|e| anyhow!(e))?;
        self.with_ctx(|ctx| map_clipboard_err(ctx.set_image(image)))
    }
}
