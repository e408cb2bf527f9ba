use std::path::PathBuf;

/// Raw clipboard payload read from the OS, before it becomes an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureCandidate {
    Text(String),
    Image(CapturedImage),
}

/// Image payload as delivered by the platform reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedImage {
    /// Encoded (PNG) bytes held in memory.
    Bytes { bytes: Vec<u8> },
    /// An image that already lives on disk (e.g. a copied file).
    File {
        path: PathBuf,
        len: u64,
        modified_ms: i64,
    },
}

impl CaptureCandidate {
    pub fn is_empty(&self) -> bool {
        match self {
            CaptureCandidate::Text(text) => text.trim().is_empty(),
            CaptureCandidate::Image(CapturedImage::Bytes { bytes }) => bytes.is_empty(),
            CaptureCandidate::Image(CapturedImage::File { len, .. }) => *len == 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CaptureCandidate::Text(_) => "text",
            CaptureCandidate::Image(_) => "image",
        }
    }
}
