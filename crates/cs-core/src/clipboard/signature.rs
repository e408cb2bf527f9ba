use serde::{Deserialize, Serialize};

use super::{CaptureCandidate, CapturedImage, ContentType};

/// Size of the head/tail windows hashed for in-memory image payloads.
const IMAGE_SAMPLE_BYTES: usize = 64 * 1024;

/// Stable fingerprint of a clipboard payload.
///
/// 同一次粘贴触发的多次系统通知必须得到相同的签名。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the signature of a candidate. Returns `None` for blank payloads.
pub fn fingerprint(candidate: &CaptureCandidate) -> Option<Signature> {
    if candidate.is_empty() {
        return None;
    }

    let signature = match candidate {
        CaptureCandidate::Text(text) => {
            let trimmed = text.trim();
            let content_type = ContentType::classify_text(trimmed);
            let digest = blake3::hash(trimmed.as_bytes());
            format!("{}:{}", content_type.as_str(), digest.to_hex())
        }
        CaptureCandidate::Image(CapturedImage::Bytes { bytes }) => {
            let mut hasher = blake3::Hasher::new();
            let head = &bytes[..bytes.len().min(IMAGE_SAMPLE_BYTES)];
            hasher.update(head);
            if bytes.len() > IMAGE_SAMPLE_BYTES {
                let tail_start = bytes.len().saturating_sub(IMAGE_SAMPLE_BYTES);
                hasher.update(&bytes[tail_start..]);
            }
            format!("image:{}:{}", bytes.len(), hex::encode(&hasher.finalize().as_bytes()[..16]))
        }
        CaptureCandidate::Image(CapturedImage::File {
            len, modified_ms, ..
        }) => format!("image:file:{}:{}", len, modified_ms),
    };

    Some(Signature(signature))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn text_signature_ignores_surrounding_whitespace() {
        let a = fingerprint(&CaptureCandidate::Text("hello".into()));
        let b = fingerprint(&CaptureCandidate::Text("  hello\n".into()));
        assert!(a.is_some());
        assert_eq!(a, b);
        assert!(a.unwrap().as_str().starts_with("text:"));
    }

    #[test]
    fn url_and_text_signatures_carry_type() {
        let url = fingerprint(&CaptureCandidate::Text("https://example.com".into())).unwrap();
        assert!(url.as_str().starts_with("url:"));
    }

    #[test]
    fn blank_text_has_no_signature() {
        assert!(fingerprint(&CaptureCandidate::Text("   \n".into())).is_none());
    }

    #[test]
    fn file_signature_ignores_path() {
        let a = CaptureCandidate::Image(CapturedImage::File {
            path: PathBuf::from("/tmp/a.png"),
            len: 10,
            modified_ms: 5,
        });
        let b = CaptureCandidate::Image(CapturedImage::File {
            path: PathBuf::from("/tmp/other-handle.png"),
            len: 10,
            modified_ms: 5,
        });
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn large_image_bytes_differ_in_tail() {
        let mut a = vec![7u8; IMAGE_SAMPLE_BYTES * 3];
        let b = a.clone();
        if let Some(last) = a.last_mut() {
            *last = 8;
        }
        let sig_a = fingerprint(&CaptureCandidate::Image(CapturedImage::Bytes { bytes: a }));
        let sig_b = fingerprint(&CaptureCandidate::Image(CapturedImage::Bytes { bytes: b }));
        assert_ne!(sig_a, sig_b);
    }
}
