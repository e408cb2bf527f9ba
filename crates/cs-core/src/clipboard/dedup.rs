use super::{fingerprint, CaptureCandidate, Signature};

/// Default window after a copy-to-clipboard during which captures are ignored.
pub const SELF_WRITE_PROTECTION_MS: i64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupDecision {
    /// New content; the signature is now the last accepted one.
    Accept(Signature),
    /// Same signature as the last accepted capture.
    Duplicate,
    /// Captured inside the self-write protection window.
    SelfWrite,
    /// Nothing worth capturing (blank text, zero-length image).
    Empty,
}

impl DedupDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DedupDecision::Accept(_))
    }
}

/// Single-slot signature comparison plus the self-write guard.
///
/// Only the immediately preceding signature is remembered. An unrelated
/// capture in between two identical ones lets the second through; the
/// server reports that case as a conflict.
#[derive(Debug)]
pub struct Deduplicator {
    last_accepted: Option<Signature>,
    protected_until_ms: Option<i64>,
    window_ms: i64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::with_protection_window(SELF_WRITE_PROTECTION_MS)
    }

    pub fn with_protection_window(window_ms: i64) -> Self {
        Self {
            last_accepted: None,
            protected_until_ms: None,
            window_ms: window_ms.max(0),
        }
    }

    /// Arm the protection window; called right before the app writes to the clipboard.
    pub fn mark_self_write(&mut self, now_ms: i64) {
        self.protected_until_ms = Some(now_ms + self.window_ms);
    }

    pub fn last_accepted(&self) -> Option<&Signature> {
        self.last_accepted.as_ref()
    }

    pub fn evaluate(&mut self, candidate: &CaptureCandidate, now_ms: i64) -> DedupDecision {
        let Some(signature) = fingerprint(candidate) else {
            return DedupDecision::Empty;
        };

        if let Some(until) = self.protected_until_ms {
            if now_ms <= until {
                // The app's own write still occupies the slot so a later
                // poll of the same content is not re-ingested.
                self.last_accepted = Some(signature);
                return DedupDecision::SelfWrite;
            }
            self.protected_until_ms = None;
        }

        if self.last_accepted.as_ref() == Some(&signature) {
            return DedupDecision::Duplicate;
        }

        self.last_accepted = Some(signature.clone());
        DedupDecision::Accept(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CaptureCandidate {
        CaptureCandidate::Text(s.to_string())
    }

    #[test]
    fn consecutive_identical_text_is_accepted_once() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.evaluate(&text("hello"), 0).is_accepted());
        assert_eq!(dedup.evaluate(&text(" hello "), 1), DedupDecision::Duplicate);
    }

    #[test]
    fn interleaved_capture_lets_repeat_through() {
        let mut dedup = Deduplicator::new();
        assert!(dedup.evaluate(&text("a"), 0).is_accepted());
        assert!(dedup.evaluate(&text("b"), 1).is_accepted());
        assert!(dedup.evaluate(&text("a"), 2).is_accepted());
    }

    #[test]
    fn self_write_window_suppresses_and_expires() {
        let mut dedup = Deduplicator::new();
        dedup.mark_self_write(10_000);

        assert_eq!(dedup.evaluate(&text("copied"), 10_500), DedupDecision::SelfWrite);
        // same content after the window is still the last slot
        assert_eq!(dedup.evaluate(&text("copied"), 12_000), DedupDecision::Duplicate);
        assert!(dedup.evaluate(&text("fresh"), 12_001).is_accepted());
    }

    #[test]
    fn blank_text_is_empty() {
        let mut dedup = Deduplicator::new();
        assert_eq!(dedup.evaluate(&text("  "), 0), DedupDecision::Empty);
        assert!(dedup.last_accepted().is_none());
    }
}
