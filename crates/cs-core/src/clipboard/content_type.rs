use serde::{Deserialize, Serialize};

/// Kind of payload a clipboard entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Url,
    Image,
}

impl ContentType {
    /// Literal used on the wire and inside capture signatures.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Url => "url",
            ContentType::Image => "image",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" | "text/plain" => Some(ContentType::Text),
            "url" | "link" => Some(ContentType::Url),
            "image" | "img" | "image/png" => Some(ContentType::Image),
            _ => None,
        }
    }

    /// Classify captured text as a url or plain text.
    pub fn classify_text(text: &str) -> Self {
        let trimmed = text.trim();
        let lower = trimmed.to_ascii_lowercase();
        let rest = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"));
        let has_host = matches!(rest, Some(rest) if !rest.is_empty());
        if has_host && !trimmed.chars().any(char::is_whitespace) {
            ContentType::Url
        } else {
            ContentType::Text
        }
    }

    pub fn is_textual(&self) -> bool {
        matches!(self, ContentType::Text | ContentType::Url)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_urls_without_whitespace() {
        assert_eq!(
            ContentType::classify_text("  https://example.com/a?b=c \n"),
            ContentType::Url
        );
        assert_eq!(
            ContentType::classify_text("see https://example.com"),
            ContentType::Text
        );
        assert_eq!(ContentType::classify_text("https://"), ContentType::Text);
        assert_eq!(ContentType::classify_text("hello"), ContentType::Text);
    }

    #[test]
    fn wire_names_round_trip() {
        for kind in [ContentType::Text, ContentType::Url, ContentType::Image] {
            assert_eq!(ContentType::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(ContentType::from_wire("video"), None);
    }
}
