use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::clipboard::{ClipboardEntry, ContentType, ImageFidelity, ImageRef, UploadState};
use crate::ids::{DeviceId, EntryId};

#[derive(Debug, Error)]
pub enum RemoteItemError {
    #[error("unknown content type `{0}`")]
    UnknownContentType(String),

    #[error("invalid image payload for item {id}: {source}")]
    BadImage {
        id: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("item {0} carries no content")]
    MissingContent(String),

    #[error("invalid timestamp `{0}`")]
    BadTimestamp(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl From<RawId> for EntryId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => EntryId::from(text),
            RawId::Number(n) => EntryId::from(n.to_string()),
        }
    }
}

/// Ids come back as JSON strings or numbers depending on the endpoint.
pub fn deserialize_flexible_id<'de, D>(deserializer: D) -> Result<EntryId, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(EntryId::from)
}

/// Item as returned by the list / create endpoints and `new_item` pushes.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteItem {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: EntryId,
    pub content_type: String,
    #[serde(default)]
    pub content: Option<String>,
    /// Base64 encoded thumbnail (or full image for small captures).
    #[serde(default, alias = "image_thumbnail", alias = "thumbnail")]
    pub image_data: Option<String>,
    pub created_at: String,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub original_deleted: bool,
}

impl RemoteItem {
    pub fn parse_created_at(raw: &str) -> Result<DateTime<Utc>, RemoteItemError> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .map_err(|_| RemoteItemError::BadTimestamp(raw.to_string()))
    }

    /// Convert into a confirmed local entry.
    pub fn into_entry(self) -> Result<ClipboardEntry, RemoteItemError> {
        let content_type = ContentType::from_wire(&self.content_type)
            .ok_or_else(|| RemoteItemError::UnknownContentType(self.content_type.clone()))?;
        let created_at = Self::parse_created_at(&self.created_at)?;

        let (content, image_ref, image_fidelity) = if content_type.is_textual() {
            let content = self
                .content
                .ok_or_else(|| RemoteItemError::MissingContent(self.id.to_string()))?;
            (Some(content), None, ImageFidelity::Unknown)
        } else {
            let encoded = self
                .image_data
                .ok_or_else(|| RemoteItemError::MissingContent(self.id.to_string()))?;
            let bytes = STANDARD
                .decode(strip_data_url(&encoded))
                .map_err(|source| RemoteItemError::BadImage {
                    id: self.id.to_string(),
                    source,
                })?;
            (None, Some(ImageRef::Remote { bytes }), ImageFidelity::Thumbnail)
        };

        Ok(ClipboardEntry {
            id: self.id,
            content_type,
            content,
            image_ref,
            created_at,
            is_bookmarked: self.is_bookmarked,
            upload_state: UploadState::Succeeded,
            image_fidelity,
            original_deleted: self.original_deleted,
            device_id: self.device_id.map(DeviceId::from),
        })
    }
}

fn strip_data_url(encoded: &str) -> &str {
    match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded.trim(),
    }
}

/// Partial update carried by `update_item` pushes. Absent fields stay `None`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RemotePatch {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: EntryId,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_content_type")]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub is_bookmarked: Option<bool>,
}

fn deserialize_optional_content_type<'de, D>(
    deserializer: D,
) -> Result<Option<ContentType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(ContentType::from_wire))
}
