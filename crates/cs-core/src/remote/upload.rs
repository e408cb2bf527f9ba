use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::clipboard::{ClipboardEntry, ContentType, ImageRef};
use crate::ids::DeviceId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadBody {
    Text(String),
    ImageFile(PathBuf),
    ImageBytes(Vec<u8>),
}

/// Everything `POST /clipboard/items` needs for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub content_type: ContentType,
    pub device_id: DeviceId,
    pub created_at: DateTime<Utc>,
    pub body: UploadBody,
}

impl UploadRequest {
    /// Returns `None` when the entry has no uploadable payload.
    pub fn from_entry(entry: &ClipboardEntry, device_id: &DeviceId) -> Option<Self> {
        let body = match (&entry.content, &entry.image_ref) {
            (Some(text), _) if entry.content_type.is_textual() => UploadBody::Text(text.clone()),
            (_, Some(ImageRef::LocalFile { path })) | (_, Some(ImageRef::CachedOriginal { path })) => {
                UploadBody::ImageFile(path.clone())
            }
            (_, Some(ImageRef::Remote { bytes })) => UploadBody::ImageBytes(bytes.clone()),
            _ => return None,
        };

        Some(Self {
            content_type: entry.content_type,
            device_id: device_id.clone(),
            created_at: entry.created_at,
            body,
        })
    }

    pub fn created_at_rfc3339(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}
