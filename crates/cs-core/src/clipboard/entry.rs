use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{ContentType, ImageFidelity, ImageRef};
use crate::ids::{DeviceId, EntryId};
use crate::remote::RemotePatch;

/// Upload lifecycle of an entry.
///
/// `Failed` entries are always mirrored in the draft store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    #[default]
    Idle,
    Uploading,
    Failed,
    Succeeded,
}

impl UploadState {
    /// Whether the entry is known to exist on the server.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, UploadState::Succeeded)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("{0} entry has no text content")]
    MissingContent(ContentType),

    #[error("image entry has no image reference")]
    MissingImage,

    #[error("{0} entry carries both text content and an image reference")]
    ConflictingPayload(ContentType),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipboardEntry {
    pub id: EntryId,
    pub content_type: ContentType,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_ref: Option<ImageRef>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_bookmarked: bool,
    #[serde(default)]
    pub upload_state: UploadState,
    #[serde(default)]
    pub image_fidelity: ImageFidelity,
    #[serde(default)]
    pub original_deleted: bool,
    /// Device that produced the entry, when known.
    #[serde(default)]
    pub device_id: Option<DeviceId>,
}

impl ClipboardEntry {
    /// Build a locally captured text (or url) entry.
    pub fn new_text(content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        let content = content.into();
        Self {
            id: EntryId::new(),
            content_type: ContentType::classify_text(&content),
            content: Some(content),
            image_ref: None,
            created_at,
            is_bookmarked: false,
            upload_state: UploadState::Idle,
            image_fidelity: ImageFidelity::Unknown,
            original_deleted: false,
            device_id: None,
        }
    }

    /// Build a locally captured image entry.
    pub fn new_image(image_ref: ImageRef, created_at: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::new(),
            content_type: ContentType::Image,
            content: None,
            image_ref: Some(image_ref),
            created_at,
            is_bookmarked: false,
            upload_state: UploadState::Idle,
            image_fidelity: ImageFidelity::Original,
            original_deleted: false,
            device_id: None,
        }
    }

    pub fn with_id(mut self, id: EntryId) -> Self {
        self.id = id;
        self
    }

    pub fn is_image(&self) -> bool {
        self.content_type == ContentType::Image
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }

    /// Check that exactly one payload is populated for the content type.
    pub fn validate(&self) -> Result<(), EntryError> {
        match self.content_type {
            ContentType::Text | ContentType::Url => {
                if self.image_ref.is_some() {
                    return Err(EntryError::ConflictingPayload(self.content_type));
                }
                if self.content.is_none() {
                    return Err(EntryError::MissingContent(self.content_type));
                }
                Ok(())
            }
            ContentType::Image => {
                if self.content.is_some() {
                    return Err(EntryError::ConflictingPayload(self.content_type));
                }
                if self.image_ref.is_none() {
                    return Err(EntryError::MissingImage);
                }
                Ok(())
            }
        }
    }

    /// Short single-line preview used in logs.
    pub fn preview(&self, max_chars: usize) -> String {
        match (&self.content, self.content_type) {
            (Some(text), _) => {
                let line = text.trim().lines().next().unwrap_or_default();
                line.chars().take(max_chars).collect()
            }
            (None, ContentType::Image) => "[image]".to_string(),
            (None, _) => String::new(),
        }
    }

    /// Overwrite the remote-authoritative fields with the server's copy.
    ///
    /// A locally cached original is kept over an inline thumbnail so the
    /// fidelity never drops on refresh.
    pub fn merge_remote(&mut self, remote: ClipboardEntry) {
        self.content_type = remote.content_type;
        self.created_at = remote.created_at;
        self.is_bookmarked = remote.is_bookmarked;
        self.original_deleted = remote.original_deleted;
        self.upload_state = UploadState::Succeeded;
        if remote.device_id.is_some() {
            self.device_id = remote.device_id;
        }

        if remote.content_type.is_textual() {
            self.content = remote.content;
            self.image_ref = None;
            return;
        }

        self.content = None;
        let keep_original = self.image_fidelity == ImageFidelity::Original
            && matches!(
                self.image_ref,
                Some(ImageRef::CachedOriginal { .. }) | Some(ImageRef::LocalFile { .. })
            );
        if !keep_original && remote.image_ref.is_some() {
            self.image_ref = remote.image_ref;
            self.image_fidelity = remote.image_fidelity;
        }
    }

    /// Apply a partial update; absent fields leave local state untouched.
    pub fn apply_patch(&mut self, patch: &RemotePatch) {
        if let Some(content) = &patch.content {
            if self.content_type.is_textual() {
                self.content = Some(content.clone());
            }
        }
        if let Some(content_type) = patch.content_type {
            if content_type.is_textual() && self.content_type.is_textual() {
                self.content_type = content_type;
            }
        }
        if let Some(bookmarked) = patch.is_bookmarked {
            self.is_bookmarked = bookmarked;
        }
    }
}
