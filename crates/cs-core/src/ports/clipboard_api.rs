use async_trait::async_trait;

use crate::clipboard::ClipboardEntry;
use crate::ids::EntryId;
use crate::ports::errors::ApiError;
use crate::remote::{Category, ItemPage, PageRequest, UploadRequest};

/// The remote clipboard REST API.
///
/// Implementations convert server items into confirmed entries and drop
/// (with a log line) items that cannot be decoded.
#[async_trait]
pub trait ClipboardApiPort: Send + Sync {
    /// `GET /clipboard/items`
    async fn list_items(&self, request: &PageRequest) -> Result<ItemPage, ApiError>;

    /// `POST /clipboard/items`; `Err(ApiError::Conflict)` on 409.
    async fn create_item(&self, request: UploadRequest) -> Result<ClipboardEntry, ApiError>;

    /// `PATCH /clipboard/items/{id}/content`
    async fn update_content(&self, id: &EntryId, content: &str) -> Result<(), ApiError>;

    /// `PATCH /clipboard/items/{id}/bookmark`
    async fn set_bookmark(&self, id: &EntryId, bookmarked: bool) -> Result<(), ApiError>;

    /// `DELETE /clipboard/items/{id}`
    async fn delete_item(&self, id: &EntryId) -> Result<(), ApiError>;

    /// `GET /clipboard/items/{id}/original`
    async fn fetch_original(&self, id: &EntryId) -> Result<Vec<u8>, ApiError>;

    async fn list_categories(&self) -> Result<Vec<Category>, ApiError>;

    async fn create_category(&self, name: &str) -> Result<Category, ApiError>;

    async fn delete_category(&self, category_id: &str) -> Result<(), ApiError>;

    /// `POST /categories/{id}/items/{itemId}`
    async fn add_item_to_category(&self, category_id: &str, item_id: &EntryId)
        -> Result<(), ApiError>;
}
