use async_trait::async_trait;

use crate::clipboard::{CapturedImage, ImageRef};
use crate::ids::EntryId;

/// On-disk home for captured images and downloaded originals.
#[async_trait]
pub trait ImageSpoolPort: Send + Sync {
    /// Make a captured image durable and return the reference the entry keeps.
    async fn persist_capture(&self, id: &EntryId, image: &CapturedImage)
        -> anyhow::Result<ImageRef>;

    /// Store a downloaded original; returns `ImageRef::CachedOriginal`.
    async fn store_original(&self, id: &EntryId, bytes: &[u8]) -> anyhow::Result<ImageRef>;

    async fn read(&self, image: &ImageRef) -> anyhow::Result<Vec<u8>>;

    /// Delete files owned by the spool. References outside it are left alone.
    async fn discard(&self, image: &ImageRef) -> anyhow::Result<()>;
}
