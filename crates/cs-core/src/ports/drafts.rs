use async_trait::async_trait;

use crate::clipboard::ClipboardEntry;
use crate::ids::EntryId;

/// Durable store of entries whose upload failed.
///
/// Keyed by entry id. `load_all` returns entries in insertion order and is
/// idempotent absent mutation.
#[async_trait]
pub trait DraftStorePort: Send + Sync {
    /// Upsert; replaces any record with the same id.
    async fn save(&self, entry: &ClipboardEntry) -> anyhow::Result<()>;

    /// Remove by id. Removing an unknown id is not an error.
    async fn remove(&self, id: &EntryId) -> anyhow::Result<()>;

    async fn load_all(&self) -> anyhow::Result<Vec<ClipboardEntry>>;

    async fn count(&self) -> anyhow::Result<usize> {
        Ok(self.load_all().await?.len())
    }
}
