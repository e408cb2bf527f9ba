use async_trait::async_trait;

use crate::clipboard::ClipboardEntry;

/// Last known snapshot of the entry collection, used when the first page
/// cannot be fetched.
#[async_trait]
pub trait EntryCachePort: Send + Sync {
    async fn load(&self) -> anyhow::Result<Vec<ClipboardEntry>>;

    async fn save(&self, entries: &[ClipboardEntry]) -> anyhow::Result<()>;
}
