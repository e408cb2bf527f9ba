//! JSON file backed draft store.
//!
//! The whole draft set is one document rewritten atomically on every change.
//! 草稿集合保存为单个 JSON 文档，每次变更整体原子重写。

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, warn};

use cs_core::ports::DraftStorePort;
use cs_core::{ClipboardEntry, EntryId};

use crate::fs::atomic::{atomic_write, read_if_exists};

pub const DRAFTS_FILE: &str = "drafts.json";
const DOCUMENT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct DraftDocument {
    version: u32,
    drafts: Vec<ClipboardEntry>,
}

/// Older files are a bare array of entries.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDrafts {
    Document(DraftDocument),
    Bare(Vec<ClipboardEntry>),
}

pub struct JsonDraftStore {
    path: PathBuf,
    /// Single writer; held across every read-modify-write of the file.
    writer: Semaphore,
    /// Mirror of the last written set. `None` until first loaded from disk.
    mirror: RwLock<Option<Vec<ClipboardEntry>>>,
}

impl JsonDraftStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Semaphore::new(1),
            mirror: RwLock::new(None),
        }
    }

    /// Store rooted at `<data_dir>/drafts.json`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(DRAFTS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current set; must be called with the writer permit held.
    async fn current(&self) -> Vec<ClipboardEntry> {
        if let Some(drafts) = self.mirror.read().await.as_ref() {
            return drafts.clone();
        }
        let drafts = self.read_from_disk().await;
        *self.mirror.write().await = Some(drafts.clone());
        drafts
    }

    async fn read_from_disk(&self) -> Vec<ClipboardEntry> {
        let bytes = match read_if_exists(&self.path).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %err, "Failed to read drafts file, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_slice::<StoredDrafts>(&bytes) {
            Ok(StoredDrafts::Document(doc)) => doc.drafts,
            Ok(StoredDrafts::Bare(drafts)) => drafts,
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Drafts file is corrupt, moving it aside"
                );
                self.back_up_corrupt_file().await;
                Vec::new()
            }
        }
    }

    async fn back_up_corrupt_file(&self) {
        let backup = self.path.with_extension("json.corrupt");
        if let Err(err) = tokio::fs::rename(&self.path, &backup).await {
            warn!(error = %err, "Failed to back up corrupt drafts file");
        }
    }

    /// Write the set and update the mirror. Disk failures are logged; the
    /// mirror stays authoritative for the session.
    async fn commit(&self, drafts: Vec<ClipboardEntry>) {
        if let Err(err) = self.write_to_disk(&drafts).await {
            warn!(path = %self.path.display(), error = %err, "Failed to persist drafts");
        }
        *self.mirror.write().await = Some(drafts);
    }

    async fn write_to_disk(&self, drafts: &[ClipboardEntry]) -> Result<()> {
        let doc = DraftDocument {
            version: DOCUMENT_VERSION,
            drafts: drafts.to_vec(),
        };
        let content = serde_json::to_vec_pretty(&doc).context("serialize drafts failed")?;
        atomic_write(&self.path, &content).await
    }
}

#[async_trait]
impl DraftStorePort for JsonDraftStore {
    async fn save(&self, entry: &ClipboardEntry) -> Result<()> {
        let _permit = self
            .writer
            .acquire()
            .await
            .context("draft store writer lock closed")?;

        let mut drafts = self.current().await;
        match drafts.iter_mut().find(|d| d.id == entry.id) {
            Some(existing) => *existing = entry.clone(),
            None => drafts.push(entry.clone()),
        }
        debug!(entry_id = %entry.id, count = drafts.len(), "Draft saved");
        self.commit(drafts).await;
        Ok(())
    }

    async fn remove(&self, id: &EntryId) -> Result<()> {
        let _permit = self
            .writer
            .acquire()
            .await
            .context("draft store writer lock closed")?;

        let mut drafts = self.current().await;
        let before = drafts.len();
        drafts.retain(|d| &d.id != id);
        if drafts.len() == before {
            return Ok(());
        }
        debug!(entry_id = %id, count = drafts.len(), "Draft removed");
        self.commit(drafts).await;
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ClipboardEntry>> {
        if let Some(drafts) = self.mirror.read().await.as_ref() {
            return Ok(drafts.clone());
        }
        let _permit = self
            .writer
            .acquire()
            .await
            .context("draft store writer lock closed")?;
        Ok(self.current().await)
    }

    async fn count(&self) -> Result<usize> {
        if let Some(drafts) = self.mirror.read().await.as_ref() {
            return Ok(drafts.len());
        }
        Ok(self.load_all().await?.len())
    }
}
