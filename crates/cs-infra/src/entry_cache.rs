use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use cs_core::ports::EntryCachePort;
use cs_core::ClipboardEntry;

use crate::fs::atomic::{atomic_write, read_if_exists};

pub const ENTRIES_FILE: &str = "entries.json";

#[derive(Debug, Serialize, Deserialize)]
struct EntrySnapshot {
    saved_at: chrono::DateTime<chrono::Utc>,
    entries: Vec<ClipboardEntry>,
}

/// Last known entry list, rewritten whole after each unfiltered first page.
pub struct JsonEntryCache {
    path: PathBuf,
}

impl JsonEntryCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(ENTRIES_FILE))
    }
}

#[async_trait]
impl EntryCachePort for JsonEntryCache {
    async fn load(&self) -> Result<Vec<ClipboardEntry>> {
        let Some(bytes) = read_if_exists(&self.path).await? else {
            return Ok(Vec::new());
        };
        let snapshot: EntrySnapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse entry cache failed: {}", self.path.display()))?;
        debug!(count = snapshot.entries.len(), saved_at = %snapshot.saved_at, "Loaded entry cache");
        Ok(snapshot.entries)
    }

    async fn save(&self, entries: &[ClipboardEntry]) -> Result<()> {
        let snapshot = EntrySnapshot {
            saved_at: chrono::Utc::now(),
            entries: entries.to_vec(),
        };
        let content = serde_json::to_vec(&snapshot).context("serialize entry cache failed")?;
        atomic_write(&self.path, &content).await
    }
}
