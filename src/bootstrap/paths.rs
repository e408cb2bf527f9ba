use std::path::PathBuf;

use anyhow::Context;
use cs_core::config::StorageConfig;
use cs_core::ports::{AppDirs, AppDirsPort};
use cs_infra::drafts::DRAFTS_FILE;
use cs_infra::entry_cache::ENTRIES_FILE;

/// Concrete on-disk locations derived from the data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// Also the image spool root (`images/` lives under it).
    pub data_root: PathBuf,
    pub drafts_path: PathBuf,
    pub entries_path: PathBuf,
    /// Directory holding `device_id.txt`.
    pub device_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl AppPaths {
    pub fn from_app_dirs(dirs: &AppDirs) -> Self {
        Self::from_data_root(dirs.app_data_root.clone())
    }

    pub fn from_data_root(root: PathBuf) -> Self {
        Self {
            drafts_path: root.join(DRAFTS_FILE),
            entries_path: root.join(ENTRIES_FILE),
            device_dir: root.clone(),
            logs_dir: root.join("logs"),
            data_root: root,
        }
    }

    /// `[storage] data_dir` when set, otherwise the platform data-local dir.
    pub fn resolve(storage: &StorageConfig, dirs: &dyn AppDirsPort) -> anyhow::Result<Self> {
        match &storage.data_dir {
            Some(root) => Ok(Self::from_data_root(root.clone())),
            None => Ok(Self::from_app_dirs(&dirs.get_app_dirs()?)),
        }
    }

    pub fn ensure_dirs(&self) -> anyhow::Result<()> {
        for dir in [&self.data_root, &self.logs_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}
