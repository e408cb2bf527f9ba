//! File I/O for the persisted device id.

use anyhow::{Context, Result};
use std::path::Path;

use cs_core::DeviceId;

pub(crate) const DEVICE_ID_FILE: &str = "device_id.txt";

/// Load device ID from disk, returning None if the file doesn't exist or is blank.
pub(crate) fn load_from_disk(config_dir: &Path) -> Result<Option<DeviceId>> {
    let path = config_dir.join(DEVICE_ID_FILE);

    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("read device_id file failed: {}", path.display()))?;

    let id_str = content.trim();
    if id_str.is_empty() {
        return Ok(None);
    }

    uuid::Uuid::parse_str(id_str)
        .with_context(|| format!("invalid device_id UUID in file: {}", path.display()))?;

    Ok(Some(DeviceId::from(id_str)))
}

/// Save device ID to disk, creating the directory if needed.
///
/// Uses temp file + rename, falling back to a direct write when the rename
/// fails (e.g. cross-device links in CI sandboxes).
pub(crate) fn save_to_disk(config_dir: &Path, id: &DeviceId) -> Result<()> {
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("create config dir failed: {}", config_dir.display()))?;

    let path = config_dir.join(DEVICE_ID_FILE);
    let tmp_path = path.with_extension("txt.tmp");
    std::fs::write(&tmp_path, id.as_str())
        .with_context(|| format!("write temp device_id failed: {}", tmp_path.display()))?;

    match std::fs::rename(&tmp_path, &path) {
        Ok(_) => Ok(()),
        Err(rename_err) => {
            std::fs::write(&path, id.as_str()).with_context(|| {
                format!(
                    "direct write device_id failed after rename error ({}): {}",
                    rename_err,
                    path.display()
                )
            })?;
            let _ = std::fs::remove_file(&tmp_path);
            Ok(())
        }
    }
}
