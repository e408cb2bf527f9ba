use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

/// Replace `path` with `content` via a sibling temp file and a rename.
///
/// Readers see either the previous document or the new one, never a partial write.
/// 读者只会看到旧文档或新文档，不会看到写了一半的文件。
pub async fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create dir failed: {}", dir.display()))?;
    }

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, content)
        .await
        .with_context(|| format!("write temp file failed: {}", tmp_path.display()))?;

    // TODO: Windows 上 rename 覆盖可能不一致；macOS/Linux OK。
    fs::rename(&tmp_path, path).await.with_context(|| {
        format!(
            "rename temp file to target failed: {} -> {}",
            tmp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}

/// Read a whole file, mapping "not found" to `None`.
pub async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read file failed: {}", path.display())),
    }
}
