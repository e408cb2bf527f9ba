use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use cs_core::ports::ImageSpoolPort;
use cs_core::{CapturedImage, EntryId, ImageRef};

const IMAGES_DIR: &str = "images";
const CAPTURES_DIR: &str = "captures";
const ORIGINALS_DIR: &str = "originals";

/// Image files owned by the engine, under `<root>/images/`.
///
/// - `captures/<entry_id>.png`: clipboard images not yet uploaded
/// - `originals/<entry_id>.png`: full-resolution downloads
pub struct FsImageSpool {
    root: PathBuf,
}

impl FsImageSpool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    fn file_for(&self, sub_dir: &str, id: &EntryId) -> Result<PathBuf> {
        validate_file_stem(id.as_str())?;
        Ok(self.images_dir().join(sub_dir).join(format!("{}.png", id)))
    }

    fn owns(&self, path: &Path) -> bool {
        path.starts_with(self.images_dir())
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create image dir failed: {}", dir.display()))?;
        }
        fs::write(path, bytes)
            .await
            .with_context(|| format!("write image failed: {}", path.display()))
    }
}

/// Entry ids become file names; server ids are plain numbers or uuids.
fn validate_file_stem(stem: &str) -> Result<()> {
    if stem.is_empty()
        || stem == "."
        || stem == ".."
        || stem.contains(['/', '\\'])
        || stem.contains('\0')
    {
        bail!("entry id `{}` is not usable as a file name", stem);
    }
    Ok(())
}

#[async_trait]
impl ImageSpoolPort for FsImageSpool {
    async fn persist_capture(&self, id: &EntryId, image: &CapturedImage) -> Result<ImageRef> {
        match image {
            CapturedImage::Bytes { bytes } => {
                let path = self.file_for(CAPTURES_DIR, id)?;
                self.write_file(&path, bytes).await?;
                debug!(entry_id = %id, size = bytes.len(), "Spooled captured image");
                Ok(ImageRef::LocalFile { path })
            }
            // Copied image files are referenced in place.
            CapturedImage::File { path, .. } => Ok(ImageRef::LocalFile { path: path.clone() }),
        }
    }

    async fn store_original(&self, id: &EntryId, bytes: &[u8]) -> Result<ImageRef> {
        let path = self.file_for(ORIGINALS_DIR, id)?;
        self.write_file(&path, bytes).await?;
        debug!(entry_id = %id, size = bytes.len(), "Cached original image");
        Ok(ImageRef::CachedOriginal { path })
    }

    async fn read(&self, image: &ImageRef) -> Result<Vec<u8>> {
        match image {
            ImageRef::LocalFile { path } | ImageRef::CachedOriginal { path } => fs::read(path)
                .await
                .with_context(|| format!("read image failed: {}", path.display())),
            ImageRef::Remote { bytes } => Ok(bytes.clone()),
        }
    }

    async fn discard(&self, image: &ImageRef) -> Result<()> {
        let Some(path) = image.local_path() else {
            return Ok(());
        };
        if !self.owns(path) {
            return Ok(());
        }
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove image failed: {}", path.display())),
        }
    }
}
