use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where the bytes of an image entry live.
///
/// Exactly one source is authoritative at a time; replacing the reference
/// (e.g. after the original is downloaded) drops the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImageRef {
    /// Captured locally and spooled to disk, not yet uploaded.
    LocalFile { path: PathBuf },
    /// Full-resolution original downloaded from the server.
    CachedOriginal { path: PathBuf },
    /// Payload delivered inline by the server (usually a thumbnail).
    Remote {
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
}

impl ImageRef {
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            ImageRef::LocalFile { path } | ImageRef::CachedOriginal { path } => Some(path),
            ImageRef::Remote { .. } => None,
        }
    }
}

/// Resolution of the image currently held for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFidelity {
    Thumbnail,
    Original,
    #[default]
    Unknown,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
