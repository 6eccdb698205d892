//! Whole-file document reads and writes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::{DocumentError, StorageDocument};

pub(crate) async fn read_document(path: &Path) -> Result<StorageDocument, DocumentError> {
    let bytes = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Writes `document` next to `path` and renames it into place, so readers
/// never observe a half-written file.
pub(crate) async fn write_document(
    path: &Path,
    document: &StorageDocument,
) -> Result<(), DocumentError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut encoded = serde_json::to_vec_pretty(document)?;
    encoded.push(b'\n');

    let staging = staging_path(path);
    tokio::fs::write(&staging, &encoded).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("document"));
    name.push(".tmp");
    path.with_file_name(name)
}
