// src/core/storage/snapshot.rs

//! Whole-file JSON snapshots, replaced atomically on write.

use crate::core::TableCacheError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncWriteExt;
use tracing::error;
use uuid::Uuid;

/// Reads a snapshot. A missing file yields `T::default()`; an unparseable one
/// is corruption and is reported as such.
pub async fn load<T>(path: &Path) -> Result<T, TableCacheError>
where
    T: DeserializeOwned + Default,
{
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&contents).map_err(|e| {
        TableCacheError::StorageCorruption(format!("'{}' is unreadable: {e}", path.display()))
    })
}

/// Writes `value` to a uniquely named sibling, syncs it, then renames it over
/// `path`. Readers observe either the old or the new snapshot, never a mix.
pub async fn store<T: Serialize>(path: &Path, value: &T) -> Result<(), TableCacheError> {
    let encoded = serde_json::to_vec_pretty(value)?;
    let temp_path = temp_sibling(path);

    let write_result = async {
        let mut file = TokioFile::create(&temp_path).await?;
        file.write_all(&encoded).await?;
        file.sync_all().await?;
        tokio::fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = write_result {
        if let Err(remove_err) = tokio::fs::remove_file(&temp_path).await
            && remove_err.kind() != std::io::ErrorKind::NotFound
        {
            error!(
                "Additionally failed to remove temporary file '{}': {remove_err}",
                temp_path.display()
            );
        }
        return Err(e.into());
    }
    Ok(())
}

/// A unique temporary path in the same directory as `path`, so the final
/// rename never crosses filesystems.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.tmp.{}", Uuid::new_v4()))
}
