// src/core/storage/blobs.rs

//! The payload store: the last fetched bytes for each cache key, with
//! read-time bookkeeping and an optional least-recently-read capacity bound.

use super::snapshot;
use super::stream::{CachedStream, rewind};
use crate::core::TableCacheError;
use crate::core::key::{CacheKey, LAYOUT_VERSION};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::File as TokioFile;
use tokio::io::AsyncRead;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// File name of the bookkeeping index inside the versioned payload directory.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Store-level bookkeeping for one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobInfo {
    pub size: u64,
    pub last_read: DateTime<Utc>,
}

/// Persistent byte payloads addressed by [`CacheKey`].
///
/// A missing or evicted payload is `Ok(None)`; persistence failures are errors.
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Returns a fresh stream positioned at offset 0 and marks the entry as read.
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedStream>, TableCacheError>;

    /// Reads `reader` to completion and persists it under `key`, returning the
    /// number of bytes stored. The reader's final position is unspecified.
    async fn set(
        &self,
        key: &CacheKey,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, TableCacheError>;

    /// Bookkeeping for `key` without counting as a read.
    async fn stat(&self, key: &CacheKey) -> Result<Option<BlobInfo>, TableCacheError>;

    /// Removes every payload and its bookkeeping.
    async fn clear(&self) -> Result<(), TableCacheError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    file: String,
    size: u64,
    last_read: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct BlobIndex {
    #[serde(default)]
    entries: BTreeMap<String, IndexEntry>,
}

/// A [`ByteStore`] keeping one file per key under `<dir>/<LAYOUT_VERSION>/`.
#[derive(Debug)]
pub struct FsByteStore {
    root: PathBuf,
    index_path: PathBuf,
    /// `0` means no limit.
    max_entries: usize,
    lock: Mutex<()>,
}

impl FsByteStore {
    pub async fn open(dir: impl AsRef<Path>, max_entries: usize) -> Result<Self, TableCacheError> {
        let root = dir.as_ref().join(LAYOUT_VERSION);
        tokio::fs::create_dir_all(&root).await?;
        let store = Self {
            index_path: root.join(INDEX_FILE_NAME),
            root,
            max_entries,
            lock: Mutex::new(()),
        };
        let _: BlobIndex = snapshot::load(&store.index_path).await?;
        Ok(store)
    }

    /// The versioned directory payload files live in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Streams `reader` into a temp file next to `final_path` and renames it
    /// into place once fully synced.
    async fn write_payload(
        &self,
        final_path: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, TableCacheError> {
        let temp_path = snapshot::temp_sibling(final_path);
        let write_result = async {
            let mut file = TokioFile::create(&temp_path).await?;
            let size = tokio::io::copy(reader, &mut file).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp_path, final_path).await?;
            Ok::<u64, std::io::Error>(size)
        }
        .await;

        match write_result {
            Ok(size) => Ok(size),
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&temp_path).await
                    && remove_err.kind() != std::io::ErrorKind::NotFound
                {
                    error!(
                        "Additionally failed to remove temporary payload '{}': {remove_err}",
                        temp_path.display()
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Drops least-recently-read entries (never `keep`) until the bound holds.
    async fn evict_over_capacity(
        &self,
        index: &mut BlobIndex,
        keep: &str,
    ) -> Result<usize, TableCacheError> {
        if self.max_entries == 0 {
            return Ok(0);
        }
        let mut evicted = 0;
        while index.entries.len() > self.max_entries {
            let Some(victim) = index
                .entries
                .iter()
                .filter(|(k, _)| k.as_str() != keep)
                .min_by_key(|(_, entry)| entry.last_read)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            if let Some(entry) = index.entries.remove(&victim) {
                remove_if_exists(&self.root.join(&entry.file)).await?;
                debug!("Evicted cached payload for '{}'", victim);
                evicted += 1;
            }
        }
        if evicted > 0 {
            info!(
                "Evicted {} cached payloads to stay within max_entries = {}.",
                evicted, self.max_entries
            );
        }
        Ok(evicted)
    }
}

#[async_trait]
impl ByteStore for FsByteStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedStream>, TableCacheError> {
        let _guard = self.lock.lock().await;
        let mut index: BlobIndex = snapshot::load(&self.index_path).await?;
        let address = key.address();
        let Some(file_name) = index.entries.get(&address).map(|e| e.file.clone()) else {
            return Ok(None);
        };

        let mut file = match TokioFile::open(self.root.join(&file_name)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Payload for '{}' is indexed but missing on disk; treating as absent.",
                    key.storage_key()
                );
                index.entries.remove(&address);
                snapshot::store(&self.index_path, &index).await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(entry) = index.entries.get_mut(&address) {
            entry.last_read = Utc::now();
        }
        snapshot::store(&self.index_path, &index).await?;
        rewind(&mut file).await?;
        Ok(Some(Box::new(file)))
    }

    async fn set(
        &self,
        key: &CacheKey,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, TableCacheError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let file_name = key.blob_file_name();
        // The copy may be a long network read; the index lock is only taken
        // once the payload is in place.
        let size = self.write_payload(&self.root.join(&file_name), reader).await?;

        let _guard = self.lock.lock().await;
        let mut index: BlobIndex = snapshot::load(&self.index_path).await?;
        let address = key.address();
        index.entries.insert(
            address.clone(),
            IndexEntry {
                file: file_name,
                size,
                last_read: Utc::now(),
            },
        );
        self.evict_over_capacity(&mut index, &address).await?;
        snapshot::store(&self.index_path, &index).await?;
        debug!("Stored {} bytes for '{}'", size, key.storage_key());
        Ok(size)
    }

    async fn stat(&self, key: &CacheKey) -> Result<Option<BlobInfo>, TableCacheError> {
        let _guard = self.lock.lock().await;
        let index: BlobIndex = snapshot::load(&self.index_path).await?;
        let Some(entry) = index.entries.get(&key.address()) else {
            return Ok(None);
        };
        if !tokio::fs::try_exists(self.root.join(&entry.file)).await? {
            return Ok(None);
        }
        Ok(Some(BlobInfo {
            size: entry.size,
            last_read: entry.last_read,
        }))
    }

    async fn clear(&self) -> Result<(), TableCacheError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => info!("Cleared cached payloads at {}", self.root.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> Result<(), TableCacheError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
