// src/core/storage/metadata.rs

//! The validator table: (endpoint, reference, variant) -> last seen ETag.

use super::snapshot;
use crate::core::TableCacheError;
use crate::core::key::CacheKey;
use crate::core::types::{Reference, Variant};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// File name of the validator table inside the cache directory.
pub const METADATA_FILE_NAME: &str = "etags.json";

/// One row of the validator table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    pub endpoint: String,
    pub reference: Reference,
    pub variant: Variant,
    pub etag: String,
}

impl MetadataRow {
    pub fn key(&self) -> CacheKey {
        CacheKey::new(&self.endpoint, self.reference.clone(), self.variant)
    }

    fn matches(&self, key: &CacheKey) -> bool {
        self.endpoint == key.endpoint()
            && &self.reference == key.reference()
            && self.variant == key.variant()
    }
}

/// Persistent mapping from cache keys to validators.
///
/// A missing key is `Ok(None)`; only genuine persistence failures are errors.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get_validator(&self, key: &CacheKey) -> Result<Option<String>, TableCacheError>;

    /// Upserts the validator for `key`. Last write wins.
    async fn set_validator(&self, key: &CacheKey, etag: &str) -> Result<(), TableCacheError>;

    /// A point-in-time snapshot of every row.
    async fn rows(&self) -> Result<Vec<MetadataRow>, TableCacheError>;

    async fn clear(&self) -> Result<(), TableCacheError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MetadataFile {
    #[serde(default)]
    rows: Vec<MetadataRow>,
}

/// A [`MetadataStore`] kept as a JSON table in the cache directory.
///
/// The file on disk is the source of truth: every operation re-reads it, and
/// writes replace it atomically. The mutex only serializes callers inside this
/// process.
#[derive(Debug)]
pub struct FsMetadataStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FsMetadataStore {
    /// Opens (creating the directory if needed) the table under `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, TableCacheError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let store = Self {
            path: dir.join(METADATA_FILE_NAME),
            lock: Mutex::new(()),
        };
        // Surface corruption at open time rather than on the first fetch.
        let _: MetadataFile = snapshot::load(&store.path).await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MetadataStore for FsMetadataStore {
    async fn get_validator(&self, key: &CacheKey) -> Result<Option<String>, TableCacheError> {
        let _guard = self.lock.lock().await;
        let table: MetadataFile = snapshot::load(&self.path).await?;
        Ok(table
            .rows
            .into_iter()
            .find(|row| row.matches(key))
            .map(|row| row.etag))
    }

    async fn set_validator(&self, key: &CacheKey, etag: &str) -> Result<(), TableCacheError> {
        let _guard = self.lock.lock().await;
        let mut table: MetadataFile = snapshot::load(&self.path).await?;
        match table.rows.iter_mut().find(|row| row.matches(key)) {
            Some(row) => row.etag = etag.to_string(),
            None => table.rows.push(MetadataRow {
                endpoint: key.endpoint().to_string(),
                reference: key.reference().clone(),
                variant: key.variant(),
                etag: etag.to_string(),
            }),
        }
        snapshot::store(&self.path, &table).await?;
        debug!("Stored validator {} for '{}'", etag, key.storage_key());
        Ok(())
    }

    async fn rows(&self) -> Result<Vec<MetadataRow>, TableCacheError> {
        let _guard = self.lock.lock().await;
        let table: MetadataFile = snapshot::load(&self.path).await?;
        Ok(table.rows)
    }

    async fn clear(&self) -> Result<(), TableCacheError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Cleared validator table at {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
