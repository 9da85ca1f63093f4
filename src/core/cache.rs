// src/core/cache.rs

//! The read-through orchestrator: decides between a conditional and an
//! unconditional request, interprets the answer, and keeps the metadata and
//! byte stores in step.

use crate::config::CacheConfig;
use crate::core::TableCacheError;
use crate::core::credentials::CredentialProvider;
use crate::core::key::CacheKey;
use crate::core::listing::CacheEntry;
use crate::core::storage::stream::rewind;
use crate::core::storage::{ByteStore, CachedStream, FsByteStore, FsMetadataStore, MetadataStore};
use crate::core::transport::{
    GetRequest, HttpTransport, PutRequest, ReqwestTransport, TransportResponse,
};
use crate::core::types::{Credentials, Reference, Variant};
use anyhow::Context;
use futures::StreamExt;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, info, warn};
use url::Url;

const JSON_MEDIA_TYPE: &str = "application/json";

/// A read-through, ETag-validated cache of remote tables.
///
/// All state lives in the injected stores; the cache itself only holds
/// handles. Calls for the same key are not serialized: two concurrent misses
/// both fetch and the last write wins.
pub struct TableCache {
    endpoint: Url,
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn ByteStore>,
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialProvider>,
}

impl TableCache {
    pub fn new(
        endpoint: Url,
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn ByteStore>,
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            endpoint,
            metadata,
            blobs,
            transport,
            credentials,
        }
    }

    /// Wires the file-backed stores under `config.cache_dir` and a reqwest transport.
    pub async fn from_config(
        config: &CacheConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let endpoint = config.endpoint()?;
        let metadata = FsMetadataStore::open(&config.cache_dir)
            .await
            .context("Failed to open the validator table")?;
        let blobs = FsByteStore::open(&config.cache_dir, config.max_entries)
            .await
            .context("Failed to open the payload store")?;
        let transport = ReqwestTransport::new(
            config.connect_timeout,
            config.read_timeout,
            &config.user_agent,
        )?;
        info!(
            "Table cache for {} opened at {}",
            endpoint,
            config.cache_dir.display()
        );
        Ok(Self::new(
            endpoint,
            Arc::new(metadata),
            Arc::new(blobs),
            Arc::new(transport),
            credentials,
        ))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn key_for(&self, reference: &Reference, variant: Variant) -> CacheKey {
        CacheKey::new(self.endpoint.as_str(), reference.clone(), variant)
    }

    /// Returns the current content of `reference` as `variant`, serving the
    /// local copy when the remote confirms it is unchanged.
    ///
    /// With `force_revalidate` the precondition is never sent, so the remote
    /// always returns a full body and the cache is re-seeded from it.
    pub async fn fetch(
        &self,
        reference: &Reference,
        variant: Variant,
        credentials: Option<&Credentials>,
        force_revalidate: bool,
    ) -> Result<CachedStream, TableCacheError> {
        let key = self.key_for(reference, variant);
        let storage_key = key.storage_key();

        let mut cached = None;
        let mut if_none_match = None;
        match self.metadata.get_validator(&key).await? {
            Some(etag) => match self.blobs.get(&key).await? {
                Some(_) if force_revalidate => {
                    debug!(
                        "Cache HIT for '{}' (validator {}), but forcing a full fetch.",
                        storage_key, etag
                    );
                }
                Some(stream) => {
                    debug!("Cache HIT for '{}', revalidating {}.", storage_key, etag);
                    if_none_match = Some(etag);
                    cached = Some(stream);
                }
                None => {
                    debug!(
                        "Validator known for '{}' but payload is gone; fetching unconditionally.",
                        storage_key
                    );
                }
            },
            None => debug!("Cache MISS for '{}'.", storage_key),
        }

        let request = GetRequest {
            url: self.url_for(reference.as_str(), Some(variant)),
            accept: variant.media_type(),
            if_none_match,
            credentials: self.resolve_credentials(credentials),
        };
        let response = self.transport.get(request).await?;

        match response.status {
            200..=299 => self.store_new_content(&key, response).await,
            304 => match cached {
                Some(mut stream) => {
                    debug!("Remote says '{}' is unchanged.", storage_key);
                    rewind(&mut stream).await?;
                    Ok(stream)
                }
                None => Err(TableCacheError::Protocol(format!(
                    "received 304 Not Modified for '{reference}' without sending a precondition"
                ))),
            },
            status => Err(status_error(reference.as_str(), status)),
        }
    }

    /// Persists a 2xx body: bytes first, then the validator, so a validator is
    /// never committed for bytes that do not exist.
    async fn store_new_content(
        &self,
        key: &CacheKey,
        response: TransportResponse,
    ) -> Result<CachedStream, TableCacheError> {
        let Some(etag) = response.etag else {
            return Err(TableCacheError::Protocol(format!(
                "response for '{}' carried no ETag",
                key.reference()
            )));
        };

        let mut body = StreamReader::new(response.body);
        let size = self.blobs.set(key, &mut body).await?;
        self.metadata.set_validator(key, &etag).await?;
        debug!(
            "Seeded '{}' with {} bytes (validator {}).",
            key.storage_key(),
            size,
            etag
        );

        let mut stream = self.blobs.get(key).await?.ok_or_else(|| {
            TableCacheError::StorageCorruption(format!(
                "payload for '{}' vanished right after it was stored",
                key.storage_key()
            ))
        })?;
        rewind(&mut stream).await?;
        Ok(stream)
    }

    /// Uploads `body` unconditionally. Neither store is touched, so the next
    /// `fetch` of this key re-seeds from the remote.
    pub async fn send<R>(
        &self,
        reference: &Reference,
        variant: Variant,
        body: R,
        credentials: Option<&Credentials>,
    ) -> Result<(), TableCacheError>
    where
        R: AsyncRead + Send + 'static,
    {
        let request = PutRequest {
            url: self.url_for(reference.as_str(), None),
            content_type: variant.media_type(),
            body: ReaderStream::new(body).boxed(),
            credentials: self.resolve_credentials(credentials),
        };
        let response = self.transport.put(request).await?;
        match response.status {
            200..=299 => {
                info!("Uploaded '{}' as {}.", reference, variant);
                Ok(())
            }
            status => Err(status_error(reference.as_str(), status)),
        }
    }

    /// Probes the remote with `credentials`: 2xx means valid, 4xx invalid.
    pub async fn check_credentials(
        &self,
        credentials: &Credentials,
    ) -> Result<bool, TableCacheError> {
        if credentials.username.is_empty() {
            return Err(TableCacheError::InvalidReference(
                "username cannot be empty".to_string(),
            ));
        }
        let request = GetRequest {
            url: self.url_for(&credentials.username, None),
            accept: JSON_MEDIA_TYPE,
            if_none_match: None,
            credentials: Some(credentials.clone()),
        };
        let response = self.transport.get(request).await?;
        match response.status {
            200..=299 => Ok(true),
            400..=499 => {
                debug!(
                    "Credentials for '{}' rejected with status {}.",
                    credentials.username, response.status
                );
                Ok(false)
            }
            status => Err(status_error(&credentials.username, status)),
        }
    }

    /// Fetches the remote's JSON description of a table. Not cached.
    pub async fn table_metadata(
        &self,
        reference: &Reference,
        credentials: Option<&Credentials>,
    ) -> Result<serde_json::Value, TableCacheError> {
        let request = GetRequest {
            url: self.url_for(reference.as_str(), None),
            accept: JSON_MEDIA_TYPE,
            if_none_match: None,
            credentials: self.resolve_credentials(credentials),
        };
        let response = self.transport.get(request).await?;
        if !(200..300).contains(&response.status) {
            return Err(status_error(reference.as_str(), response.status));
        }
        let mut body = Vec::new();
        StreamReader::new(response.body)
            .read_to_end(&mut body)
            .await?;
        serde_json::from_slice(&body).map_err(|e| {
            TableCacheError::Protocol(format!("metadata for '{reference}' is not JSON: {e}"))
        })
    }

    /// A snapshot of every known validator joined with payload bookkeeping.
    pub async fn list_entries(&self) -> Result<Vec<CacheEntry>, TableCacheError> {
        let rows = self.metadata.rows().await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let info = self.blobs.stat(&row.key()).await?;
            entries.push(CacheEntry {
                endpoint: row.endpoint,
                reference: row.reference,
                variant: row.variant,
                etag: row.etag,
                last_read: info.map(|i| i.last_read),
                size: info.map(|i| i.size),
            });
        }
        Ok(entries)
    }

    /// Wipes both stores. Calling it again is a no-op.
    pub async fn clear(&self) -> Result<(), TableCacheError> {
        self.blobs.clear().await?;
        self.metadata.clear().await?;
        info!("Table cache cleared.");
        Ok(())
    }

    /// Explicit credentials win; otherwise the provider is asked on every call.
    fn resolve_credentials(&self, explicit: Option<&Credentials>) -> Option<Credentials> {
        explicit.cloned().or_else(|| {
            self.endpoint
                .host_str()
                .and_then(|host| self.credentials.credentials_for(host))
        })
    }

    /// Appends `resource` (plus an optional suffix) to the endpoint path.
    /// References are never parsed as URLs, so `a:b` cannot become a scheme.
    fn url_for(&self, resource: &str, variant: Option<Variant>) -> Url {
        let suffix = variant.map_or("", Variant::suffix);
        let mut url = self.endpoint.clone();
        let path = format!("{}{}{}", self.endpoint.path(), resource, suffix);
        url.set_path(&path);
        url
    }
}

/// Maps a non-success status onto the error taxonomy.
fn status_error(reference: &str, status: u16) -> TableCacheError {
    match status {
        400..=499 => {
            warn!("Remote answered {} for '{}'.", status, reference);
            TableCacheError::NotFound {
                reference: reference.to_string(),
                status,
            }
        }
        500.. => {
            warn!("Remote failed with {} for '{}'.", status, reference);
            TableCacheError::Server {
                reference: reference.to_string(),
                status,
            }
        }
        _ => TableCacheError::Protocol(format!(
            "unexpected HTTP status {status} for '{reference}'"
        )),
    }
}
