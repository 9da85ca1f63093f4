// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tablecache::core::credentials::StaticCredentials;
use tablecache::core::key::{CacheKey, DEFAULT_ENDPOINT};
use tablecache::core::storage::{
    BlobInfo, ByteStore, CachedStream, FsByteStore, FsMetadataStore, MetadataRow, MetadataStore,
};
use tablecache::core::transport::{
    BodyStreamError, GetRequest, HttpTransport, PutRequest, TransportResponse,
};
use tablecache::{Credentials, Reference, TableCache, TableCacheError, Variant};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use url::Url;

/// Installs a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::new("warn"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

pub fn reference(name: &str) -> Reference {
    Reference::new(name).expect("valid reference")
}

/// Reads a cached stream to the end.
pub async fn read_all(stream: &mut CachedStream) -> Vec<u8> {
    let mut buf = Vec::new();
    stream
        .read_to_end(&mut buf)
        .await
        .expect("cached stream should be readable");
    buf
}

// ===== Scripted remote =====

/// What the scripted remote does with the next request.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond {
        status: u16,
        etag: Option<String>,
        body: Vec<u8>,
    },
    /// The connection fails before any status is received.
    Fail(String),
    /// Headers arrive, then the body breaks after `prefix`.
    BodyBreaks {
        status: u16,
        etag: Option<String>,
        prefix: Vec<u8>,
    },
}

impl Reply {
    pub fn ok(etag: &str, body: &[u8]) -> Self {
        Reply::Respond {
            status: 200,
            etag: Some(etag.to_string()),
            body: body.to_vec(),
        }
    }

    pub fn ok_without_etag(body: &[u8]) -> Self {
        Reply::Respond {
            status: 200,
            etag: None,
            body: body.to_vec(),
        }
    }

    pub fn not_modified() -> Self {
        Reply::status(304)
    }

    pub fn status(status: u16) -> Self {
        Reply::Respond {
            status,
            etag: None,
            body: Vec::new(),
        }
    }
}

/// A request as the scripted remote saw it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    /// `Accept` for GET, `Content-Type` for PUT.
    pub media_type: &'static str,
    pub if_none_match: Option<String>,
    pub credentials: Option<Credentials>,
    pub body: Vec<u8>,
}

/// An `HttpTransport` that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn push(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("at least one request should have been sent")
    }

    fn next_reply(&self) -> Result<TransportResponse, TableCacheError> {
        let reply = self
            .replies
            .lock()
            .pop_front()
            .expect("no scripted reply left for this request");
        match reply {
            Reply::Respond { status, etag, body } => Ok(TransportResponse {
                status,
                etag,
                body: futures::stream::iter(vec![Ok(Bytes::from(body))]).boxed(),
            }),
            Reply::Fail(message) => Err(TableCacheError::Transport(message)),
            Reply::BodyBreaks {
                status,
                etag,
                prefix,
            } => Ok(TransportResponse {
                status,
                etag,
                body: futures::stream::iter(vec![
                    Ok(Bytes::from(prefix)),
                    Err(BodyStreamError::into_io("connection reset by peer")),
                ])
                .boxed(),
            }),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: GetRequest) -> Result<TransportResponse, TableCacheError> {
        self.requests.lock().push(RecordedRequest {
            method: "GET",
            url: request.url.to_string(),
            media_type: request.accept,
            if_none_match: request.if_none_match,
            credentials: request.credentials,
            body: Vec::new(),
        });
        self.next_reply()
    }

    async fn put(&self, request: PutRequest) -> Result<TransportResponse, TableCacheError> {
        let mut body = Vec::new();
        let mut stream = request.body;
        while let Some(chunk) = stream.next().await {
            body.extend_from_slice(&chunk?);
        }
        self.requests.lock().push(RecordedRequest {
            method: "PUT",
            url: request.url.to_string(),
            media_type: request.content_type,
            if_none_match: None,
            credentials: request.credentials,
            body,
        });
        self.next_reply()
    }
}

// ===== Counting store decorators =====

/// Wraps the file-backed validator table and counts mutating calls.
pub struct CountingMetadataStore {
    inner: FsMetadataStore,
    writes: AtomicUsize,
}

impl CountingMetadataStore {
    pub fn new(inner: FsMetadataStore) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataStore for CountingMetadataStore {
    async fn get_validator(&self, key: &CacheKey) -> Result<Option<String>, TableCacheError> {
        self.inner.get_validator(key).await
    }

    async fn set_validator(&self, key: &CacheKey, etag: &str) -> Result<(), TableCacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_validator(key, etag).await
    }

    async fn rows(&self) -> Result<Vec<MetadataRow>, TableCacheError> {
        self.inner.rows().await
    }

    async fn clear(&self) -> Result<(), TableCacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.clear().await
    }
}

/// Wraps the file-backed payload store and counts payload writes.
pub struct CountingByteStore {
    inner: FsByteStore,
    writes: AtomicUsize,
}

impl CountingByteStore {
    pub fn new(inner: FsByteStore) -> Self {
        Self {
            inner,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &FsByteStore {
        &self.inner
    }
}

#[async_trait]
impl ByteStore for CountingByteStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedStream>, TableCacheError> {
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &CacheKey,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<u64, TableCacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, reader).await
    }

    async fn stat(&self, key: &CacheKey) -> Result<Option<BlobInfo>, TableCacheError> {
        self.inner.stat(key).await
    }

    async fn clear(&self) -> Result<(), TableCacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.clear().await
    }
}

// ===== Test context =====

/// A cache over file-backed stores in a temp directory and a scripted remote.
pub struct TestContext {
    pub dir: TempDir,
    pub cache: TableCache,
    pub transport: Arc<ScriptedTransport>,
    pub metadata: Arc<CountingMetadataStore>,
    pub bytes: Arc<CountingByteStore>,
    pub credentials: Arc<StaticCredentials>,
}

impl TestContext {
    /// Creates a cache against the default endpoint with no capacity bound.
    pub async fn new() -> Self {
        Self::with_options(DEFAULT_ENDPOINT, 0).await
    }

    pub async fn with_options(endpoint: &str, max_entries: usize) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        Self::in_dir(dir, endpoint, max_entries).await
    }

    /// Opens a context over an existing directory, e.g. to simulate a restart.
    pub async fn in_dir(dir: TempDir, endpoint: &str, max_entries: usize) -> Self {
        init_tracing();

        let metadata = Arc::new(CountingMetadataStore::new(
            FsMetadataStore::open(dir.path())
                .await
                .expect("Failed to open metadata store"),
        ));
        let bytes = Arc::new(CountingByteStore::new(
            FsByteStore::open(dir.path(), max_entries)
                .await
                .expect("Failed to open byte store"),
        ));
        let transport = Arc::new(ScriptedTransport::default());
        let credentials = Arc::new(StaticCredentials::new());

        let cache = TableCache::new(
            Url::parse(endpoint).expect("valid endpoint"),
            metadata.clone(),
            bytes.clone(),
            transport.clone(),
            credentials.clone(),
        );

        Self {
            dir,
            cache,
            transport,
            metadata,
            bytes,
            credentials,
        }
    }

    /// Plain fetch without explicit credentials or forced revalidation.
    pub async fn fetch(&self, name: &str, variant: Variant) -> Result<Vec<u8>, TableCacheError> {
        let mut stream = self
            .cache
            .fetch(&reference(name), variant, None, false)
            .await?;
        Ok(read_all(&mut stream).await)
    }

    pub async fn fetch_forced(
        &self,
        name: &str,
        variant: Variant,
    ) -> Result<Vec<u8>, TableCacheError> {
        let mut stream = self
            .cache
            .fetch(&reference(name), variant, None, true)
            .await?;
        Ok(read_all(&mut stream).await)
    }

    /// (metadata writes, byte store writes) so far.
    pub fn store_writes(&self) -> (usize, usize) {
        (self.metadata.writes(), self.bytes.writes())
    }

    pub fn key(&self, name: &str, variant: Variant) -> CacheKey {
        self.cache.key_for(&reference(name), variant)
    }
}
