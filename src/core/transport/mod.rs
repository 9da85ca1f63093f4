// src/core/transport/mod.rs

//! The HTTP seam the cache talks through. The orchestrator only sees these
//! request/response shapes, so tests can script the remote side.

pub mod reqwest_client;

use crate::core::TableCacheError;
use crate::core::types::Credentials;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;
use url::Url;

pub use reqwest_client::ReqwestTransport;

/// A streamed HTTP body. Chunk errors should wrap [`BodyStreamError`].
pub type BodyStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Marker carried inside `io::Error`s raised while a response body is being
/// streamed, so that they are classified as transport failures.
#[derive(Debug)]
pub struct BodyStreamError(pub String);

impl fmt::Display for BodyStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "response body interrupted: {}", self.0)
    }
}

impl std::error::Error for BodyStreamError {}

impl BodyStreamError {
    pub fn into_io(message: impl Into<String>) -> std::io::Error {
        std::io::Error::other(BodyStreamError(message.into()))
    }
}

#[derive(Debug, Clone)]
pub struct GetRequest {
    pub url: Url,
    pub accept: &'static str,
    /// Sent as `If-None-Match` when present.
    pub if_none_match: Option<String>,
    pub credentials: Option<Credentials>,
}

pub struct PutRequest {
    pub url: Url,
    pub content_type: &'static str,
    pub body: BodyStream,
    pub credentials: Option<Credentials>,
}

impl fmt::Debug for PutRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutRequest")
            .field("url", &self.url.as_str())
            .field("content_type", &self.content_type)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Status and validator are available before any of the body is read.
pub struct TransportResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub body: BodyStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("etag", &self.etag)
            .finish_non_exhaustive()
    }
}

/// Connection, timeout and TLS failures must be returned as
/// [`TableCacheError::Transport`]; HTTP statuses are never errors at this layer.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: GetRequest) -> Result<TransportResponse, TableCacheError>;

    async fn put(&self, request: PutRequest) -> Result<TransportResponse, TableCacheError>;
}
