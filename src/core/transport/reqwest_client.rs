// src/core/transport/reqwest_client.rs

//! `HttpTransport` backed by a `reqwest::Client`.

use super::{BodyStream, BodyStreamError, GetRequest, HttpTransport, PutRequest, TransportResponse};
use crate::core::TableCacheError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::debug;

/// Upload bodies must be `Sync` for reqwest; the stream is only ever polled
/// through `&mut`, so the mutex is never contended.
struct SyncBody(Mutex<BodyStream>);

impl Stream for SyncBody {
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut()
            .0
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            .poll_next(cx)
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with independent connect and read timeouts.
    ///
    /// Proxy and other environment lookups are disabled so that the only
    /// credentials ever sent are the ones passed per request.
    pub fn new(
        connect_timeout: Duration,
        read_timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, TableCacheError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(user_agent)
            .no_proxy()
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an existing client, e.g. one with custom TLS roots.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn into_response(response: reqwest::Response) -> TransportResponse {
        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes_stream()
            .map_err(|e| BodyStreamError::into_io(e.to_string()))
            .boxed();
        TransportResponse { status, etag, body }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: GetRequest) -> Result<TransportResponse, TableCacheError> {
        let mut builder = self
            .client
            .get(request.url.clone())
            .header(ACCEPT, request.accept);
        if let Some(etag) = &request.if_none_match {
            builder = builder.header(IF_NONE_MATCH, etag.as_str());
        }
        if let Some(creds) = &request.credentials {
            builder = builder.basic_auth(&creds.username, Some(&creds.secret));
        }

        debug!("GET {} (accept: {})", request.url, request.accept);
        let response = builder.send().await?;
        Ok(Self::into_response(response))
    }

    async fn put(&self, request: PutRequest) -> Result<TransportResponse, TableCacheError> {
        let mut builder = self
            .client
            .put(request.url.clone())
            .header(CONTENT_TYPE, request.content_type)
            .body(reqwest::Body::wrap_stream(SyncBody(Mutex::new(request.body))));
        if let Some(creds) = &request.credentials {
            builder = builder.basic_auth(&creds.username, Some(&creds.secret));
        }

        debug!("PUT {} (content-type: {})", request.url, request.content_type);
        let response = builder.send().await?;
        Ok(Self::into_response(response))
    }
}
