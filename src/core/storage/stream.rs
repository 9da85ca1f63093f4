// src/core/storage/stream.rs

//! The seekable stream type handed to callers, and the rewind helper applied
//! wherever a stream crosses from the stores to a caller.

use std::io::SeekFrom;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};

/// A readable, independently seekable byte stream.
pub trait SeekableStream: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SeekableStream for T {}

/// The stream type returned by the byte store and by `TableCache::fetch`.
pub type CachedStream = Box<dyn SeekableStream>;

/// Positions `stream` at offset 0.
///
/// Called on every path that hands a stream out: `FsByteStore::get`, and
/// both the 2xx and the 304 branch of `TableCache::fetch`. Error paths hand
/// out nothing, so there is nothing to rewind there.
pub async fn rewind<S: AsyncSeek + Unpin + ?Sized>(stream: &mut S) -> std::io::Result<()> {
    stream.seek(SeekFrom::Start(0)).await?;
    Ok(())
}
