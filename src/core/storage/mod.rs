// src/core/storage/mod.rs

pub mod blobs;
pub mod metadata;
pub mod snapshot;
pub mod stream;

pub use blobs::{BlobInfo, ByteStore, FsByteStore};
pub use metadata::{FsMetadataStore, MetadataRow, MetadataStore};
pub use stream::{CachedStream, SeekableStream};
