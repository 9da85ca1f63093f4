// src/core/mod.rs

//! The central module containing the cache's core logic and data structures.

pub mod cache;
pub mod credentials;
pub mod errors;
pub mod key;
pub mod listing;
pub mod storage;
pub mod transport;
pub mod types;

pub use cache::TableCache;
pub use errors::TableCacheError;
pub use key::CacheKey;
pub use types::{Credentials, Reference, Variant};
