// src/lib.rs

pub mod config;
pub mod core;

// Re-export
pub use crate::config::CacheConfig;
pub use crate::core::listing::CacheEntry;
pub use crate::core::storage::CachedStream;
pub use crate::core::{CacheKey, Credentials, Reference, TableCache, TableCacheError, Variant};
