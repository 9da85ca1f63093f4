// src/core/errors.rs

//! Defines the primary error type for the cache.

use crate::core::transport::BodyStreamError;
use std::sync::Arc;
use thiserror::Error;

/// Every failure a cache operation can surface to its caller.
///
/// Remote status errors (`NotFound`, `Server`), network failures (`Transport`),
/// contract violations by the remote (`Protocol`) and local persistence
/// failures (`Storage`, `StorageCorruption`) are kept apart so callers can pick
/// a retry policy per kind. A key that is simply absent is never an error.
#[derive(Error, Debug)]
pub enum TableCacheError {
    /// The remote answered 4xx: the reference does not exist or is not accessible.
    #[error("Table not found: {reference} (HTTP status {status})")]
    NotFound { reference: String, status: u16 },

    /// The remote answered 5xx.
    #[error("Server error for '{reference}' (HTTP status {status})")]
    Server { reference: String, status: u16 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Storage error: {0}")]
    Storage(Arc<std::io::Error>),

    #[error("Storage corruption: {0}")]
    StorageCorruption(String),

    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Unknown media type '{0}'")]
    UnknownMediaType(String),
}

impl TableCacheError {
    /// Returns `true` for the error kinds a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TableCacheError::Server { .. } | TableCacheError::Transport(_)
        )
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
impl Clone for TableCacheError {
    fn clone(&self) -> Self {
        match self {
            TableCacheError::NotFound { reference, status } => TableCacheError::NotFound {
                reference: reference.clone(),
                status: *status,
            },
            TableCacheError::Server { reference, status } => TableCacheError::Server {
                reference: reference.clone(),
                status: *status,
            },
            TableCacheError::Transport(s) => TableCacheError::Transport(s.clone()),
            TableCacheError::Protocol(s) => TableCacheError::Protocol(s.clone()),
            TableCacheError::Storage(e) => TableCacheError::Storage(Arc::clone(e)),
            TableCacheError::StorageCorruption(s) => TableCacheError::StorageCorruption(s.clone()),
            TableCacheError::InvalidReference(s) => TableCacheError::InvalidReference(s.clone()),
            TableCacheError::UnknownMediaType(s) => TableCacheError::UnknownMediaType(s.clone()),
        }
    }
}

impl PartialEq for TableCacheError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                TableCacheError::NotFound {
                    reference: r1,
                    status: s1,
                },
                TableCacheError::NotFound {
                    reference: r2,
                    status: s2,
                },
            ) => r1 == r2 && s1 == s2,
            (
                TableCacheError::Server {
                    reference: r1,
                    status: s1,
                },
                TableCacheError::Server {
                    reference: r2,
                    status: s2,
                },
            ) => r1 == r2 && s1 == s2,
            (TableCacheError::Storage(e1), TableCacheError::Storage(e2)) => {
                e1.to_string() == e2.to_string()
            }
            (TableCacheError::Transport(s1), TableCacheError::Transport(s2)) => s1 == s2,
            (TableCacheError::Protocol(s1), TableCacheError::Protocol(s2)) => s1 == s2,
            (TableCacheError::StorageCorruption(s1), TableCacheError::StorageCorruption(s2)) => {
                s1 == s2
            }
            (TableCacheError::InvalidReference(s1), TableCacheError::InvalidReference(s2)) => {
                s1 == s2
            }
            (TableCacheError::UnknownMediaType(s1), TableCacheError::UnknownMediaType(s2)) => {
                s1 == s2
            }
            _ => false,
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for TableCacheError {
    fn from(e: std::io::Error) -> Self {
        // A body stream that failed mid-copy surfaces as an io::Error carrying
        // the transport marker; it is a network failure, not a disk one.
        if let Some(body_err) = e
            .get_ref()
            .and_then(|inner| inner.downcast_ref::<BodyStreamError>())
        {
            return TableCacheError::Transport(body_err.to_string());
        }
        TableCacheError::Storage(Arc::new(e))
    }
}

impl From<reqwest::Error> for TableCacheError {
    fn from(e: reqwest::Error) -> Self {
        TableCacheError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for TableCacheError {
    fn from(e: serde_json::Error) -> Self {
        TableCacheError::StorageCorruption(format!("JSON serialization/deserialization error: {e}"))
    }
}
