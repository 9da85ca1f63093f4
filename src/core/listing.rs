// src/core/listing.rs

//! The read-only diagnostic view of cache contents.

use crate::core::types::{Reference, Variant};
use chrono::{DateTime, Utc};
use std::fmt;

/// Maximum number of validator characters shown in listings.
const ETAG_PREFIX_LEN: usize = 10;

/// One cached representation: its validator joined with byte-store
/// bookkeeping. `last_read` and `size` are absent when the payload has been
/// evicted but the validator is still known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub endpoint: String,
    pub reference: Reference,
    pub variant: Variant,
    pub etag: String,
    pub last_read: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

impl CacheEntry {
    /// A short, legible prefix of the validator with any weak marker and
    /// quotes removed.
    pub fn etag_prefix(&self) -> &str {
        let bare = self.etag.strip_prefix("W/").unwrap_or(&self.etag);
        let bare = bare.trim_matches('"');
        match bare.char_indices().nth(ETAG_PREFIX_LEN) {
            Some((end, _)) => &bare[..end],
            None => bare,
        }
    }

    /// Renders `last_read` relative to `now`, e.g. "5 minutes ago".
    pub fn last_read_relative(&self, now: DateTime<Utc>) -> String {
        match self.last_read {
            Some(last_read) => humanize_since(now.signed_duration_since(last_read)),
            None => "never".to_string(),
        }
    }
}

fn humanize_since(elapsed: chrono::TimeDelta) -> String {
    let seconds = elapsed.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }
    let (amount, unit) = if seconds < 3_600 {
        (elapsed.num_minutes(), "minute")
    } else if seconds < 86_400 {
        (elapsed.num_hours(), "hour")
    } else {
        (elapsed.num_days(), "day")
    };
    let plural = if amount == 1 { "" } else { "s" };
    format!("{amount} {unit}{plural} ago")
}

impl fmt::Display for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self
            .size
            .map_or_else(|| "-".to_string(), |bytes| format!("{bytes} B"));
        write!(
            f,
            "{}{}\t{}\t{}\t{}",
            self.reference,
            self.variant.suffix(),
            self.etag_prefix(),
            self.last_read_relative(Utc::now()),
            size
        )
    }
}
