// src/core/key.rs

//! Derives the composite address shared by the metadata store and the byte store.

use crate::core::types::{Reference, Variant};
use sha2::{Digest, Sha256};

/// The endpoint whose identity is left out of key segments, so keys written
/// before multi-endpoint support stay valid.
pub const DEFAULT_ENDPOINT: &str = "https://csvbase.com/";

/// Namespace prefix for the on-disk layout. Bump it for incompatible layouts.
pub const LAYOUT_VERSION: &str = "v0";

/// Identifies one cached representation: (endpoint, reference, variant).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    endpoint: String,
    reference: Reference,
    variant: Variant,
}

impl CacheKey {
    pub fn new(endpoint: &str, reference: Reference, variant: Variant) -> Self {
        Self {
            endpoint: normalize_endpoint(endpoint),
            reference,
            variant,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// The ordered address segments. The endpoint is omitted for the default endpoint.
    pub fn segments(&self) -> Vec<String> {
        let mut segments = vec![LAYOUT_VERSION.to_string()];
        if self.endpoint != DEFAULT_ENDPOINT {
            segments.push(self.endpoint.clone());
        }
        segments.push(format!("{}{}", self.reference, self.variant.suffix()));
        segments
    }

    /// The segments joined into a single human-readable storage key. Only
    /// unambiguous for the default endpoint; stores key on [`Self::address`].
    pub fn storage_key(&self) -> String {
        self.segments().join("/")
    }

    /// The unambiguous byte-store address of this key.
    ///
    /// For the default endpoint this is the storage key. Otherwise every
    /// segment is length-prefixed (`<len>:<segment>`), since the endpoint
    /// itself contains `/`. The two forms cannot meet: one starts with
    /// `v0/`, the other with a digit.
    pub fn address(&self) -> String {
        if self.endpoint == DEFAULT_ENDPOINT {
            return self.storage_key();
        }
        self.segments()
            .iter()
            .map(|segment| format!("{}:{segment}", segment.len()))
            .collect()
    }

    /// A fixed-length, filesystem-safe file name for the payload of this key.
    pub fn blob_file_name(&self) -> String {
        let digest = Sha256::digest(self.address().as_bytes());
        format!("{}{}", hex::encode(digest), self.variant.suffix())
    }
}

/// Endpoints are compared with a trailing slash so `https://h` and `https://h/`
/// address the same entries.
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.ends_with('/') {
        endpoint.to_string()
    } else {
        format!("{endpoint}/")
    }
}
