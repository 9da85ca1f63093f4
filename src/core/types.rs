// src/core/types.rs

//! Value types identifying a remote table and the representation requested.

use crate::core::TableCacheError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::EnumIter;

/// An opaque, caller-supplied name for a remote resource, e.g. `alice/sales`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference(String);

impl Reference {
    /// Creates a reference, rejecting the empty string.
    pub fn new(reference: impl Into<String>) -> Result<Self, TableCacheError> {
        let reference = reference.into();
        if reference.is_empty() {
            return Err(TableCacheError::InvalidReference(
                "reference cannot be empty".to_string(),
            ));
        }
        Ok(Self(reference))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Reference {
    type Error = TableCacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Reference::new(value)
    }
}

impl From<Reference> for String {
    fn from(value: Reference) -> Self {
        value.0
    }
}

impl FromStr for Reference {
    type Err = TableCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reference::new(s)
    }
}

/// The closed set of content representations a table can be fetched in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter)]
pub enum Variant {
    /// Row-oriented text.
    Csv,
    /// Columnar binary.
    Parquet,
    /// One JSON document per row.
    JsonLines,
}

/// The single source for both lookup directions: variant -> (media type, suffix)
/// and media type -> variant.
static VARIANT_TABLE: [(Variant, &str, &str); 3] = [
    (Variant::Csv, "text/csv", ".csv"),
    (Variant::Parquet, "application/parquet", ".parquet"),
    (Variant::JsonLines, "application/x-jsonlines", ".jsonl"),
];

impl Variant {
    fn row(self) -> &'static (Variant, &'static str, &'static str) {
        // Indexing by discriminant keeps the lookup total; the table order is
        // asserted against the enum in the unit tests.
        &VARIANT_TABLE[self as usize]
    }

    /// The canonical media type used for content negotiation.
    pub fn media_type(self) -> &'static str {
        self.row().1
    }

    /// The canonical file suffix, including the leading dot.
    pub fn suffix(self) -> &'static str {
        self.row().2
    }

    /// Decodes a media type. Parameters such as `; charset=utf-8` are ignored.
    pub fn from_media_type(media_type: &str) -> Result<Self, TableCacheError> {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        VARIANT_TABLE
            .iter()
            .find(|(_, mt, _)| mt.eq_ignore_ascii_case(essence))
            .map(|(variant, _, _)| *variant)
            .ok_or_else(|| TableCacheError::UnknownMediaType(media_type.to_string()))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media_type())
    }
}

impl FromStr for Variant {
    type Err = TableCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variant::from_media_type(s)
    }
}

impl Serialize for Variant {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.media_type())
    }
}

impl<'de> Deserialize<'de> for Variant {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let media_type = String::deserialize(deserializer)?;
        Variant::from_media_type(&media_type).map_err(serde::de::Error::custom)
    }
}

/// A username and API key pair used for HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}
