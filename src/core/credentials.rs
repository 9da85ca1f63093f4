// src/core/credentials.rs

//! Credential lookup, consulted lazily on every call so callers and tests can
//! swap credentials between requests.

use crate::core::types::Credentials;
use parking_lot::RwLock;
use std::collections::HashMap;

pub trait CredentialProvider: Send + Sync {
    /// Returns the credentials for `host`, or `None` for anonymous access.
    fn credentials_for(&self, host: &str) -> Option<Credentials>;
}

/// Never supplies credentials.
#[derive(Debug, Default, Clone, Copy)]
pub struct Anonymous;

impl CredentialProvider for Anonymous {
    fn credentials_for(&self, _host: &str) -> Option<Credentials> {
        None
    }
}

/// An in-memory host -> credentials table that can be updated at runtime.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    by_host: RwLock<HashMap<String, Credentials>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(host: impl Into<String>, credentials: Credentials) -> Self {
        let provider = Self::new();
        provider.set(host, credentials);
        provider
    }

    pub fn set(&self, host: impl Into<String>, credentials: Credentials) {
        self.by_host.write().insert(host.into(), credentials);
    }

    pub fn remove(&self, host: &str) -> Option<Credentials> {
        self.by_host.write().remove(host)
    }
}

impl CredentialProvider for StaticCredentials {
    fn credentials_for(&self, host: &str) -> Option<Credentials> {
        self.by_host.read().get(host).cloned()
    }
}
