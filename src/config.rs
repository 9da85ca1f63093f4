// src/config.rs

//! Cache configuration: loading from TOML and validation.

use crate::core::key::normalize_endpoint;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Version string baked in by `build.rs`.
pub const VERSION: &str = env!("TABLECACHE_BUILD_VERSION");

/// Settings for one cache instance. Credentials are not part of this; they
/// come from a `CredentialProvider`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CacheConfig {
    /// The remote endpoint tables are fetched from.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Root directory for the validator table and payload files.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// The maximum number of cached payloads. `0` means no limit.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    crate::core::key::DEFAULT_ENDPOINT.to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("tablecache_data")
}
fn default_max_entries() -> usize {
    100
}
fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_read_timeout() -> Duration {
    Duration::from_secs(60)
}
fn default_user_agent() -> String {
    format!("tablecache/{VERSION}")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache_dir: default_cache_dir(),
            max_entries: default_max_entries(),
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl CacheConfig {
    /// Reads and validates a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: CacheConfig =
            toml::from_str(contents).context("Failed to parse TOML")?;
        config.base_url = normalize_endpoint(&config.base_url);
        config.validate()?;
        Ok(config)
    }

    /// The parsed endpoint URL, always ending in `/`.
    pub fn endpoint(&self) -> Result<Url> {
        Url::parse(&normalize_endpoint(&self.base_url))
            .with_context(|| format!("base_url '{}' is not a valid URL", self.base_url))
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        let endpoint = self.endpoint()?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "base_url must use http or https, got '{}'",
                endpoint.scheme()
            ));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(anyhow!("cache_dir cannot be empty"));
        }
        if self.connect_timeout.is_zero() {
            return Err(anyhow!("connect_timeout cannot be 0"));
        }
        if self.read_timeout.is_zero() {
            return Err(anyhow!("read_timeout cannot be 0"));
        }
        if self.user_agent.trim().is_empty() {
            return Err(anyhow!("user_agent cannot be empty"));
        }
        Ok(())
    }
}
