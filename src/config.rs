//! Tap configuration
//!
//! The configuration is a small JSON (or YAML) document:
//!
//! ```json
//! {
//!   "token": "pul-...",
//!   "organizations": ["acme"],
//!   "start_date": "2024-01-01T00:00:00Z",
//!   "requests_cache": { "enabled": true, "config": { "expire_after": 3600 } }
//! }
//! ```
//!
//! Unknown keys are rejected.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default Pulumi Cloud API endpoint
pub const DEFAULT_API_URL: &str = "https://api.pulumi.com";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete tap configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TapConfig {
    /// API token for Pulumi Cloud
    #[serde(default)]
    pub token: Option<String>,

    /// Organizations to sync (root partitions)
    #[serde(default)]
    pub organizations: Option<Vec<String>>,

    /// Earliest datetime to get data from
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,

    /// HTTP response cache settings
    #[serde(default)]
    pub requests_cache: Option<RequestsCacheConfig>,

    /// API base URL (self-hosted installations, tests)
    #[serde(default)]
    pub api_url: Option<String>,
}

/// Response cache configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestsCacheConfig {
    /// Enable requests cache
    #[serde(default)]
    pub enabled: bool,

    /// Cache tuning
    #[serde(default)]
    pub config: CacheSettings,
}

/// Cache tuning values
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    /// Cache expiration time in seconds
    #[serde(default)]
    pub expire_after: Option<u64>,
}

impl TapConfig {
    /// Parse a JSON config string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML config string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file. `.yaml`/`.yml` files are read as YAML,
    /// anything else as JSON.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read config file {}: {e}", path.display())))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Check required fields and value constraints
    pub fn validate(&self) -> Result<()> {
        match self.token.as_deref() {
            None => return Err(Error::missing_field("token")),
            Some(t) if t.trim().is_empty() => {
                return Err(Error::invalid_value("token", "must not be empty"))
            }
            Some(_) => {}
        }

        match &self.organizations {
            None => return Err(Error::missing_field("organizations")),
            Some(orgs) if orgs.is_empty() => {
                return Err(Error::invalid_value(
                    "organizations",
                    "at least one organization is required",
                ))
            }
            Some(orgs) => {
                if orgs.iter().any(|o| o.trim().is_empty()) {
                    return Err(Error::invalid_value(
                        "organizations",
                        "organization names must not be empty",
                    ));
                }
            }
        }

        if let Some(url) = &self.api_url {
            url::Url::parse(url).map_err(|e| Error::invalid_value("api_url", e.to_string()))?;
        }

        Ok(())
    }

    /// The API token. Only valid after `validate()`.
    pub fn token(&self) -> &str {
        self.token.as_deref().unwrap_or_default()
    }

    /// Configured organizations
    pub fn organizations(&self) -> &[String] {
        self.organizations.as_deref().unwrap_or_default()
    }

    /// Effective API base URL
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    /// Whether the response cache should be installed
    pub fn cache_enabled(&self) -> bool {
        self.requests_cache.as_ref().is_some_and(|c| c.enabled)
    }

    /// Cache expiry, `None` meaning entries never expire
    pub fn cache_expire_after(&self) -> Option<Duration> {
        self.requests_cache
            .as_ref()
            .and_then(|c| c.config.expire_after)
            .map(Duration::from_secs)
    }
}
