//! Run configuration.
//!
//! Loaded from a JSON file; every field has a default so partial files are
//! accepted.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::partition::validate_worker_count;
use crate::proxy::{PoolSettings, ProxyConfig};
use crate::{DorkError, QueryGenerator, Result};

/// Where the proxy list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProxySource {
    /// Proxies listed in the configuration.
    #[default]
    StaticList,
    /// Proxies fetched from an HTTP endpoint.
    RemoteEndpoint,
}

/// Proxy source and health policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySourceConfig {
    /// Source kind.
    #[serde(default)]
    pub source: ProxySource,
    /// Proxies for `static-list`, as `host:port` or proxy URLs.
    #[serde(default)]
    pub proxies: Vec<String>,
    /// Endpoint for `remote-endpoint`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Seconds between list refreshes, 0 never refreshes.
    #[serde(default)]
    pub refresh_interval_seconds: u64,
    /// Consecutive failures before a proxy is quarantined.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Quarantine duration in seconds.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_cooldown_seconds() -> u64 {
    300
}

impl Default for ProxySourceConfig {
    fn default() -> Self {
        Self {
            source: ProxySource::StaticList,
            proxies: Vec::new(),
            endpoint: None,
            refresh_interval_seconds: 0,
            failure_threshold: default_failure_threshold(),
            cooldown_seconds: default_cooldown_seconds(),
        }
    }
}

impl ProxySourceConfig {
    /// Checks the health policy and source settings.
    ///
    /// An empty static list is not rejected here; the pool reports it as
    /// an initialization failure.
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(DorkError::Config("failure_threshold must be at least 1".into()));
        }
        if self.source == ProxySource::RemoteEndpoint && self.remote_endpoint().is_none() {
            return Err(DorkError::Config("remote-endpoint source needs an endpoint".into()));
        }
        Ok(())
    }

    /// Returns the configured endpoint, if non-empty.
    pub fn remote_endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref().filter(|e| !e.trim().is_empty())
    }

    /// Parses the static proxy list.
    pub fn static_proxies(&self) -> Result<Vec<ProxyConfig>> {
        self.proxies.iter().map(|p| ProxyConfig::parse(p)).collect()
    }

    /// Health policy for the pool.
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            failure_threshold: self.failure_threshold,
            cooldown: Duration::from_secs(self.cooldown_seconds),
            refresh_interval: (self.refresh_interval_seconds > 0)
                .then(|| Duration::from_secs(self.refresh_interval_seconds)),
        }
    }
}

/// Outbound request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Search endpoint queried with `?q=`.
    #[serde(default = "default_search_url")]
    pub search_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Results requested per page.
    #[serde(default = "default_results_per_page")]
    pub results_per_page: u32,
}

fn default_search_url() -> String {
    "https://www.google.com/search".to_string()
}

fn default_timeout_seconds() -> u64 {
    15
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string()
}

fn default_results_per_page() -> u32 {
    10
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            search_url: default_search_url(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: default_user_agent(),
            results_per_page: default_results_per_page(),
        }
    }
}

impl RequestConfig {
    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Checks the request settings.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_seconds == 0 {
            return Err(DorkError::Config("timeout_seconds must be at least 1".into()));
        }
        if self.search_url.trim().is_empty() {
            return Err(DorkError::Config("search_url cannot be empty".into()));
        }
        Ok(())
    }
}

/// Full configuration for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DorkConfig {
    /// Number of parallel workers.
    #[serde(default = "default_workers")]
    pub workers: i64,
    /// Proxy source.
    #[serde(default)]
    pub proxy: ProxySourceConfig,
    /// Request settings.
    #[serde(default)]
    pub request: RequestConfig,
    /// Custom query templates; the built-in set is used when empty.
    #[serde(default)]
    pub templates: Vec<String>,
}

fn default_workers() -> i64 {
    4
}

impl Default for DorkConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            proxy: ProxySourceConfig::default(),
            request: RequestConfig::default(),
            templates: Vec::new(),
        }
    }
}

impl DorkConfig {
    /// Parses a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DorkError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    /// Checks the configuration before a run.
    pub fn validate(&self) -> Result<()> {
        validate_worker_count(self.workers)?;
        self.request.validate()?;
        self.proxy.validate()
    }

    /// Query generator for the configured templates, or the built-in set
    /// when none are configured.
    pub fn query_generator(&self) -> Result<QueryGenerator> {
        if self.templates.is_empty() {
            Ok(QueryGenerator::new())
        } else {
            QueryGenerator::with_templates(self.templates.iter().cloned())
        }
    }
}
