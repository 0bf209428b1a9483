//! Configuration parsing and validation.
//!
//! Meridian configuration is loaded from a TOML file with CLI overrides.
//! Every field has a default, so an empty file is a valid configuration.

use crate::core::error::StatusMapping;
use crate::core::time::parse_duration;
use crate::net::cors::CorsPolicy;
use anyhow::{Context, Result};
use axum::http::StatusCode;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Top-level Meridian configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener and API behaviour.
    #[serde(default)]
    pub web: WebConfig,

    /// Remote-read limits.
    #[serde(default)]
    pub remote_read: RemoteReadConfig,

    /// Settings shared by every component.
    #[serde(default)]
    pub global: GlobalConfig,

    /// Query evaluation.
    #[serde(default)]
    pub query: QueryConfig,

    /// Local storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// HTTP listener and API behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Bind address (e.g., "0.0.0.0:9090").
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Prefix of every API route.
    #[serde(default = "default_route_prefix")]
    pub route_prefix: String,

    /// Regex matched against the `Origin` header, fully anchored.
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    /// Expose the `/admin/tsdb/*` endpoints.
    #[serde(default)]
    pub enable_admin_api: bool,

    /// HTTP status answered for `unavailable` errors.
    #[serde(default = "default_unavailable_status")]
    pub unavailable_status: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            route_prefix: default_route_prefix(),
            cors_origin: default_cors_origin(),
            enable_admin_api: false,
            unavailable_status: default_unavailable_status(),
        }
    }
}

/// Remote-read limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteReadConfig {
    /// Samples returned per sub-query; 0 disables the limit.
    #[serde(default = "default_sample_limit")]
    pub sample_limit: usize,

    /// Remote-read requests processed concurrently.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
}

impl Default for RemoteReadConfig {
    fn default() -> Self {
        Self {
            sample_limit: default_sample_limit(),
            concurrency_limit: default_concurrency_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Labels attached to every series returned by remote read.
    #[serde(default)]
    pub external_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Staleness window of instant selectors, as a duration literal.
    #[serde(default = "default_lookback_delta")]
    pub lookback_delta: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            lookback_delta: default_lookback_delta(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Data directory; snapshots are created below it.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions

fn default_listen_address() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_route_prefix() -> String {
    crate::api::DEFAULT_ROUTE_PREFIX.to_string()
}

fn default_cors_origin() -> String {
    ".*".to_string()
}

fn default_unavailable_status() -> u16 {
    503
}

fn default_sample_limit() -> usize {
    50_000_000
}

fn default_concurrency_limit() -> usize {
    10
}

fn default_lookback_delta() -> String {
    "5m".to_string()
}

fn default_storage_path() -> String {
    "data".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).with_context(|| "failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref log_level) = overrides.log_level {
            self.telemetry.log_level = log_level.clone();
        }
        if let Some(ref storage_path) = overrides.storage_path {
            self.storage.path = storage_path.clone();
        }
        if let Some(ref listen_address) = overrides.listen_address {
            self.web.listen_address = listen_address.clone();
        }
        if let Some(ref route_prefix) = overrides.route_prefix {
            self.web.route_prefix = route_prefix.clone();
        }
        if overrides.enable_admin_api {
            self.web.enable_admin_api = true;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_web()?;
        self.validate_remote_read()?;
        self.validate_query()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_web(&self) -> Result<()> {
        if self.web.listen_address.is_empty() {
            anyhow::bail!("web.listen_address must not be empty");
        }
        if !self.web.route_prefix.is_empty() && !self.web.route_prefix.starts_with('/') {
            anyhow::bail!(
                "web.route_prefix must start with '/', got: {}",
                self.web.route_prefix
            );
        }
        self.cors_policy()?;
        self.status_mapping()?;
        Ok(())
    }

    fn validate_remote_read(&self) -> Result<()> {
        if self.remote_read.concurrency_limit == 0 {
            anyhow::bail!("remote_read.concurrency_limit must be > 0");
        }
        Ok(())
    }

    fn validate_query(&self) -> Result<()> {
        let lookback = self.lookback_delta()?;
        if lookback <= TimeDelta::zero() {
            anyhow::bail!(
                "query.lookback_delta must be positive, got: {}",
                self.query.lookback_delta
            );
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }

    /// Compiled CORS origin policy.
    pub fn cors_policy(&self) -> Result<CorsPolicy> {
        CorsPolicy::new(&self.web.cors_origin)
            .with_context(|| format!("invalid web.cors_origin: {}", self.web.cors_origin))
    }

    /// Error-kind to HTTP status mapping.
    pub fn status_mapping(&self) -> Result<StatusMapping> {
        let status = StatusCode::from_u16(self.web.unavailable_status).with_context(|| {
            format!(
                "invalid web.unavailable_status: {}",
                self.web.unavailable_status
            )
        })?;
        Ok(StatusMapping::new(status))
    }

    pub fn lookback_delta(&self) -> Result<TimeDelta> {
        parse_duration(&self.query.lookback_delta).map_err(|e| {
            anyhow::anyhow!(
                "invalid query.lookback_delta {:?}: {}",
                self.query.lookback_delta,
                e.message()
            )
        })
    }

    /// Effective settings keyed by their command-line flag names.
    pub fn flags_map(&self) -> BTreeMap<String, String> {
        let flags = [
            ("web.listen-address", self.web.listen_address.clone()),
            ("web.route-prefix", self.web.route_prefix.clone()),
            ("web.cors.origin", self.web.cors_origin.clone()),
            ("web.enable-admin-api", self.web.enable_admin_api.to_string()),
            (
                "storage.remote.read-sample-limit",
                self.remote_read.sample_limit.to_string(),
            ),
            (
                "storage.remote.read-concurrent-limit",
                self.remote_read.concurrency_limit.to_string(),
            ),
            ("query.lookback-delta", self.query.lookback_delta.clone()),
            ("storage.tsdb.path", self.storage.path.clone()),
            ("log.level", self.telemetry.log_level.clone()),
        ];
        flags
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    /// Configuration text as served by `/status/config`.
    pub fn render(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "failed to render config")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub storage_path: Option<String>,
    pub listen_address: Option<String>,
    pub route_prefix: Option<String>,
    pub enable_admin_api: bool,
}
