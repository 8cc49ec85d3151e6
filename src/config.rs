//! Configuration loading
//!
//! Settings come from an optional TOML file overlaid with `CLAWDBOT_*`
//! environment variables, e.g. `CLAWDBOT_API__API_KEY`.

use crate::error::{DashboardError, Result};
use crate::types::{MetricType, TradeStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub firestore: FirestoreConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Backend HTTP API
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Direct document store access
#[derive(Clone, Serialize, Deserialize)]
pub struct FirestoreConfig {
    #[serde(default = "default_project_id")]
    pub project_id: String,
    #[serde(default = "default_database")]
    pub database: String,
    /// Web API key, sent as the `key` query parameter when set
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_firestore_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Overview page and alert thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
    #[serde(default = "default_trade_status")]
    pub trade_status: TradeStatus,
    #[serde(default = "default_metric_type")]
    pub metric_type: MetricType,
    #[serde(default = "default_latency_threshold_ms")]
    pub latency_threshold_ms: f64,
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
}

fn default_api_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_project_id() -> String {
    "openslaver".to_string()
}

fn default_database() -> String {
    "(default)".to_string()
}

fn default_firestore_url() -> String {
    "https://firestore.googleapis.com".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_recent_limit() -> usize {
    10
}

fn default_trade_status() -> TradeStatus {
    TradeStatus::Open
}

fn default_metric_type() -> MetricType {
    MetricType::Latency
}

fn default_latency_threshold_ms() -> f64 {
    3000.0
}

fn default_max_open_positions() -> usize {
    4
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for FirestoreConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            database: default_database(),
            api_key: None,
            base_url: default_firestore_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            recent_limit: default_recent_limit(),
            trade_status: default_trade_status(),
            metric_type: default_metric_type(),
            latency_threshold_ms: default_latency_threshold_ms(),
            max_open_positions: default_max_open_positions(),
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl fmt::Debug for FirestoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

impl Config {
    /// Load from `path` (missing file is fine) and the environment
    pub fn load(path: &str) -> Result<Self> {
        let path = shellexpand::tilde(path).into_owned();

        let settings = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("CLAWDBOT")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(DashboardError::Config("api.base_url is empty".into()));
        }
        if self.firestore.project_id.trim().is_empty() {
            return Err(DashboardError::Config("firestore.project_id is empty".into()));
        }
        if self.firestore.base_url.trim().is_empty() {
            return Err(DashboardError::Config("firestore.base_url is empty".into()));
        }
        if self.dashboard.recent_limit == 0 {
            return Err(DashboardError::Config(
                "dashboard.recent_limit must be positive".into(),
            ));
        }
        Ok(())
    }
}
