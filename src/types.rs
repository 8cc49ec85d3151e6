//! Core record types shared by the direct reader and the API client

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

/// Identifier of the singleton config document
pub const CONFIG_DOCUMENT_ID: &str = "main";

/// Default `source` stamped on predictions by the backend
pub const DEFAULT_PREDICTION_SOURCE: &str = "polywhale";

/// `updated_by` stamp on config uploads from this tool
pub const CONFIG_WRITER: &str = "clawdbot-dashboard";

/// A named record collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Config,
    Predictions,
    Trades,
    Metrics,
}

impl Domain {
    /// Collection name in the document store, also the API path segment
    pub fn collection(&self) -> &'static str {
        match self {
            Domain::Config => "config",
            Domain::Predictions => "predictions",
            Domain::Trades => "trades",
            Domain::Metrics => "metrics",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// Which access path served a read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Direct,
    Api,
}

impl DataSource {
    /// Human label for the dashboard badge
    pub fn badge(&self) -> &'static str {
        match self {
            DataSource::Direct => "Firestore Direct",
            DataSource::Api => "Cloud Run API",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Direct => write!(f, "direct"),
            DataSource::Api => write!(f, "api"),
        }
    }
}

// ============ Config ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayMode {
    Local,
    Cloud,
}

impl FromStr for GatewayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(GatewayMode::Local),
            "cloud" => Ok(GatewayMode::Cloud),
            other => Err(format!("unknown gateway mode: {}", other)),
        }
    }
}

impl fmt::Display for GatewayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayMode::Local => write!(f, "local"),
            GatewayMode::Cloud => write!(f, "cloud"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<GatewayMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelegramChannel {
    #[serde(rename = "botToken", default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("extra", &self.extra)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram: Option<TelegramChannel>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The bot's singleton configuration record.
///
/// Every field is optional so the same type doubles as the merge-patch body
/// for config updates: absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<ChannelsConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BotConfig {
    pub fn gateway_mode(&self) -> Option<GatewayMode> {
        self.gateway.as_ref().and_then(|g| g.mode)
    }

    pub fn gateway_port(&self) -> Option<u16> {
        self.gateway.as_ref().and_then(|g| g.port)
    }

    pub fn telegram_configured(&self) -> bool {
        self.channels
            .as_ref()
            .and_then(|c| c.telegram.as_ref())
            .is_some()
    }

    /// Number of entries under `skills.entries`
    pub fn skills_count(&self) -> usize {
        self.skills
            .as_ref()
            .and_then(|s| s.get("entries"))
            .and_then(|e| e.as_object())
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Patch that replaces the gateway section, keeping fields not being changed
    pub fn gateway_patch(&self, mode: Option<GatewayMode>, port: Option<u16>) -> BotConfig {
        let mut gateway = self.gateway.clone().unwrap_or_default();
        if mode.is_some() {
            gateway.mode = mode;
        }
        if port.is_some() {
            gateway.port = port;
        }
        BotConfig {
            gateway: Some(gateway),
            ..Default::default()
        }
    }

    /// Patch that sets the telegram bot token, keeping the other channels
    pub fn telegram_token_patch(&self, token: &str) -> BotConfig {
        let mut channels = self.channels.clone().unwrap_or_default();
        let mut telegram = channels.telegram.take().unwrap_or_default();
        telegram.bot_token = Some(token.to_string());
        channels.telegram = Some(telegram);
        BotConfig {
            channels: Some(channels),
            ..Default::default()
        }
    }

    /// Upload patch: the sections a local bot config file owns, stamped
    /// with [`CONFIG_WRITER`]
    pub fn sync_patch(&self) -> BotConfig {
        BotConfig {
            gateway: self.gateway.clone(),
            channels: self.channels.clone(),
            skills: self.skills.clone(),
            tools: self.tools.clone(),
            updated_by: Some(CONFIG_WRITER.to_string()),
            ..Default::default()
        }
    }
}

// ============ Listed records ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "HIGH" => Ok(Confidence::High),
            "MEDIUM" => Ok(Confidence::Medium),
            "LOW" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Yes,
    No,
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "YES" => Ok(TradeSide::Yes),
            "NO" => Ok(TradeSide::No),
            other => Err(format!("unknown trade side: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closing,
    Closed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Open => "open",
            TradeStatus::Closing => "closing",
            TradeStatus::Closed => "closed",
        }
    }

    /// Lifecycle is open -> closing -> closed
    pub fn can_transition_to(&self, next: TradeStatus) -> bool {
        matches!(
            (self, next),
            (TradeStatus::Open, TradeStatus::Closing) | (TradeStatus::Closing, TradeStatus::Closed)
        )
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(TradeStatus::Open),
            "closing" => Ok(TradeStatus::Closing),
            "closed" => Ok(TradeStatus::Closed),
            other => Err(format!("unknown trade status: {}", other)),
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Latency,
    Exposure,
    WinRate,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Latency => "latency",
            MetricType::Exposure => "exposure",
            MetricType::WinRate => "win_rate",
        }
    }
}

impl FromStr for MetricType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "latency" => Ok(MetricType::Latency),
            "exposure" => Ok(MetricType::Exposure),
            "win_rate" | "winrate" => Ok(MetricType::WinRate),
            other => Err(format!("unknown metric type: {}", other)),
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model output for a single market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub market_id: String,
    pub market_question: String,
    pub edge: f64,
    pub confidence: Confidence,
    pub decision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub data_sources: Vec<String>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    pub market_id: String,
    pub side: TradeSide,
    pub size: f64,
    pub entry_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<f64>,
    pub status: TradeStatus,
    #[serde(default)]
    pub pnl: f64,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// One sample of an append-only time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, with = "timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A listable record domain: timestamp-ordered, with one equality filter.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    type Filter: Send + Sync;

    const DOMAIN: Domain;
    /// Field the store filters on
    const FILTER_FIELD: &'static str;
    /// Query parameter the API filters on
    const FILTER_PARAM: &'static str;
    const DEFAULT_LIMIT: usize;

    fn timestamp(&self) -> Option<DateTime<Utc>>;
    fn matches(&self, filter: &Self::Filter) -> bool;
    fn filter_value(filter: &Self::Filter) -> String;
}

impl Record for Prediction {
    type Filter = String;

    const DOMAIN: Domain = Domain::Predictions;
    const FILTER_FIELD: &'static str = "market_id";
    const FILTER_PARAM: &'static str = "market_id";
    const DEFAULT_LIMIT: usize = 50;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn matches(&self, filter: &String) -> bool {
        &self.market_id == filter
    }

    fn filter_value(filter: &String) -> String {
        filter.clone()
    }
}

impl Record for Trade {
    type Filter = TradeStatus;

    const DOMAIN: Domain = Domain::Trades;
    const FILTER_FIELD: &'static str = "status";
    const FILTER_PARAM: &'static str = "status";
    const DEFAULT_LIMIT: usize = 50;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn matches(&self, filter: &TradeStatus) -> bool {
        self.status == *filter
    }

    fn filter_value(filter: &TradeStatus) -> String {
        filter.as_str().to_string()
    }
}

impl Record for Metric {
    type Filter = MetricType;

    const DOMAIN: Domain = Domain::Metrics;
    const FILTER_FIELD: &'static str = "type";
    const FILTER_PARAM: &'static str = "metric_type";
    const DEFAULT_LIMIT: usize = 100;

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn matches(&self, filter: &MetricType) -> bool {
        self.metric_type == *filter
    }

    fn filter_value(filter: &MetricType) -> String {
        filter.as_str().to_string()
    }
}

/// A record tagged with its store-assigned identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub record: T,
}

impl<T> Stored<T> {
    pub fn new(id: impl Into<String>, record: T) -> Self {
        Self {
            id: Some(id.into()),
            record,
        }
    }
}

impl<T> Deref for Stored<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}

/// Bring a listing into canonical shape: newest first (undated last),
/// filter applied, at most `limit` records.
pub fn normalize_listing<R: Record>(
    mut records: Vec<Stored<R>>,
    filter: Option<&R::Filter>,
    limit: usize,
) -> Vec<Stored<R>> {
    if let Some(filter) = filter {
        records.retain(|r| r.record.matches(filter));
    }
    records.sort_by(|a, b| b.record.timestamp().cmp(&a.record.timestamp()));
    records.truncate(limit);
    records
}

/// Timestamps arrive as RFC 3339 from the store and as naive ISO 8601 (UTC)
/// from the backend.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(s: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(s) => parse(&s)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s))),
        }
    }
}
