//! Backend API client
//!
//! Serves every write and the fallback read path. All responses use the
//! `{success, data | id}` envelope; an unsuccessful envelope maps to an empty
//! list or `None`, only transport failures and non-JSON bodies are errors.

use crate::config::ApiConfig;
use crate::error::{DashboardError, Result};
use crate::types::{
    normalize_listing, BotConfig, GatewayMode, Metric, MetricType, Prediction, Record, Stored,
    Trade, TradeStatus,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Response envelope as sent by the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    /// Missing on framework error bodies such as `{"detail": ...}`
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    /// Decode `data` when the call succeeded
    fn into_data<T: DeserializeOwned>(self) -> Result<Option<T>> {
        if !self.success || self.data.is_null() {
            return Ok(None);
        }
        serde_json::from_value(self.data).map(Some).map_err(Into::into)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| DashboardError::Config("api_key is not a valid header value".into()))?;
        headers.insert(API_KEY_HEADER, key);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_json(&self, req: RequestBuilder) -> Result<Value> {
        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        serde_json::from_slice(&bytes).map_err(|e| {
            DashboardError::Malformed(format!("HTTP {} with non-JSON body: {}", status, e))
        })
    }

    async fn send(&self, req: RequestBuilder) -> Result<Envelope> {
        let body = self.send_json(req).await?;
        let envelope: Envelope = serde_json::from_value(body)?;
        if !envelope.success {
            debug!("API reported failure: {:?}", envelope.message);
        }
        Ok(envelope)
    }

    // ============ Config ============

    pub async fn get_config(&self) -> Result<Option<BotConfig>> {
        let envelope = self.send(self.http.get(self.url("config"))).await?;
        envelope.into_data()
    }

    /// Merge-patch the config: fields present overwrite, absent ones are kept
    pub async fn update_config(&self, patch: &BotConfig) -> Result<bool> {
        let envelope = self
            .send(self.http.put(self.url("config")).json(patch))
            .await?;
        if envelope.success {
            info!("Config updated");
        } else {
            warn!("Config update rejected: {:?}", envelope.message);
        }
        Ok(envelope.success)
    }

    /// Credential save: set the telegram bot token, preserving other channels
    pub async fn set_telegram_token(&self, current: &BotConfig, token: &str) -> Result<bool> {
        self.update_config(&current.telegram_token_patch(token)).await
    }

    pub async fn set_gateway(
        &self,
        current: &BotConfig,
        mode: Option<GatewayMode>,
        port: Option<u16>,
    ) -> Result<bool> {
        self.update_config(&current.gateway_patch(mode, port)).await
    }

    // ============ Records ============

    async fn create<R: Record>(&self, record: &R) -> Result<Option<String>> {
        let envelope = self
            .send(self.http.post(self.url(R::DOMAIN.collection())).json(record))
            .await?;
        if envelope.success {
            info!("Created {} record {:?}", R::DOMAIN, envelope.id);
            Ok(envelope.id)
        } else {
            warn!("Create {} rejected: {:?}", R::DOMAIN, envelope.message);
            Ok(None)
        }
    }

    /// List one collection via the API, newest first
    pub async fn list<R: Record>(
        &self,
        filter: Option<&R::Filter>,
        limit: usize,
    ) -> Result<Vec<Stored<R>>> {
        let mut params = vec![("limit", limit.to_string())];
        if let Some(f) = filter {
            params.push((R::FILTER_PARAM, R::filter_value(f)));
        }

        let url = self.url(R::DOMAIN.collection());
        debug!("API list {} {:?}", url, params);

        let envelope = self.send(self.http.get(&url).query(&params)).await?;
        let records: Vec<Stored<R>> = envelope.into_data()?.unwrap_or_default();
        Ok(normalize_listing(records, filter, limit))
    }

    pub async fn create_prediction(&self, prediction: &Prediction) -> Result<Option<String>> {
        self.create(prediction).await
    }

    pub async fn get_predictions(
        &self,
        market_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<Stored<Prediction>>> {
        let filter = market_id.map(str::to_string);
        self.list::<Prediction>(filter.as_ref(), limit).await
    }

    /// Store a trade. The backend requires `trade_id`; a missing one is
    /// filled with a fresh uuid.
    pub async fn create_trade(&self, trade: &Trade) -> Result<Option<String>> {
        if trade.trade_id.as_deref().is_some_and(|id| !id.is_empty()) {
            return self.create(trade).await;
        }
        let trade = Trade {
            trade_id: Some(uuid::Uuid::new_v4().to_string()),
            ..trade.clone()
        };
        self.create(&trade).await
    }

    pub async fn get_trades(
        &self,
        status: Option<TradeStatus>,
        limit: usize,
    ) -> Result<Vec<Stored<Trade>>> {
        self.list::<Trade>(status.as_ref(), limit).await
    }

    pub async fn create_metric(&self, metric: &Metric) -> Result<Option<String>> {
        self.create(metric).await
    }

    pub async fn get_metrics(
        &self,
        metric_type: Option<MetricType>,
        limit: usize,
    ) -> Result<Vec<Stored<Metric>>> {
        self.list::<Metric>(metric_type.as_ref(), limit).await
    }

    // ============ Polyclaw agent ============

    /// Open positions of an external trading agent, passed through as-is
    pub async fn get_polyclaw_positions(&self, agent_id: &str) -> Result<Value> {
        let url = self.url(&format!("polyclaw/{}/positions", agent_id));
        self.send_json(self.http.get(&url)).await
    }

    pub async fn get_polyclaw_trades(&self, agent_id: &str, limit: usize) -> Result<Value> {
        let url = self.url(&format!("polyclaw/{}/trades", agent_id));
        self.send_json(self.http.get(&url).query(&[("limit", limit)]))
            .await
    }

    pub async fn get_polyclaw_metrics(&self, agent_id: &str) -> Result<Value> {
        let url = self.url(&format!("polyclaw/{}/metrics", agent_id));
        self.send_json(self.http.get(&url)).await
    }
}
