//! Read-path fallback: direct store first, backend API second
//!
//! Each read tries the direct path once and, on any error, the API path
//! once. The two are never raced. The overview load fails over as a unit:
//! if any of its four direct reads fails, all four are re-read via the API
//! so one page never mixes sources.

use crate::client::{ApiClient, DirectReader};
use crate::error::{DashboardError, Result};
use crate::store::DocumentStore;
use crate::types::{
    BotConfig, DataSource, Metric, MetricType, Prediction, Record, Stored, Trade, TradeStatus,
};
use serde::Serialize;
use std::future::Future;
use tracing::{debug, info, warn};

/// How far back `transition_trade` looks for a trade's latest record
pub const TRADE_HISTORY_LIMIT: usize = 500;

/// A read result tagged with the path that served it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sourced<T> {
    pub source: DataSource,
    pub data: T,
}

/// Run `direct`; if it fails for any reason, run `api` instead.
///
/// The API path's own failure is returned to the caller.
pub async fn with_fallback<T, D, DF, A, AF>(label: &str, direct: D, api: A) -> Result<Sourced<T>>
where
    D: FnOnce() -> DF,
    DF: Future<Output = Result<T>>,
    A: FnOnce() -> AF,
    AF: Future<Output = Result<T>>,
{
    match direct().await {
        Ok(data) => {
            debug!("{} served directly", label);
            Ok(Sourced {
                source: DataSource::Direct,
                data,
            })
        }
        Err(e) => {
            warn!(
                "Direct read of {} failed ({:?}), falling back to API: {}",
                label,
                e.kind(),
                e
            );
            let data = api().await?;
            Ok(Sourced {
                source: DataSource::Api,
                data,
            })
        }
    }
}

/// Filters and bounds for one overview load
#[derive(Debug, Clone)]
pub struct OverviewRequest {
    pub market_id: Option<String>,
    pub prediction_limit: usize,
    pub trade_status: Option<TradeStatus>,
    pub trade_limit: usize,
    pub metric_type: Option<MetricType>,
    pub metric_limit: usize,
}

impl Default for OverviewRequest {
    fn default() -> Self {
        Self {
            market_id: None,
            prediction_limit: Prediction::DEFAULT_LIMIT,
            trade_status: None,
            trade_limit: Trade::DEFAULT_LIMIT,
            metric_type: None,
            metric_limit: Metric::DEFAULT_LIMIT,
        }
    }
}

impl OverviewRequest {
    /// The dashboard home page: recent items, open trades, one metric series
    pub fn recent(limit: usize, trade_status: TradeStatus, metric_type: MetricType) -> Self {
        Self {
            market_id: None,
            prediction_limit: limit,
            trade_status: Some(trade_status),
            trade_limit: limit,
            metric_type: Some(metric_type),
            metric_limit: limit,
        }
    }
}

/// Everything one dashboard page load shows, all from a single source
#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub source: DataSource,
    pub config: Option<BotConfig>,
    pub predictions: Vec<Stored<Prediction>>,
    pub trades: Vec<Stored<Trade>>,
    pub metrics: Vec<Stored<Metric>>,
}

/// Unified data access over both paths
pub struct DataAccess<S: DocumentStore> {
    direct: DirectReader<S>,
    api: ApiClient,
}

impl<S: DocumentStore> Clone for DataAccess<S> {
    fn clone(&self) -> Self {
        Self {
            direct: self.direct.clone(),
            api: self.api.clone(),
        }
    }
}

impl<S: DocumentStore> DataAccess<S> {
    pub fn new(direct: DirectReader<S>, api: ApiClient) -> Self {
        Self { direct, api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn direct(&self) -> &DirectReader<S> {
        &self.direct
    }

    // ============ Reads ============

    pub async fn config(&self) -> Result<Sourced<Option<BotConfig>>> {
        with_fallback(
            "config",
            || self.direct.get_config(),
            || self.api.get_config(),
        )
        .await
    }

    pub async fn list<R: Record>(
        &self,
        filter: Option<&R::Filter>,
        limit: usize,
    ) -> Result<Sourced<Vec<Stored<R>>>> {
        with_fallback(
            R::DOMAIN.collection(),
            || self.direct.list::<R>(filter, limit),
            || self.api.list::<R>(filter, limit),
        )
        .await
    }

    pub async fn predictions(
        &self,
        market_id: Option<&str>,
        limit: usize,
    ) -> Result<Sourced<Vec<Stored<Prediction>>>> {
        let filter = market_id.map(str::to_string);
        self.list::<Prediction>(filter.as_ref(), limit).await
    }

    pub async fn trades(
        &self,
        status: Option<TradeStatus>,
        limit: usize,
    ) -> Result<Sourced<Vec<Stored<Trade>>>> {
        self.list::<Trade>(status.as_ref(), limit).await
    }

    pub async fn metrics(
        &self,
        metric_type: Option<MetricType>,
        limit: usize,
    ) -> Result<Sourced<Vec<Stored<Metric>>>> {
        self.list::<Metric>(metric_type.as_ref(), limit).await
    }

    /// Load all four domains for one page, failing over as a unit
    pub async fn load_overview(&self, req: &OverviewRequest) -> Result<Overview> {
        let market_id = req.market_id.as_deref();

        let (config, predictions, trades, metrics) = tokio::join!(
            self.direct.get_config(),
            self.direct.get_predictions(market_id, req.prediction_limit),
            self.direct.get_trades(req.trade_status, req.trade_limit),
            self.direct.get_metrics(req.metric_type, req.metric_limit),
        );

        match (config, predictions, trades, metrics) {
            (Ok(config), Ok(predictions), Ok(trades), Ok(metrics)) => {
                debug!("Overview served directly");
                return Ok(Overview {
                    source: DataSource::Direct,
                    config,
                    predictions,
                    trades,
                    metrics,
                });
            }
            (config, predictions, trades, metrics) => {
                let failed: Vec<&str> = [
                    ("config", config.is_err()),
                    ("predictions", predictions.is_err()),
                    ("trades", trades.is_err()),
                    ("metrics", metrics.is_err()),
                ]
                .into_iter()
                .filter_map(|(name, err)| err.then_some(name))
                .collect();
                warn!(
                    "Direct overview failed for {:?}, loading all domains via API",
                    failed
                );
            }
        }

        let (config, predictions, trades, metrics) = tokio::join!(
            self.api.get_config(),
            self.api.get_predictions(market_id, req.prediction_limit),
            self.api.get_trades(req.trade_status, req.trade_limit),
            self.api.get_metrics(req.metric_type, req.metric_limit),
        );

        Ok(Overview {
            source: DataSource::Api,
            config: config?,
            predictions: predictions?,
            trades: trades?,
            metrics: metrics?,
        })
    }

    // ============ Writes (API only) ============

    pub async fn update_config(&self, patch: &BotConfig) -> Result<bool> {
        self.api.update_config(patch).await
    }

    /// Save the telegram bot token on top of the current config
    pub async fn save_telegram_token(&self, token: &str) -> Result<bool> {
        let current = self.config().await?.data.unwrap_or_default();
        self.api.set_telegram_token(&current, token).await
    }

    pub async fn create_prediction(&self, prediction: &Prediction) -> Result<Option<String>> {
        self.api.create_prediction(prediction).await
    }

    pub async fn create_trade(&self, trade: &Trade) -> Result<Option<String>> {
        self.api.create_trade(trade).await
    }

    /// Move a trade along open -> closing -> closed.
    ///
    /// Trades are append-only, so the transition is stored as a new record
    /// carrying the same `trade_id`; the newest record is the current state.
    pub async fn transition_trade(
        &self,
        trade_id: &str,
        next: TradeStatus,
        exit_price: Option<f64>,
        pnl: Option<f64>,
    ) -> Result<Option<String>> {
        let history = self.trades(None, TRADE_HISTORY_LIMIT).await?.data;
        let current = history
            .into_iter()
            .find(|t| t.trade_id.as_deref() == Some(trade_id))
            .ok_or_else(|| DashboardError::NotFound(format!("trade {}", trade_id)))?
            .record;

        let from = current.status;
        if !from.can_transition_to(next) {
            return Err(DashboardError::InvalidTransition { from, to: next });
        }

        let updated = Trade {
            status: next,
            exit_price: exit_price.or(current.exit_price),
            pnl: pnl.unwrap_or(current.pnl),
            timestamp: None,
            ..current
        };
        info!("Trade {}: {} -> {}", trade_id, from, next);
        self.api.create_trade(&updated).await
    }

    pub async fn create_metric(&self, metric: &Metric) -> Result<Option<String>> {
        self.api.create_metric(metric).await
    }
}
