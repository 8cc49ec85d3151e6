//! Dashboard summary and JSON server

pub mod server;

pub use server::{create_router, start_dashboard, DashboardState};

use crate::config::DashboardConfig;
use crate::fallback::Overview;
use crate::types::{DataSource, GatewayMode, MetricType, TradeStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEntry {
    pub severity: AlertSeverity,
    pub category: String,
    pub message: String,
}

/// Headline numbers for the dashboard home page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub source: DataSource,
    pub source_badge: String,
    pub open_positions: usize,
    pub recent_predictions: usize,
    pub metric_samples: usize,
    pub config_present: bool,
    pub gateway_mode: Option<GatewayMode>,
    pub gateway_port: Option<u16>,
    pub telegram_configured: bool,
    pub skills_count: usize,
    /// Sum of open trade sizes
    pub total_exposure: f64,
    pub exposure_by_market: BTreeMap<String, f64>,
    pub total_pnl: f64,
    pub avg_latency_ms: Option<f64>,
    pub alerts: Vec<AlertEntry>,
    pub generated_at: DateTime<Utc>,
}

impl Summary {
    pub fn from_overview(overview: &Overview, config: &DashboardConfig) -> Self {
        let open: Vec<_> = overview
            .trades
            .iter()
            .filter(|t| t.status == TradeStatus::Open)
            .collect();

        let mut exposure_by_market = BTreeMap::new();
        for trade in &open {
            *exposure_by_market
                .entry(trade.market_id.clone())
                .or_insert(0.0) += trade.size;
        }
        let total_exposure: f64 = open.iter().map(|t| t.size).sum();
        let total_pnl: f64 = overview.trades.iter().map(|t| t.pnl).sum();

        let latencies: Vec<f64> = overview
            .metrics
            .iter()
            .filter(|m| m.metric_type == MetricType::Latency)
            .map(|m| m.value)
            .collect();
        let avg_latency_ms = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        let mut alerts = Vec::new();
        let slow = latencies
            .iter()
            .filter(|&&v| v > config.latency_threshold_ms)
            .count();
        if slow > 0 {
            alerts.push(AlertEntry {
                severity: AlertSeverity::Warning,
                category: "latency".to_string(),
                message: format!(
                    "{} latency samples above {:.0}ms",
                    slow, config.latency_threshold_ms
                ),
            });
        }
        if open.len() > config.max_open_positions {
            alerts.push(AlertEntry {
                severity: AlertSeverity::Critical,
                category: "exposure".to_string(),
                message: format!(
                    "{} open positions - review diversification",
                    open.len()
                ),
            });
        }
        if overview.config.is_none() {
            alerts.push(AlertEntry {
                severity: AlertSeverity::Info,
                category: "config".to_string(),
                message: "No bot configuration stored".to_string(),
            });
        }

        let bot = overview.config.as_ref();
        Self {
            source: overview.source,
            source_badge: overview.source.badge().to_string(),
            open_positions: open.len(),
            recent_predictions: overview.predictions.len(),
            metric_samples: overview.metrics.len(),
            config_present: bot.is_some(),
            gateway_mode: bot.and_then(|c| c.gateway_mode()),
            gateway_port: bot.and_then(|c| c.gateway_port()),
            telegram_configured: bot.map(|c| c.telegram_configured()).unwrap_or(false),
            skills_count: bot.map(|c| c.skills_count()).unwrap_or(0),
            total_exposure,
            exposure_by_market,
            total_pnl,
            avg_latency_ms,
            alerts,
            generated_at: Utc::now(),
        }
    }
}
