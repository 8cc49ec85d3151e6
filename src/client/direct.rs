//! Direct reader: dashboard records straight from the document store
//!
//! Issues no writes and keeps no cache. Any store failure surfaces as an
//! error; an empty collection is an empty `Vec`.

use crate::error::{DashboardError, Result};
use crate::store::{CollectionQuery, DocumentStore};
use crate::types::{
    normalize_listing, BotConfig, Domain, Metric, MetricType, Prediction, Record, Stored, Trade,
    TradeStatus, CONFIG_DOCUMENT_ID,
};
use std::sync::Arc;
use tracing::debug;

pub struct DirectReader<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> Clone for DirectReader<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: DocumentStore> DirectReader<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Fetch the singleton config document
    pub async fn get_config(&self) -> Result<Option<BotConfig>> {
        let doc = self
            .store
            .get_document(Domain::Config.collection(), CONFIG_DOCUMENT_ID)
            .await?;

        doc.map(|d| {
            serde_json::from_value(serde_json::Value::Object(d.fields))
                .map_err(|e| DashboardError::Malformed(format!("config document: {}", e)))
        })
        .transpose()
    }

    pub async fn get_predictions(
        &self,
        market_id: Option<&str>,
        max: usize,
    ) -> Result<Vec<Stored<Prediction>>> {
        let filter = market_id.map(str::to_string);
        self.list::<Prediction>(filter.as_ref(), max).await
    }

    pub async fn get_trades(
        &self,
        status: Option<TradeStatus>,
        max: usize,
    ) -> Result<Vec<Stored<Trade>>> {
        self.list::<Trade>(status.as_ref(), max).await
    }

    pub async fn get_metrics(
        &self,
        metric_type: Option<MetricType>,
        max: usize,
    ) -> Result<Vec<Stored<Metric>>> {
        self.list::<Metric>(metric_type.as_ref(), max).await
    }

    /// Query one collection, newest first, tagging each record with its id
    pub async fn list<R: Record>(
        &self,
        filter: Option<&R::Filter>,
        max: usize,
    ) -> Result<Vec<Stored<R>>> {
        let mut query = CollectionQuery::new(R::DOMAIN.collection(), max);
        if let Some(f) = filter {
            query = query.with_filter(R::FILTER_FIELD, R::filter_value(f));
        }

        let docs = self.store.run_query(query).await?;
        debug!("Direct read of {}: {} documents", R::DOMAIN, docs.len());

        let records = docs
            .into_iter()
            .map(|d| {
                let id = d.id.clone();
                serde_json::from_value::<Stored<R>>(d.into_value()).map_err(|e| {
                    DashboardError::Malformed(format!("{} document {}: {}", R::DOMAIN, id, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(normalize_listing(records, filter, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, MockDocumentStore};
    use crate::testing::MemoryStore;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn base_time() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn seeded_store() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        for i in 0..6 {
            let status = if i % 2 == 0 { "open" } else { "closed" };
            store.insert(
                "trades",
                &format!("t{}", i),
                json!({
                    "trade_id": format!("trade-{}", i),
                    "market_id": format!("m{}", i % 3),
                    "side": "YES",
                    "size": 10.0 + i as f64,
                    "entry_price": 0.5,
                    "status": status,
                    "pnl": i as f64 * 0.25,
                    "timestamp": (base_time() + Duration::minutes(i)).to_rfc3339(),
                }),
            );
        }
        for i in 0..4 {
            store.insert(
                "metrics",
                &format!("x{}", i),
                json!({
                    "type": if i < 3 { "latency" } else { "exposure" },
                    "value": 100.0 * i as f64,
                    "component": "executor",
                    "timestamp": (base_time() + Duration::seconds(i)).to_rfc3339(),
                }),
            );
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_missing_config_is_none() {
        let reader = DirectReader::new(Arc::new(MemoryStore::new()));
        assert!(reader.get_config().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_config_document() {
        let store = MemoryStore::new();
        store.insert(
            "config",
            "main",
            json!({"gateway": {"mode": "cloud", "port": 18789}, "channels": {"telegram": {"botToken": "1:a"}}}),
        );
        let reader = DirectReader::new(Arc::new(store));

        let config = reader.get_config().await.unwrap().unwrap();
        assert_eq!(config.gateway_port(), Some(18789));
        assert!(config.telegram_configured());
    }

    #[tokio::test]
    async fn test_trades_ordered_filtered_bounded() {
        let reader = DirectReader::new(seeded_store());

        let trades = reader.get_trades(Some(TradeStatus::Open), 2).await.unwrap();
        assert_eq!(trades.len(), 2);
        assert!(trades.iter().all(|t| t.status == TradeStatus::Open));
        assert!(trades[0].timestamp >= trades[1].timestamp);
        assert_eq!(trades[0].id.as_deref(), Some("t4"));
        assert_eq!(trades[0].trade_id.as_deref(), Some("trade-4"));
    }

    #[tokio::test]
    async fn test_metrics_by_type() {
        let reader = DirectReader::new(seeded_store());

        let metrics = reader.get_metrics(Some(MetricType::Latency), 100).await.unwrap();
        assert_eq!(metrics.len(), 3);
        assert!(metrics.iter().all(|m| m.metric_type == MetricType::Latency));
        assert_eq!(metrics[0].value, 200.0);
    }

    #[tokio::test]
    async fn test_empty_collection_is_success() {
        let reader = DirectReader::new(seeded_store());
        let predictions = reader.get_predictions(None, 50).await.unwrap();
        assert!(predictions.is_empty());
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let mut store = MockDocumentStore::new();
        store
            .expect_run_query()
            .returning(|_| Err(DashboardError::Unavailable("offline".into())));
        let reader = DirectReader::new(Arc::new(store));

        let err = reader.get_predictions(Some("m1"), 10).await.unwrap_err();
        assert!(matches!(err, DashboardError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_query_carries_filter_and_limit() {
        let mut store = MockDocumentStore::new();
        store
            .expect_run_query()
            .withf(|q| {
                q.collection == "predictions"
                    && q.limit == 7
                    && q.filter.as_ref().map(|f| (f.field.as_str(), f.value.as_str()))
                        == Some(("market_id", "m9"))
            })
            .times(1)
            .returning(|_| Ok(vec![]));
        let reader = DirectReader::new(Arc::new(store));

        assert!(reader.get_predictions(Some("m9"), 7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_malformed() {
        let mut store = MockDocumentStore::new();
        store.expect_run_query().returning(|_| {
            let mut fields = serde_json::Map::new();
            fields.insert("type".into(), json!("latency"));
            fields.insert("value".into(), json!("not a number"));
            Ok(vec![Document {
                id: "bad".into(),
                fields,
            }])
        });
        let reader = DirectReader::new(Arc::new(store));

        let err = reader.get_metrics(None, 10).await.unwrap_err();
        assert!(matches!(err, DashboardError::Malformed(_)));
    }
}
