//! Tests for the read-path fallback

#[cfg(test)]
mod tests {
    use super::super::fallback::*;
    use crate::client::{ApiClient, DirectReader};
    use crate::config::ApiConfig;
    use crate::error::DashboardError;
    use crate::testing::{FakeApi, MemoryStore};
    use crate::types::{DataSource, MetricType, TradeStatus};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn setup() -> (Arc<MemoryStore>, FakeApi, DataAccess<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let api = FakeApi::spawn().await.unwrap();
        let client = ApiClient::new(&ApiConfig {
            base_url: api.base_url(),
            api_key: FakeApi::API_KEY.to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        let access = DataAccess::new(DirectReader::new(store.clone()), client);
        (store, api, access)
    }

    fn seed(store: &MemoryStore, tag: &str) {
        store.insert(
            "config",
            "main",
            json!({"gateway": {"mode": tag, "port": 18789}}),
        );
        store.insert(
            "predictions",
            &format!("{}-p", tag),
            json!({
                "market_id": "m1", "market_question": format!("{} question", tag),
                "edge": 0.1, "confidence": "HIGH", "decision": "BUY",
                "timestamp": "2024-01-01T00:00:00Z"
            }),
        );
        store.insert(
            "trades",
            &format!("{}-t", tag),
            json!({
                "market_id": "m1", "side": "NO", "size": 5.0, "entry_price": 0.4,
                "status": "open", "pnl": -0.5, "timestamp": "2024-01-01T00:00:00Z"
            }),
        );
        store.insert(
            "metrics",
            &format!("{}-m", tag),
            json!({"type": "latency", "value": 120.0, "timestamp": "2024-01-01T00:00:00Z"}),
        );
    }

    #[tokio::test]
    async fn test_direct_success_skips_api() {
        let api_calls = AtomicUsize::new(0);

        let result = with_fallback(
            "test",
            || async { Ok::<_, DashboardError>(vec![1, 2]) },
            || async {
                api_calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![9])
            },
        )
        .await
        .unwrap();

        assert_eq!(result.source, DataSource::Direct);
        assert_eq!(result.data, vec![1, 2]);
        assert_eq!(api_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_direct_failure_uses_api_result() {
        let result = with_fallback(
            "test",
            || async { Err(DashboardError::PermissionDenied("rules".into())) },
            || async { Ok(vec![9]) },
        )
        .await
        .unwrap();

        assert_eq!(result.source, DataSource::Api);
        assert_eq!(result.data, vec![9]);
    }

    #[tokio::test]
    async fn test_each_path_tried_once() {
        let direct_calls = AtomicUsize::new(0);
        let api_calls = AtomicUsize::new(0);

        let result: crate::error::Result<Sourced<()>> = with_fallback(
            "test",
            || async {
                direct_calls.fetch_add(1, Ordering::SeqCst);
                Err(DashboardError::Unavailable("offline".into()))
            },
            || async {
                api_calls.fetch_add(1, Ordering::SeqCst);
                Err(DashboardError::Malformed("html".into()))
            },
        )
        .await;

        assert!(matches!(result, Err(DashboardError::Malformed(_))));
        assert_eq!(direct_calls.load(Ordering::SeqCst), 1);
        assert_eq!(api_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_direct_result_wins_over_api() {
        let (store, api, access) = setup().await;
        seed(&store, "local");
        seed(api.store(), "cloud");

        let config = access.config().await.unwrap();
        assert_eq!(config.source, DataSource::Direct);
        assert_eq!(config.data.unwrap().gateway_mode().unwrap().to_string(), "local");
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_direct_result_is_not_a_failure() {
        let (_store, api, access) = setup().await;
        seed(api.store(), "cloud");

        let predictions = access.predictions(None, 50).await.unwrap();
        assert_eq!(predictions.source, DataSource::Direct);
        assert!(predictions.data.is_empty());
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_store_falls_back_to_api() {
        let (store, api, access) = setup().await;
        store.fail_on("trades");
        api.set_response(
            "trades",
            json!({"success": true, "data": [{
                "market_id": "m1", "side": "YES", "size": 10, "entry_price": 0.5,
                "status": "open", "pnl": 1.25, "timestamp": "2024-01-01T00:00:00Z"
            }]}),
        );

        let trades = access.trades(Some(TradeStatus::Open), 50).await.unwrap();
        assert_eq!(trades.source, DataSource::Api);
        assert_eq!(trades.data.len(), 1);
        assert_eq!(trades.data[0].pnl, 1.25);

        let requests = api.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query.get("status").map(String::as_str), Some("open"));
        assert_eq!(requests[0].query.get("limit").map(String::as_str), Some("50"));
    }

    #[tokio::test]
    async fn test_overview_all_direct() {
        let (store, api, access) = setup().await;
        seed(&store, "local");

        let overview = access
            .load_overview(&OverviewRequest::recent(10, TradeStatus::Open, MetricType::Latency))
            .await
            .unwrap();

        assert_eq!(overview.source, DataSource::Direct);
        assert!(overview.config.is_some());
        assert_eq!(overview.predictions.len(), 1);
        assert_eq!(overview.trades.len(), 1);
        assert_eq!(overview.metrics.len(), 1);
        assert!(api.requests().is_empty());
    }

    #[tokio::test]
    async fn test_overview_fails_over_as_a_unit() {
        let (store, api, access) = setup().await;
        seed(&store, "local");
        seed(api.store(), "cloud");
        store.fail_on("metrics");

        let overview = access
            .load_overview(&OverviewRequest::recent(10, TradeStatus::Open, MetricType::Latency))
            .await
            .unwrap();

        // Domains whose direct read succeeded are still served by the API
        assert_eq!(overview.source, DataSource::Api);
        assert_eq!(
            overview.config.unwrap().gateway_mode().unwrap().to_string(),
            "cloud"
        );
        assert_eq!(overview.predictions[0].id.as_deref(), Some("cloud-p"));
        assert_eq!(overview.trades[0].id.as_deref(), Some("cloud-t"));
        assert_eq!(overview.metrics[0].id.as_deref(), Some("cloud-m"));

        let mut paths: Vec<String> = api.requests().into_iter().map(|r| r.path).collect();
        paths.sort();
        assert_eq!(paths, vec!["/config", "/metrics", "/predictions", "/trades"]);
    }

    #[tokio::test]
    async fn test_overview_api_failure_propagates() {
        let (store, api, access) = setup().await;
        store.fail_on("config");
        api.set_raw_response("trades", "upstream timeout");

        let result = access.load_overview(&OverviewRequest::default()).await;
        assert!(matches!(result, Err(DashboardError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_save_telegram_token_merges_into_current_config() {
        let (store, api, access) = setup().await;
        store.insert(
            "config",
            "main",
            json!({"channels": {"discord": {"enabled": true}}}),
        );

        assert!(access.save_telegram_token("123:abc").await.unwrap());

        let puts: Vec<_> = api
            .requests()
            .into_iter()
            .filter(|r| r.method == "PUT")
            .collect();
        assert_eq!(puts.len(), 1);
        assert_eq!(
            puts[0].body,
            json!({"channels": {"discord": {"enabled": true}, "telegram": {"botToken": "123:abc"}}})
        );
    }

    fn seed_trade(store: &MemoryStore, doc_id: &str, status: &str, ts: &str) {
        store.insert(
            "trades",
            doc_id,
            json!({
                "trade_id": "tr-1", "market_id": "m1", "side": "YES", "size": 8.0,
                "entry_price": 0.45, "status": status, "pnl": 0.0, "timestamp": ts
            }),
        );
    }

    #[tokio::test]
    async fn test_transition_trade_appends_next_status() {
        let (store, api, access) = setup().await;
        seed_trade(&store, "a", "open", "2024-01-01T00:00:00Z");

        let id = access
            .transition_trade("tr-1", TradeStatus::Closing, Some(0.7), Some(2.0))
            .await
            .unwrap();
        assert!(id.is_some());

        let posts: Vec<_> = api
            .requests()
            .into_iter()
            .filter(|r| r.method == "POST")
            .collect();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].path, "/trades");
        assert_eq!(posts[0].body["trade_id"], json!("tr-1"));
        assert_eq!(posts[0].body["status"], json!("closing"));
        assert_eq!(posts[0].body["exit_price"], json!(0.7));
        assert_eq!(posts[0].body["pnl"], json!(2.0));
    }

    #[tokio::test]
    async fn test_transition_trade_uses_latest_record() {
        let (store, api, access) = setup().await;
        seed_trade(&store, "a", "open", "2024-01-01T00:00:00Z");
        seed_trade(&store, "b", "closing", "2024-01-02T00:00:00Z");

        access
            .transition_trade("tr-1", TradeStatus::Closed, None, None)
            .await
            .unwrap();
        let posts: Vec<_> = api
            .requests()
            .into_iter()
            .filter(|r| r.method == "POST")
            .collect();
        assert_eq!(posts[0].body["status"], json!("closed"));
    }

    #[tokio::test]
    async fn test_transition_trade_rejects_skipped_step() {
        let (store, api, access) = setup().await;
        seed_trade(&store, "a", "open", "2024-01-01T00:00:00Z");

        let err = access
            .transition_trade("tr-1", TradeStatus::Closed, None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DashboardError::InvalidTransition {
                from: TradeStatus::Open,
                to: TradeStatus::Closed
            }
        ));
        assert!(api.requests().iter().all(|r| r.method != "POST"));
    }

    #[tokio::test]
    async fn test_transition_unknown_trade_is_not_found() {
        let (store, _api, access) = setup().await;
        seed_trade(&store, "a", "open", "2024-01-01T00:00:00Z");

        let err = access
            .transition_trade("tr-404", TradeStatus::Closing, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::NotFound(_)));
    }
}
