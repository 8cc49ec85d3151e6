//! Dashboard JSON API
//!
//! Serves the data access layer to a rendering front end. Every read
//! response carries the `source` that served it.

use super::Summary;
use crate::config::DashboardConfig;
use crate::error::DashboardError;
use crate::fallback::{DataAccess, Overview, OverviewRequest, Sourced};
use crate::store::DocumentStore;
use crate::types::{BotConfig, Metric, MetricType, Prediction, Record, Stored, Trade, TradeStatus};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Dashboard state shared across handlers
pub struct DashboardState<S: DocumentStore> {
    pub access: DataAccess<S>,
    pub config: DashboardConfig,
}

impl<S: DocumentStore> DashboardState<S> {
    pub fn new(access: DataAccess<S>, config: DashboardConfig) -> Self {
        Self { access, config }
    }
}

struct HandlerError(DashboardError);

impl From<DashboardError> for HandlerError {
    fn from(e: DashboardError) -> Self {
        Self(e)
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        tracing::error!("Dashboard request failed: {}", self.0);
        (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

type HandlerResult<T> = std::result::Result<Json<T>, HandlerError>;

#[derive(Debug, Deserialize)]
struct PredictionQuery {
    market_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TradeQuery {
    status: Option<TradeStatus>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct MetricQuery {
    metric_type: Option<MetricType>,
    limit: Option<usize>,
}

/// Dashboard summary response
#[derive(Serialize)]
struct SummaryResponse {
    summary: Summary,
    overview: Overview,
}

// ============ HTTP API Handlers ============

/// Health check
async fn health_check() -> &'static str {
    "OK"
}

/// Home page: one overview load plus its headline numbers
async fn get_summary<S: DocumentStore + 'static>(
    State(state): State<Arc<DashboardState<S>>>,
) -> HandlerResult<SummaryResponse> {
    let req = OverviewRequest::recent(
        state.config.recent_limit,
        state.config.trade_status,
        state.config.metric_type,
    );
    let overview = state.access.load_overview(&req).await?;
    let summary = Summary::from_overview(&overview, &state.config);
    Ok(Json(SummaryResponse { summary, overview }))
}

async fn get_config<S: DocumentStore + 'static>(
    State(state): State<Arc<DashboardState<S>>>,
) -> HandlerResult<Sourced<Option<BotConfig>>> {
    Ok(Json(state.access.config().await?))
}

async fn put_config<S: DocumentStore + 'static>(
    State(state): State<Arc<DashboardState<S>>>,
    Json(patch): Json<BotConfig>,
) -> HandlerResult<serde_json::Value> {
    let success = state.access.update_config(&patch).await?;
    Ok(Json(json!({ "success": success })))
}

async fn get_predictions<S: DocumentStore + 'static>(
    State(state): State<Arc<DashboardState<S>>>,
    Query(q): Query<PredictionQuery>,
) -> HandlerResult<Sourced<Vec<Stored<Prediction>>>> {
    let limit = q.limit.unwrap_or(Prediction::DEFAULT_LIMIT);
    Ok(Json(
        state
            .access
            .predictions(q.market_id.as_deref(), limit)
            .await?,
    ))
}

async fn get_trades<S: DocumentStore + 'static>(
    State(state): State<Arc<DashboardState<S>>>,
    Query(q): Query<TradeQuery>,
) -> HandlerResult<Sourced<Vec<Stored<Trade>>>> {
    let limit = q.limit.unwrap_or(Trade::DEFAULT_LIMIT);
    Ok(Json(state.access.trades(q.status, limit).await?))
}

async fn get_metrics<S: DocumentStore + 'static>(
    State(state): State<Arc<DashboardState<S>>>,
    Query(q): Query<MetricQuery>,
) -> HandlerResult<Sourced<Vec<Stored<Metric>>>> {
    let limit = q.limit.unwrap_or(Metric::DEFAULT_LIMIT);
    Ok(Json(state.access.metrics(q.metric_type, limit).await?))
}

/// Create dashboard router
pub fn create_router<S: DocumentStore + 'static>(state: Arc<DashboardState<S>>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/summary", get(get_summary::<S>))
        .route("/config", get(get_config::<S>).put(put_config::<S>))
        .route("/predictions", get(get_predictions::<S>))
        .route("/trades", get(get_trades::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(state)
}

/// Start dashboard server
pub async fn start_dashboard<S: DocumentStore + 'static>(
    state: Arc<DashboardState<S>>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Dashboard server starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiClient, DirectReader};
    use crate::config::ApiConfig;
    use crate::testing::{FakeApi, MemoryStore};
    use serde_json::Value;

    async fn serve() -> (Arc<MemoryStore>, FakeApi, String) {
        let store = Arc::new(MemoryStore::new());
        let api = FakeApi::spawn().await.unwrap();
        let client = ApiClient::new(&ApiConfig {
            base_url: api.base_url(),
            api_key: FakeApi::API_KEY.to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        let access = DataAccess::new(DirectReader::new(store.clone()), client);
        let state = Arc::new(DashboardState::new(access, DashboardConfig::default()));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });

        (store, api, format!("http://{}", addr))
    }

    #[tokio::test]
    async fn test_health() {
        let (_, _, base) = serve().await;
        let body = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_trades_endpoint_reports_source() {
        let (store, _api, base) = serve().await;
        store.insert(
            "trades",
            "t1",
            serde_json::json!({
                "market_id": "m1", "side": "YES", "size": 3.0, "entry_price": 0.6,
                "status": "closing", "pnl": 0.1, "timestamp": "2024-02-01T12:00:00Z"
            }),
        );

        let body: Value = reqwest::get(format!("{}/trades?status=closing&limit=5", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["source"], "direct");
        assert_eq!(body["data"][0]["id"], "t1");
        assert_eq!(body["data"][0]["status"], "closing");
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_api() {
        let (store, api, base) = serve().await;
        store.fail_on("predictions");
        api.store().insert(
            "config",
            "main",
            serde_json::json!({"gateway": {"mode": "cloud", "port": 18789}}),
        );

        let body: Value = reqwest::get(format!("{}/summary", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["summary"]["source"], "api");
        assert_eq!(body["summary"]["gateway_mode"], "cloud");
        assert_eq!(body["overview"]["source"], "api");
    }

    #[tokio::test]
    async fn test_put_config_goes_through_api() {
        let (_, api, base) = serve().await;

        let body: Value = reqwest::Client::new()
            .put(format!("{}/config", base))
            .json(&serde_json::json!({"gateway": {"mode": "local"}}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["success"], true);
        assert!(api.requests().iter().any(|r| r.method == "PUT" && r.path == "/config"));
    }

    #[tokio::test]
    async fn test_upstream_failure_is_bad_gateway() {
        let (store, api, base) = serve().await;
        store.fail_on("metrics");
        api.set_raw_response("metrics", "oops");

        let resp = reqwest::get(format!("{}/metrics", base)).await.unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
    }
}
