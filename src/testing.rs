//! Test doubles for both access paths
//!
//! [`MemoryStore`] is an in-process document store with the same query
//! semantics as the hosted one. [`FakeApi`] is a local HTTP server speaking
//! the backend's envelope protocol, backed by a `MemoryStore`.

use crate::error::{DashboardError, Result};
use crate::store::{CollectionQuery, Document, DocumentStore};
use crate::types::{timestamp, CONFIG_DOCUMENT_ID, DEFAULT_PREDICTION_SOURCE};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

type Collection = BTreeMap<String, Map<String, Value>>;

/// In-memory document store
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    failing: RwLock<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document. Non-object values are ignored.
    pub fn insert(&self, collection: &str, id: &str, value: Value) {
        if let Value::Object(fields) = value {
            self.collections
                .write()
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), fields);
        }
    }

    /// Overwrite the given top-level fields, creating the document if needed
    pub fn merge(&self, collection: &str, id: &str, patch: Map<String, Value>) {
        let mut collections = self.collections.write();
        let doc = collections
            .entry(collection.to_string())
            .or_default()
            .entry(id.to_string())
            .or_default();
        for (k, v) in patch {
            doc.insert(k, v);
        }
    }

    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    /// Make every access to `collection` fail as if the store were offline
    pub fn fail_on(&self, collection: &str) {
        self.failing.write().insert(collection.to_string());
    }

    pub fn recover(&self, collection: &str) {
        self.failing.write().remove(collection);
    }

    fn check(&self, collection: &str) -> Result<()> {
        if self.failing.read().contains(collection) {
            return Err(DashboardError::Unavailable(format!(
                "{} is offline",
                collection
            )));
        }
        Ok(())
    }
}

fn compare_desc(a: &Value, b: &Value) -> Ordering {
    match (a.as_str(), b.as_str()) {
        (Some(x), Some(y)) => match (timestamp::parse(x), timestamp::parse(y)) {
            (Some(tx), Some(ty)) => ty.cmp(&tx),
            _ => y.cmp(x),
        },
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.check(collection)?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn run_query(&self, query: CollectionQuery) -> Result<Vec<Document>> {
        self.check(&query.collection)?;
        let collections = self.collections.read();
        let Some(collection) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        // Like the hosted store, documents lacking the order field are excluded
        let mut docs: Vec<Document> = collection
            .iter()
            .filter(|(_, fields)| fields.contains_key(&query.order_by))
            .filter(|(_, fields)| match &query.filter {
                Some(f) => fields.get(&f.field).and_then(Value::as_str) == Some(f.value.as_str()),
                None => true,
            })
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect();

        docs.sort_by(|a, b| compare_desc(&a.fields[&query.order_by], &b.fields[&query.order_by]));
        docs.truncate(query.limit);
        Ok(docs)
    }
}

// ============ Fake backend API ============

/// A request as seen by [`FakeApi`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
enum Canned {
    Json(Value),
    Raw(String),
}

#[derive(Default)]
struct FakeState {
    store: MemoryStore,
    canned: RwLock<HashMap<String, Canned>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Local stand-in for the backend HTTP API
#[derive(Clone)]
pub struct FakeApi {
    base_url: String,
    state: Arc<FakeState>,
}

impl FakeApi {
    pub const API_KEY: &'static str = "test-api-key";

    /// Serve on an ephemeral localhost port
    pub async fn spawn() -> Result<Self> {
        let state = Arc::new(FakeState::default());
        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!("Fake API stopped: {}", e);
            }
        });

        Ok(Self {
            base_url: format!("http://{}", addr),
            state,
        })
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    /// Backing store of the fake, for seeding and inspection
    pub fn store(&self) -> &MemoryStore {
        &self.state.store
    }

    /// Answer every request under `/{collection}` with a fixed JSON body
    pub fn set_response(&self, collection: &str, body: Value) {
        self.state
            .canned
            .write()
            .insert(collection.to_string(), Canned::Json(body));
    }

    /// Answer every request under `/{collection}` with a non-JSON body
    pub fn set_raw_response(&self, collection: &str, body: &str) {
        self.state
            .canned
            .write()
            .insert(collection.to_string(), Canned::Raw(body.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }
}

async fn handle(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let api_key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state.requests.lock().push(RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: query.clone(),
        api_key: api_key.clone(),
        body: body.clone(),
    });

    if api_key.as_deref() != Some(FakeApi::API_KEY) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Invalid API key"})),
        )
            .into_response();
    }

    let segments: Vec<&str> = uri.path().trim_matches('/').split('/').collect();
    let collection = segments.first().copied().unwrap_or_default();

    if let Some(canned) = state.canned.read().get(collection).cloned() {
        return match canned {
            Canned::Json(v) => Json(v).into_response(),
            Canned::Raw(s) => (StatusCode::BAD_GATEWAY, s).into_response(),
        };
    }

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["config"]) => {
            let doc = state
                .store
                .get_document("config", CONFIG_DOCUMENT_ID)
                .await
                .ok()
                .flatten();
            Json(json!({"success": true, "data": doc.map(|d| Value::Object(d.fields))}))
                .into_response()
        }
        ("PUT", ["config"]) => {
            let patch = body.as_object().cloned().unwrap_or_default();
            state.store.merge("config", CONFIG_DOCUMENT_ID, patch);
            Json(json!({"success": true, "message": "Config updated"})).into_response()
        }
        ("POST", [name @ ("predictions" | "trades" | "metrics")]) => {
            let mut fields = body.as_object().cloned().unwrap_or_default();
            if *name == "trades" && !fields.get("trade_id").is_some_and(Value::is_string) {
                return (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({"detail": [{"loc": ["body", "trade_id"], "msg": "field required"}]})),
                )
                    .into_response();
            }
            if fields.get("timestamp").map_or(true, Value::is_null) {
                let now = Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f");
                fields.insert("timestamp".into(), json!(now.to_string()));
            }
            if *name == "predictions" && !fields.contains_key("source") {
                fields.insert("source".into(), json!(DEFAULT_PREDICTION_SOURCE));
            }
            let id = uuid::Uuid::new_v4().simple().to_string();
            state.store.insert(name, &id, Value::Object(fields));
            Json(json!({"success": true, "id": id})).into_response()
        }
        ("GET", [name @ ("predictions" | "trades" | "metrics")]) => {
            let (field, param, default_limit) = match *name {
                "predictions" => ("market_id", "market_id", 50),
                "trades" => ("status", "status", 50),
                _ => ("type", "metric_type", 100),
            };
            let limit = query
                .get("limit")
                .and_then(|l| l.parse().ok())
                .unwrap_or(default_limit);
            let mut q = CollectionQuery::new(name, limit);
            if let Some(value) = query.get(param) {
                q = q.with_filter(field, value.clone());
            }
            match state.store.run_query(q).await {
                Ok(docs) => {
                    let data: Vec<Value> = docs.into_iter().map(Document::into_value).collect();
                    Json(json!({"success": true, "data": data})).into_response()
                }
                Err(e) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"detail": e.to_string()})),
                )
                    .into_response(),
            }
        }
        ("GET", ["polyclaw", agent_id, kind]) => {
            let mut payload = Map::new();
            payload.insert("agent_id".into(), json!(agent_id));
            payload.insert(kind.to_string(), json!([]));
            Json(Value::Object(payload)).into_response()
        }
        _ => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))).into_response(),
    }
}
