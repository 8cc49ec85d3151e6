//! Firestore REST client
//!
//! Read-only: fetches single documents and runs structured queries against
//! the v1 REST API.

use super::value::{decode_fields, encode_value};
use super::{CollectionQuery, Document, DocumentStore};
use crate::config::FirestoreConfig;
use crate::error::{DashboardError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    documents_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RunQueryRow {
    document: Option<RawDocument>,
}

impl FirestoreClient {
    pub fn new(config: &FirestoreConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            documents_url: format!(
                "{}/v1/projects/{}/databases/{}/documents",
                config.base_url.trim_end_matches('/'),
                config.project_id,
                config.database
            ),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    fn key_param(&self) -> Vec<(&'static str, &str)> {
        self.api_key
            .as_deref()
            .map(|k| vec![("key", k)])
            .unwrap_or_default()
    }

    async fn check_status(resp: Response, what: &str) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                DashboardError::PermissionDenied(format!("{}: {} {}", what, status, body))
            }
            StatusCode::NOT_FOUND => DashboardError::NotFound(format!("{}: {}", what, body)),
            _ => DashboardError::Unavailable(format!("{}: {} {}", what, status, body)),
        })
    }
}

/// Build the `structuredQuery` body for a collection query
pub fn structured_query(query: &CollectionQuery) -> Value {
    let mut sq = json!({
        "from": [{ "collectionId": query.collection }],
        "orderBy": [{
            "field": { "fieldPath": query.order_by },
            "direction": "DESCENDING"
        }],
        "limit": query.limit,
    });

    if let Some(filter) = &query.filter {
        sq["where"] = json!({
            "fieldFilter": {
                "field": { "fieldPath": filter.field },
                "op": "EQUAL",
                "value": encode_value(&Value::String(filter.value.clone())),
            }
        });
    }

    json!({ "structuredQuery": sq })
}

/// Whether a 404 body refers to the requested document itself
fn names_document(body: &str, collection: &str, id: &str) -> bool {
    body.contains(&format!("documents/{}/{}", collection, id))
}

fn into_document(raw: RawDocument) -> Result<Document> {
    let id = raw
        .name
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DashboardError::Malformed(format!("bad document name: {}", raw.name)))?
        .to_string();

    Ok(Document {
        id,
        fields: decode_fields(&raw.fields)?,
    })
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let url = format!("{}/{}/{}", self.documents_url, collection, id);
        debug!("Firestore get {}/{}", collection, id);

        let resp = self.http.get(&url).query(&self.key_param()).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            // A missing project or database is also a 404
            let body = resp.text().await.unwrap_or_default();
            if names_document(&body, collection, id) {
                return Ok(None);
            }
            return Err(DashboardError::NotFound(format!("get document: {}", body)));
        }
        let resp = Self::check_status(resp, "get document").await?;

        let bytes = resp.bytes().await?;
        let raw: RawDocument = serde_json::from_slice(&bytes)?;
        into_document(raw).map(Some)
    }

    async fn run_query(&self, query: CollectionQuery) -> Result<Vec<Document>> {
        let url = format!("{}:runQuery", self.documents_url);
        debug!(
            "Firestore query {} (filter: {:?}, limit: {})",
            query.collection, query.filter, query.limit
        );

        let resp = self
            .http
            .post(&url)
            .query(&self.key_param())
            .json(&structured_query(&query))
            .send()
            .await?;
        let resp = Self::check_status(resp, "run query").await?;

        let bytes = resp.bytes().await?;
        let rows: Vec<RunQueryRow> = serde_json::from_slice(&bytes)?;

        // Rows without a document only carry a read time
        rows.into_iter()
            .filter_map(|row| row.document)
            .map(into_document)
            .collect()
    }
}
