//! Document store access
//!
//! The direct read path talks to a hosted document database through the
//! [`DocumentStore`] trait. [`FirestoreClient`] is the production
//! implementation over the Firestore REST API.

pub mod firestore;
pub mod value;

pub use firestore::FirestoreClient;

use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Field every listed collection is ordered by
pub const ORDER_FIELD: &str = "timestamp";

/// A document as returned by the store, fields decoded to plain JSON
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    /// Fields with the document id merged in under `id`
    pub fn into_value(self) -> Value {
        let mut fields = self.fields;
        fields.insert("id".to_string(), Value::String(self.id));
        Value::Object(fields)
    }
}

/// Single-field equality filter
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub value: String,
}

/// A collection query: optional equality filter, newest first, bounded.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    pub collection: String,
    pub filter: Option<FieldFilter>,
    pub order_by: String,
    pub limit: usize,
}

impl CollectionQuery {
    pub fn new(collection: &str, limit: usize) -> Self {
        Self {
            collection: collection.to_string(),
            filter: None,
            order_by: ORDER_FIELD.to_string(),
            limit,
        }
    }

    pub fn with_filter(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filter = Some(FieldFilter {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch one document; `Ok(None)` when it does not exist
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Run a collection query; an empty result is a success
    async fn run_query(&self, query: CollectionQuery) -> Result<Vec<Document>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_into_value_merges_id() {
        let mut fields = Map::new();
        fields.insert("market_id".into(), json!("m1"));
        let doc = Document {
            id: "abc".into(),
            fields,
        };

        assert_eq!(doc.into_value(), json!({"id": "abc", "market_id": "m1"}));
    }

    #[test]
    fn test_query_builder() {
        let q = CollectionQuery::new("trades", 50).with_filter("status", "open");
        assert_eq!(q.collection, "trades");
        assert_eq!(q.order_by, "timestamp");
        assert_eq!(q.limit, 50);
        assert_eq!(
            q.filter,
            Some(FieldFilter {
                field: "status".into(),
                value: "open".into()
            })
        );
    }
}
