//! Document store abstraction.
//!
//! Collections of schemaless JSON documents keyed by store-assigned ids, with
//! point reads, filtered queries and query-level push subscriptions.

pub mod migrations;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use sqlite::SqliteStore;

pub type Fields = Map<String, Value>;

/// Result of one listener read: the full matching result set, or the failure
/// that ended the listener.
pub type Snapshot = Result<Vec<Document>, StoreError>;

const SERVER_TIMESTAMP_KEY: &str = "$serverTimestamp";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("{collection}/{id} changed concurrently: {field} no longer matches")]
    Conflict {
        collection: String,
        id: String,
        field: String,
    },

    #[error("malformed document: {0}")]
    Malformed(String),

    #[error("store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Value },
    ArrayContains { field: String, value: Value },
}

/// A conjunctive query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filters: Vec::new(),
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn where_array_contains(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::ArrayContains {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }
}

/// Placeholder the store replaces with its own commit time when the write is
/// applied. Only recognised as a top-level field value.
pub fn server_timestamp() -> Value {
    json!({ SERVER_TIMESTAMP_KEY: true })
}

pub(crate) fn is_server_timestamp(value: &Value) -> bool {
    value
        .as_object()
        .map(|obj| obj.len() == 1 && obj.contains_key(SERVER_TIMESTAMP_KEY))
        .unwrap_or(false)
}

/// Live subscription to a query. Yields the initial result set and then a
/// fresh full result set after every write that touches the collection.
/// Dropping the listener detaches it from the store.
pub struct Listener {
    rx: mpsc::UnboundedReceiver<Snapshot>,
    task: JoinHandle<()>,
}

impl Listener {
    pub fn new(rx: mpsc::UnboundedReceiver<Snapshot>, task: JoinHandle<()>) -> Self {
        Self { rx, task }
    }

    /// Next snapshot, or `None` once the listener has closed. A listener
    /// closes right after delivering an error.
    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document under a store-assigned id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<Document, StoreError>;

    /// Create or overwrite a document at a caller-chosen id. With `merge`,
    /// top-level fields are merged into an existing document instead.
    async fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        merge: bool,
    ) -> Result<Document, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Merge top-level fields into an existing document. Fails with
    /// [`StoreError::NotFound`] when the id does not exist.
    async fn update(&self, collection: &str, id: &str, fields: Fields)
        -> Result<Document, StoreError>;

    /// Like [`update`](Self::update), but only applied while `field` still
    /// holds `expected`; otherwise fails with [`StoreError::Conflict`] and
    /// writes nothing.
    async fn update_if(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        expected: &Value,
        fields: Fields,
    ) -> Result<Document, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    fn listen(&self, query: Query) -> Listener;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_timestamp_sentinel() {
        assert!(is_server_timestamp(&server_timestamp()));
        assert!(!is_server_timestamp(&json!("2025-01-01T00:00:00Z")));
        assert!(!is_server_timestamp(&json!({"$serverTimestamp": true, "x": 1})));
    }

    #[test]
    fn test_query_builder() {
        let q = Query::collection("partners")
            .where_eq("availability", "online")
            .where_array_contains("services", "svc-1");
        assert_eq!(q.collection, "partners");
        assert_eq!(q.filters.len(), 2);
        assert!(matches!(&q.filters[1], Filter::ArrayContains { field, .. } if field == "services"));
    }
}
