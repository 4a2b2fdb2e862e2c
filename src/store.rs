//! Boundary to the document-store client SDK.
//!
//! The gateway only talks to the remote service through [`DocumentClient`];
//! transport, authentication and retries belong to the implementation.

use crate::config::{ConsistencyLevel, IndexingPolicy};
use crate::query_builder::SqlQuerySpec;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// Error type returned by client implementations
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A stored JSON resource: database, collection or document
pub type Document = Map<String, Value>;

/// Property holding a resource's self link
pub const SELF_LINK: &str = "_self";

/// Returns the `_self` link of a resource, if present
pub fn self_link(resource: &Document) -> Option<&str> {
    resource.get(SELF_LINK).and_then(Value::as_str)
}

/// Per-request options forwarded verbatim to the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency_level: Option<ConsistencyLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offer_type: Option<String>,
}

/// Body used to create a collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSpec {
    pub id: String,
    pub indexing_policy: IndexingPolicy,
}

/// Operations the gateway needs from a document-store client
#[async_trait]
pub trait DocumentClient: Send + Sync {
    async fn query_databases(&self, query: &SqlQuerySpec) -> Result<Vec<Document>, BoxError>;

    async fn create_database(
        &self,
        body: Document,
        options: &RequestOptions,
    ) -> Result<Document, BoxError>;

    async fn query_collections(
        &self,
        database_link: &str,
        query: &SqlQuerySpec,
    ) -> Result<Vec<Document>, BoxError>;

    async fn create_collection(
        &self,
        database_link: &str,
        spec: &CollectionSpec,
        options: &RequestOptions,
    ) -> Result<Document, BoxError>;

    async fn query_documents(
        &self,
        collection_link: &str,
        query: &SqlQuerySpec,
    ) -> Result<Vec<Document>, BoxError>;

    async fn create_document(
        &self,
        collection_link: &str,
        body: Document,
    ) -> Result<Document, BoxError>;

    async fn replace_document(
        &self,
        document_link: &str,
        body: Document,
    ) -> Result<Document, BoxError>;

    async fn delete_document(&self, document_link: &str) -> Result<(), BoxError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_self_link() {
        let doc: Document = serde_json::from_value(json!({"_self": "dbs/abc/"})).unwrap();
        assert_eq!(self_link(&doc), Some("dbs/abc/"));
        assert_eq!(self_link(&Document::new()), None);
    }

    #[test]
    fn test_request_options_serialization() {
        let options = RequestOptions {
            consistency_level: Some(ConsistencyLevel::Strong),
            offer_type: None,
        };
        assert_eq!(
            serde_json::to_value(&options).unwrap(),
            json!({"consistencyLevel": "Strong"})
        );
    }

    #[test]
    fn test_collection_spec_serialization() {
        let spec = CollectionSpec {
            id: "dude".to_string(),
            indexing_policy: IndexingPolicy::default(),
        };
        assert_eq!(
            serde_json::to_value(&spec).unwrap(),
            json!({"id": "dude", "indexingPolicy": {"automatic": true, "indexingMode": "Consistent"}})
        );
    }
}
