//! Database and collection handles over a [`DocumentClient`].
//!
//! Handles are only constructible once provisioning has finished:
//! [`Database::connect`] resolves after the database exists, and
//! [`Database::collection`] after the collection exists. There is no
//! "not ready yet" state to queue against.

use crate::ast::{FilterSpec, QueryOptions};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::query_builder::{query_by_property, QueryBuilder, SqlQuerySpec};
use crate::store::{self_link, CollectionSpec, Document, DocumentClient, RequestOptions};
use serde_json::Value;
use std::sync::Arc;

/// Pick the single match of an id lookup, or `None` when there is none.
fn single_match(mut found: Vec<Document>, kind: &str) -> StoreResult<Option<Document>> {
    match found.len() {
        0 => Ok(None),
        1 => Ok(found.pop()),
        _ => Err(StoreError::InvariantViolation(format!("found more than one {}", kind))),
    }
}

fn require_self(resource: &Document, kind: &str) -> StoreResult<String> {
    self_link(resource)
        .map(str::to_string)
        .ok_or_else(|| StoreError::InvariantViolation(format!("{} must have a _self reference", kind)))
}

/// A provisioned database
pub struct Database<C> {
    client: Arc<C>,
    config: Arc<StoreConfig>,
    resource: Document,
    link: String,
}

impl<C: DocumentClient> Database<C> {
    /// Validate `config`, then find the database by id or create it.
    pub async fn connect(client: C, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let client = Arc::new(client);

        let query = query_by_property("id", config.database_id.as_str());
        let found = client
            .query_databases(&query)
            .await
            .map_err(StoreError::Transport)?;

        let resource = match single_match(found, "database")? {
            Some(db) => {
                tracing::debug!(database = %config.database_id, "found existing database");
                db
            }
            None => {
                tracing::debug!(database = %config.database_id, "creating database");
                let mut body = Document::new();
                body.insert("id".to_string(), Value::String(config.database_id.clone()));
                let options = RequestOptions {
                    consistency_level: Some(config.consistency_level),
                    ..Default::default()
                };
                client
                    .create_database(body, &options)
                    .await
                    .map_err(StoreError::Transport)?
            }
        };

        let link = require_self(&resource, "database")?;
        Ok(Self {
            client,
            config: Arc::new(config),
            resource,
            link,
        })
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn resource(&self) -> &Document {
        &self.resource
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Find the collection by id inside this database or create it.
    pub async fn collection(&self, id: &str) -> StoreResult<Collection<C>> {
        if id.is_empty() {
            return Err(StoreError::InvalidArgument("missing collection id".to_string()));
        }

        let query = query_by_property("id", id);
        let found = self
            .client
            .query_collections(&self.link, &query)
            .await
            .map_err(StoreError::Transport)?;

        let resource = match single_match(found, "collection")? {
            Some(coll) => {
                tracing::debug!(collection = id, "found existing collection");
                coll
            }
            None => {
                tracing::debug!(collection = id, "creating collection");
                let spec = CollectionSpec {
                    id: id.to_string(),
                    indexing_policy: self.config.collection.indexing_policy.clone(),
                };
                let options = RequestOptions {
                    offer_type: Some(self.config.collection.offer_type.clone()),
                    ..Default::default()
                };
                self.client
                    .create_collection(&self.link, &spec, &options)
                    .await
                    .map_err(StoreError::Transport)?
            }
        };

        let link = require_self(&resource, "collection")?;
        let builder = match self.config.data_attribute() {
            Some(attribute) => QueryBuilder::with_data_attribute(attribute),
            None => QueryBuilder::new(),
        };

        Ok(Collection {
            client: Arc::clone(&self.client),
            config: Arc::clone(&self.config),
            id: id.to_string(),
            resource,
            link,
            builder,
        })
    }
}

/// A provisioned collection with CRUD and query operations
pub struct Collection<C> {
    client: Arc<C>,
    config: Arc<StoreConfig>,
    id: String,
    resource: Document,
    link: String,
    builder: QueryBuilder,
}

impl<C: DocumentClient> Collection<C> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn resource(&self) -> &Document {
        &self.resource
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Fetch the document whose id property equals `id`.
    pub async fn get(&self, id: &str) -> StoreResult<Document> {
        let query = query_by_property(&self.config.id_property, id);
        let mut found = self.sql_query(&query).await?;
        match found.len() {
            0 => Err(StoreError::NotFound { id: id.to_string() }),
            1 => Ok(found.remove(0)),
            n => Err(StoreError::InvariantViolation(format!(
                "expected one document for id {}, found {}",
                id, n
            ))),
        }
    }

    /// Create a document under `id`, or replace it when `doc` carries a
    /// `_self` link from an earlier read.
    pub async fn put(&self, id: &str, doc: Document) -> StoreResult<Document> {
        if let Some(link) = self_link(&doc).map(str::to_string) {
            let stored_id = doc.get(&self.config.id_property).and_then(Value::as_str);
            if stored_id != Some(id) {
                return Err(StoreError::InvariantViolation(
                    "key does not match in document".to_string(),
                ));
            }
            tracing::trace!(collection = %self.id, id, "replacing document");
            return self
                .client
                .replace_document(&link, doc)
                .await
                .map_err(StoreError::Transport);
        }

        let body = self.document_body(id, doc);
        tracing::trace!(collection = %self.id, id, "creating document");
        self.client
            .create_document(&self.link, body)
            .await
            .map_err(StoreError::Transport)
    }

    /// Replace the stored document `id` with `doc`.
    pub async fn update(&self, id: &str, doc: Document) -> StoreResult<Document> {
        let existing = self.get(id).await?;
        let link = require_self(&existing, "document")?;
        let body = self.document_body(id, doc);
        self.client
            .replace_document(&link, body)
            .await
            .map_err(StoreError::Transport)
    }

    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let existing = self.get(id).await?;
        let link = require_self(&existing, "document")?;
        self.client
            .delete_document(&link)
            .await
            .map_err(StoreError::Transport)
    }

    /// Run a filter query. The store has no native offset, so `LIMIT + OFFSET`
    /// rows are fetched and the first `OFFSET` dropped here.
    pub async fn query(&self, filter: &FilterSpec, options: &QueryOptions) -> StoreResult<Vec<Document>> {
        let query = self.builder.build(filter, options);
        let mut rows = self.sql_query(&query).await?;

        // An offset at or past the end leaves the rows untouched.
        let offset = usize::try_from(options.offset()).unwrap_or(usize::MAX);
        if offset > 0 && offset < rows.len() {
            rows.drain(..offset);
        }
        Ok(rows)
    }

    /// [`query`](Self::query) with the filter and options given as JSON.
    pub async fn query_json(&self, filter: &Value, options: &Value) -> StoreResult<Vec<Document>> {
        let filter = FilterSpec::from_json(filter)?;
        let options = QueryOptions::from_json(options)?;
        self.query(&filter, &options).await
    }

    pub async fn sql_query(&self, query: &SqlQuerySpec) -> StoreResult<Vec<Document>> {
        tracing::trace!(collection = %self.id, query = %query.query, "querying documents");
        self.client
            .query_documents(&self.link, query)
            .await
            .map_err(StoreError::Transport)
    }

    /// The stored form of a user document: the id property set at the root,
    /// with user fields either beside it or under the data attribute.
    fn document_body(&self, id: &str, doc: Document) -> Document {
        let id_value = Value::String(id.to_string());
        match self.config.data_attribute() {
            Some(attribute) => {
                let mut body = Document::new();
                body.insert(self.config.id_property.clone(), id_value);
                body.insert(attribute.to_string(), Value::Object(doc));
                body
            }
            None => {
                let mut body = doc;
                body.insert(self.config.id_property.clone(), id_value);
                body
            }
        }
    }
}
