//! Convenience layer over a document-database client.
//!
//! - [`query_builder`] turns a JSON-shaped [`FilterSpec`] into a parameterized
//!   query in the store's SQL dialect.
//! - [`gateway`] provisions a database and collection through a
//!   [`DocumentClient`] and forwards CRUD and query calls to it.

pub mod ast;
pub mod config;
pub mod error;
pub mod gateway;
pub mod lexer;
pub mod parser;
pub mod query_builder;
pub mod store;
pub mod token;

pub use ast::{FilterExpr, FilterSpec, QueryOptions, SortOrder};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use gateway::{Collection, Database};
pub use parser::FilterError;
pub use query_builder::{QueryBuilder, SqlParameter, SqlQuerySpec};
pub use store::{Document, DocumentClient};
