//! Gateway error types

use crate::config::ConfigError;
use crate::parser::FilterError;
use crate::store::BoxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Did not find document: {id}")]
    NotFound { id: String },

    #[error("Store transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
