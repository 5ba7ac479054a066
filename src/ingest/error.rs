//! Error types for loads
//!
//! Only precondition violations are errors. Per-document failures end up in
//! the [`LoadReport`](crate::ingest::LoadReport).

use crate::error::AppError;
use crate::schema::SchemaError;

/// Result type for load operations
pub type LoadResult<T> = std::result::Result<T, LoadError>;

/// Fatal load errors
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Target index does not exist
    #[error("Cannot load into '{0}': index does not exist")]
    IndexNotFound(String),

    /// Target document type has no mapping
    #[error("Cannot load into '{index}': document type '{doc_type}' is not mapped")]
    TypeNotMapped { index: String, doc_type: String },

    /// Precondition check failed
    #[error(transparent)]
    Schema(SchemaError),
}

impl From<SchemaError> for LoadError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::IndexNotFound(index) => LoadError::IndexNotFound(index),
            SchemaError::TypeNotFound { index, doc_type } => LoadError::TypeNotMapped { index, doc_type },
            other => LoadError::Schema(other),
        }
    }
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Schema(err) => err.into(),
            _ => AppError::NotFound(err.to_string()),
        }
    }
}
