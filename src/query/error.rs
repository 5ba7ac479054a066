//! Error types for query execution

use crate::engine::TransportError;
use crate::error::AppError;
use crate::schema::SchemaError;

/// Result type for query operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// Query errors
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The field is mapped in a way the query cannot use
    #[error("Field '{field}' of '{index}' cannot serve a {query} query: needs {expected}, mapped as {actual}")]
    SchemaMismatch {
        index: String,
        field: String,
        query: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// The field is not mapped
    #[error("Field '{field}' is not mapped in '{index}'{}", .doc_type.as_ref().map(|t| format!(" for type '{}'", t)).unwrap_or_default())]
    UnknownField {
        index: String,
        doc_type: Option<String>,
        field: String,
    },

    /// Explain target does not exist
    #[error("Document '{id}' of type '{doc_type}' does not exist in '{index}'")]
    DocumentNotFound {
        index: String,
        doc_type: String,
        id: String,
    },

    /// Index missing or live mapping unreadable
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Network, timeout, or engine refusal
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response shape was not what the query asked for
    #[error("Unexpected engine response: {0}")]
    Decode(String),
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::SchemaMismatch { .. } => AppError::SchemaMismatch(err.to_string()),
            QueryError::UnknownField { .. } | QueryError::DocumentNotFound { .. } => {
                AppError::NotFound(err.to_string())
            }
            QueryError::Schema(err) => err.into(),
            QueryError::Transport(err) => err.into(),
            QueryError::Decode(msg) => AppError::Serialization(msg),
        }
    }
}
