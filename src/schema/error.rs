//! Error types for index and mapping management

use crate::analysis::ConfigError;
use crate::engine::TransportError;
use crate::error::AppError;

/// Result type for schema operations
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

/// Schema management errors
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// Index does not exist
    #[error("Index '{0}' does not exist")]
    IndexNotFound(String),

    /// Document type is not mapped in the index
    #[error("Document type '{doc_type}' is not mapped in index '{index}'")]
    TypeNotFound { index: String, doc_type: String },

    /// Engine refused an index or mapping operation
    #[error("Engine rejected {operation} on '{index}': {reason}")]
    Rejected {
        index: String,
        operation: &'static str,
        status: Option<u16>,
        reason: String,
    },

    /// Field already mapped with an incompatible definition
    #[error("Field '{field}' of '{index}/{doc_type}' is already mapped as {existing}, cannot map it as {requested}")]
    IncompatibleField {
        index: String,
        doc_type: String,
        field: String,
        existing: String,
        requested: String,
    },

    /// Live settings or mapping this crate cannot interpret
    #[error("Cannot interpret live schema of '{index}': {reason}")]
    InvalidLiveMapping { index: String, reason: String },

    /// Local definition error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Network or timeout failure
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SchemaError {
    /// Map an engine failure of `operation`: engine refusals become
    /// [`SchemaError::Rejected`], everything else stays a transport error
    pub(crate) fn from_engine(index: &str, operation: &'static str, err: TransportError) -> Self {
        match err {
            TransportError::Status { status: 404, .. } => SchemaError::IndexNotFound(index.to_string()),
            TransportError::Status { status, .. } => SchemaError::Rejected {
                index: index.to_string(),
                operation,
                status: Some(status),
                reason: match err.error_type() {
                    Some(error_type) => format!("{}: {}", error_type, err.reason()),
                    None => err.reason(),
                },
            },
            other => SchemaError::Transport(other),
        }
    }
}

impl From<SchemaError> for AppError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::IndexNotFound(_) | SchemaError::TypeNotFound { .. } => {
                AppError::NotFound(err.to_string())
            }
            SchemaError::Config(err) => err.into(),
            SchemaError::Transport(err) => err.into(),
            _ => AppError::Schema(err.to_string()),
        }
    }
}
