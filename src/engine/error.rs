//! Error types for engine transport operations

use crate::error::AppError;

/// Result type for transport operations
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors raised while talking to the search engine
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The request did not complete within its deadline
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The engine could not be reached
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The engine answered with a non-success status
    #[error("Engine returned status {status}: {reason}")]
    Status {
        status: u16,
        error_type: Option<String>,
        reason: String,
    },

    /// The response body could not be decoded
    #[error("Failed to decode engine response: {0}")]
    Decode(String),

    /// The request could not be built or sent
    #[error("Request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// HTTP status reported by the engine, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Engine-side error type (e.g. `mapper_parsing_exception`)
    pub fn error_type(&self) -> Option<&str> {
        match self {
            TransportError::Status { error_type, .. } => error_type.as_deref(),
            _ => None,
        }
    }

    /// Human readable reason without the status prefix
    pub fn reason(&self) -> String {
        match self {
            TransportError::Status { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }

    /// Timeouts, connection failures, throttling and gateway errors may succeed on retry
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Timeout(_) | TransportError::Connection(_) => true,
            TransportError::Status { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            TransportError::Decode(_) | TransportError::Request(_) => false,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Decode(err.to_string())
    }
}

impl From<TransportError> for AppError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Status { status: 404, .. } => AppError::NotFound(err.to_string()),
            _ => AppError::Transport(err.to_string()),
        }
    }
}
