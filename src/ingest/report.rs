//! Structured outcome of a load

use crate::engine::{BulkItemResult, TransportError};
use crate::ingest::operation::ActionKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// Why a row never became a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "field", rename_all = "snake_case")]
pub enum SkipReason {
    /// A mandatory field was absent, null or not a number
    MissingField(String),
    /// The id extractor produced no id
    MissingId,
}

/// A source row filtered out before submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// Zero-based position of the row in the source
    pub row: usize,
    pub reason: SkipReason,
}

/// Why the engine did not accept a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureDetail {
    pub status: Option<u16>,
    pub error_type: Option<String>,
    pub reason: String,
}

impl From<&TransportError> for FailureDetail {
    fn from(err: &TransportError) -> Self {
        Self {
            status: err.status(),
            error_type: err.error_type().map(str::to_string),
            reason: err.reason(),
        }
    }
}

impl From<&BulkItemResult> for FailureDetail {
    fn from(item: &BulkItemResult) -> Self {
        let (error_type, reason) = item.error_detail();
        Self {
            status: Some(item.status),
            error_type,
            reason,
        }
    }
}

/// A document the engine rejected, with the payload that was sent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadFailure {
    pub id: String,
    pub action: ActionKind,
    pub payload: Option<Value>,
    pub error: FailureDetail,
    /// Requests made for this document, aggregate submission included
    pub attempts: u32,
}

/// Outcome of [`BulkLoader::load`](crate::ingest::BulkLoader::load) or
/// [`BulkLoader::apply`](crate::ingest::BulkLoader::apply)
///
/// Partial failure is data, not an error: a load that wrote nine documents
/// out of ten completed with one failure.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub load_id: Uuid,
    pub index: String,
    pub succeeded: usize,
    pub skipped: Vec<SkippedRow>,
    pub failures: Vec<LoadFailure>,
    /// Ids never submitted because the load was cancelled
    pub not_attempted: Vec<String>,
    /// Aggregate submissions made
    pub batches: usize,
    /// Aggregate submissions that fell back to per-document writes, in whole or in part
    pub fallback_batches: usize,
    /// Documents that needed more than one request
    pub retried: usize,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl LoadReport {
    pub(crate) fn new(index: impl Into<String>) -> Self {
        Self {
            load_id: Uuid::new_v4(),
            index: index.into(),
            succeeded: 0,
            skipped: Vec::new(),
            failures: Vec::new(),
            not_attempted: Vec::new(),
            batches: 0,
            fallback_batches: 0,
            retried: 0,
            cancelled: false,
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    pub(crate) fn finish(&mut self) {
        let elapsed = Utc::now() - self.started_at;
        self.elapsed_ms = elapsed.num_milliseconds().max(0) as u64;
    }

    /// Documents that reached a final state or were left out
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped.len() + self.failures.len() + self.not_attempted.len()
    }

    /// Every submitted document was written and nothing was left unsent
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.not_attempted.is_empty()
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.id.as_str()).collect()
    }
}
