//! Document ingestion
//!
//! Rows of a tabular source become [`Document`]s, documents become
//! [`BulkOperation`]s, and [`BulkLoader`] writes them with per-document
//! failure isolation.

mod document;
mod error;
mod loader;
mod operation;
mod report;

pub use document::{Document, FieldValue, Fields, SourceRow};
pub use error::{LoadError, LoadResult};
pub use loader::{BulkLoader, CancellationFlag, LoadOptions};
pub use operation::{
    chunk_operations, ActionDescriptor, ActionKind, BatchLimits, BulkOperation, EncodedBatch,
    Payload,
};
pub use report::{FailureDetail, LoadFailure, LoadReport, SkipReason, SkippedRow};
