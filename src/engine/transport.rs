//! Engine transport trait definition.
//!
//! Every component talks to the search engine through an explicit
//! `Arc<dyn EngineTransport>` handed to it by the caller. There is no
//! process-wide client.

use crate::engine::error::TransportResult;
use crate::engine::protocol::{
    AnalyzeResponse, BulkResponse, ExplainResponse, SearchResponse, WriteAck,
};
use async_trait::async_trait;
use serde_json::Value;

/// Request/response operations the orchestration layer needs from the engine.
///
/// Implementations must be safe to share between concurrent loader workers.
/// Every method is a single network round trip; retries are the caller's
/// decision.
#[async_trait]
pub trait EngineTransport: Send + Sync {
    /// Whether the index exists
    async fn index_exists(&self, index: &str) -> TransportResult<bool>;

    /// Create an index with the given settings body
    async fn create_index(&self, index: &str, body: &Value) -> TransportResult<()>;

    /// Delete an index and every document in it
    async fn delete_index(&self, index: &str) -> TransportResult<()>;

    /// Put a document-type mapping (`{"<type>": {"properties": {...}}}`)
    async fn put_mapping(&self, index: &str, doc_type: &str, body: &Value) -> TransportResult<()>;

    /// Fetch the live mapping of an index
    async fn get_mapping(&self, index: &str) -> TransportResult<Value>;

    /// Fetch the live settings of an index
    async fn get_settings(&self, index: &str) -> TransportResult<Value>;

    /// Make recent writes visible to search
    async fn refresh(&self, index: &str) -> TransportResult<()>;

    /// Run text through an analyzer or an ad hoc tokenizer/filter chain
    async fn analyze(&self, index: Option<&str>, body: &Value) -> TransportResult<AnalyzeResponse>;

    /// Submit a newline-delimited bulk body
    async fn bulk(&self, body: String) -> TransportResult<BulkResponse>;

    /// Index (create or overwrite) one document
    async fn index_document(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: &Value,
    ) -> TransportResult<WriteAck>;

    /// Apply a partial update (`{"doc": {...}}`) to one document
    async fn update_document(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: &Value,
    ) -> TransportResult<WriteAck>;

    /// Delete one document
    async fn delete_document(&self, index: &str, doc_type: &str, id: &str) -> TransportResult<WriteAck>;

    /// Execute a search body, optionally restricted to a document type
    async fn search(
        &self,
        index: &str,
        doc_type: Option<&str>,
        body: &Value,
    ) -> TransportResult<SearchResponse>;

    /// Explain how a query scores one document
    async fn explain(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: &Value,
    ) -> TransportResult<ExplainResponse>;

    /// Run a suggest body and return the raw response
    async fn suggest(&self, index: &str, body: &Value) -> TransportResult<Value>;
}
