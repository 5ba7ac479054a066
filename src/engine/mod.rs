//! Engine transport layer
//!
//! The search engine is a remote service reached over request/response
//! calls carrying JSON bodies. This module defines the [`EngineTransport`]
//! seam used by every other component, an HTTP implementation of it, the
//! wire types it decodes, and the bounded retry policy callers apply to
//! idempotent calls.

mod error;
mod http;
mod protocol;
mod retry;
mod transport;

pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
pub use protocol::{
    decode_error_body, error_parts, AnalyzeResponse, AnalyzedToken, BulkItemResult, BulkResponse,
    ExplainResponse, HitsEnvelope, RawExplanation, RawHit, SearchResponse, WriteAck,
};
pub use retry::RetryPolicy;
pub use transport::EngineTransport;
