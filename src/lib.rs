//! Search orchestrator
//!
//! Configures text analysis, provisions indexes and mappings, bulk loads
//! documents with per-document failure isolation, and runs queries against a
//! remote full-text search engine.
//!
//! Every component takes an explicit `Arc<dyn EngineTransport>`; there is no
//! process-wide client.
//!
//! ```no_run
//! use search_orchestrator::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> search_orchestrator::Result<()> {
//! let config = Config::load()?;
//! let transport: Arc<dyn EngineTransport> = Arc::new(HttpTransport::new(&config.engine)?);
//!
//! let schema = IndexSchema::new("yelp").with_type(
//!     TypeMapping::new("review")
//!         .field(FieldMapping::analyzed("text", "english"))
//!         .field(FieldMapping::keyword("business_id")),
//! );
//! SchemaManager::new(transport.clone())
//!     .ensure_index("yelp", &schema, false)
//!     .await?;
//!
//! let executor = QueryExecutor::new(transport);
//! let hits = executor
//!     .match_query("yelp", "review", "text", "good pizza", MatchOperator::And)
//!     .await?;
//! println!("{} reviews", hits.total);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod query;
pub mod schema;
pub mod telemetry;

pub use error::{AppError, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::analysis::{
        AnalysisInspector, AnalysisTarget, AnalyzerRegistry, AnalyzerSpec, CharFilterKind,
        TokenFilterKind, TokenizerKind,
    };
    pub use crate::config::Config;
    pub use crate::engine::{EngineTransport, HttpTransport, RetryPolicy};
    pub use crate::ingest::{BulkLoader, BulkOperation, Document, FieldValue, Fields, LoadOptions, LoadReport};
    pub use crate::query::{MatchOperator, QueryExecutor, QuerySpec, ResultSet, SearchOptions};
    pub use crate::schema::{FieldMapping, IndexSchema, SchemaManager, TypeMapping};
}
