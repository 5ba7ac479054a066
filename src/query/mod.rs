//! Query building and execution
//!
//! [`QuerySpec`] describes a query without touching the engine.
//! [`QueryExecutor`] checks it against the live mapping of the target index
//! before sending it, so an exact filter on analyzed text fails with
//! [`QueryError::SchemaMismatch`] instead of silently matching nothing.

mod error;
mod executor;
mod results;
mod spec;

pub use error::{QueryError, QueryResult};
pub use executor::QueryExecutor;
pub use results::{ExplanationNode, ExplanationTree, Hit, ResultSet, SuggestOption, Suggestion, TermCount};
pub use spec::{FieldUse, MatchOperator, QuerySpec, SearchOptions, ALL_BUCKETS};
