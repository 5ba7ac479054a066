//! Text analysis configuration
//!
//! Analyzers are pipelines of character filters, exactly one tokenizer and
//! token filters. [`AnalyzerRegistry`] validates custom definitions locally,
//! before anything reaches the engine, and [`AnalysisInspector`] asks the
//! engine how a piece of text is actually tokenized.

mod builtin;
mod components;
mod error;
mod inspector;
mod registry;
mod spec;

pub use builtin::{builtin_analyzer, builtin_analyzers, default_builtin, DEFAULT_ANALYZER};
pub use components::{
    is_builtin, CharFilterKind, ComponentKind, Stopwords, TokenFilterKind, TokenizerKind,
};
pub use error::{ConfigError, ConfigResult};
pub use inspector::{AnalysisInspector, AnalysisTarget};
pub use registry::{AnalyzerRegistry, INDEX_DEFAULT_ANALYZER};
pub use spec::{AnalyzerOrigin, AnalyzerSpec, AnalyzerSpecBuilder};

pub(crate) use spec::validate_identifier;
