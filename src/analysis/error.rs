//! Error types for local analyzer and mapping validation

use crate::analysis::components::ComponentKind;
use crate::error::AppError;

/// Result type for configuration validation
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Invalid analyzer or mapping definitions, detected before anything is sent to the engine
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Analyzer without a tokenizer
    #[error("Analyzer '{0}' has no tokenizer")]
    MissingTokenizer(String),

    /// Reference to a component neither built in nor defined in the registry
    #[error("Analyzer '{analyzer}' references unknown {component} '{name}'")]
    UnknownComponent {
        analyzer: String,
        component: ComponentKind,
        name: String,
    },

    /// Custom analyzer defined twice in one registry
    #[error("Analyzer '{0}' is already defined")]
    DuplicateAnalyzer(String),

    /// Custom component defined twice in one registry
    #[error("{component} '{name}' is already defined")]
    DuplicateComponent { component: ComponentKind, name: String },

    /// Custom analyzer shadows a built-in without opting in
    #[error("'{0}' is a built-in analyzer; set override_builtin to replace it")]
    ReservedName(String),

    /// Analyzer not resolvable
    #[error("Analyzer '{0}' not found")]
    AnalyzerNotFound(String),

    /// Malformed identifier
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    /// Pattern that cannot be compiled
    #[error("Invalid pattern in {component} '{name}': {reason}")]
    InvalidPattern {
        component: ComponentKind,
        name: String,
        reason: String,
    },

    /// Field definition violating the analyzed/exact rules
    #[error("Field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Field mapped twice in one document type
    #[error("Field '{field}' is mapped more than once in type '{doc_type}'")]
    DuplicateField { doc_type: String, field: String },

    /// Document type declared twice in one schema
    #[error("Document type '{0}' is declared more than once")]
    DuplicateType(String),

    /// Analyzed field referencing an analyzer the schema does not provide
    #[error("Field '{field}' references unknown analyzer '{analyzer}'")]
    UnresolvedAnalyzer { field: String, analyzer: String },

    /// Index or document type name the engine would refuse
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Definition file could not be parsed
    #[error("Failed to parse definition: {0}")]
    Parse(String),

    /// Definition file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(err) => AppError::Io(err),
            ConfigError::AnalyzerNotFound(_) => AppError::NotFound(err.to_string()),
            _ => AppError::Configuration(err.to_string()),
        }
    }
}
