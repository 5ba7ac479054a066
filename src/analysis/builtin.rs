//! Analyzers the engine provides without any index configuration

use crate::analysis::spec::{AnalyzerOrigin, AnalyzerSpec};
use once_cell::sync::Lazy;

/// Analyzer the engine applies to analyzed fields that name none
pub const DEFAULT_ANALYZER: &str = "standard";

static BUILTIN_ANALYZERS: Lazy<Vec<AnalyzerSpec>> = Lazy::new(|| {
    vec![
        // Stopwords default to `_none_` for the standard analyzer
        builtin("standard", "standard", &["standard", "lowercase"]),
        builtin("simple", "lowercase", &[]),
        builtin("whitespace", "whitespace", &[]),
        builtin("stop", "lowercase", &["stop"]),
        builtin("keyword", "keyword", &[]),
        builtin(
            "english",
            "standard",
            &["possessive_english", "lowercase", "stop", "porter_stem"],
        ),
    ]
});

fn builtin(identifier: &str, tokenizer: &str, filters: &[&str]) -> AnalyzerSpec {
    AnalyzerSpec {
        identifier: identifier.to_string(),
        char_filters: Vec::new(),
        tokenizer: tokenizer.to_string(),
        filters: filters.iter().map(|f| f.to_string()).collect(),
        override_builtin: false,
        origin: AnalyzerOrigin::Builtin,
    }
}

/// Look up a built-in analyzer by name
pub fn builtin_analyzer(name: &str) -> Option<&'static AnalyzerSpec> {
    BUILTIN_ANALYZERS.iter().find(|spec| spec.identifier == name)
}

/// The engine's default analyzer as a resolvable entry
pub fn default_builtin() -> &'static AnalyzerSpec {
    &BUILTIN_ANALYZERS[0]
}

/// All built-in analyzers
pub fn builtin_analyzers() -> &'static [AnalyzerSpec] {
    &BUILTIN_ANALYZERS
}
