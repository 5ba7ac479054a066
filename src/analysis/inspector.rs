//! Read-only probe of the engine's analyze endpoint

use crate::analysis::spec::AnalyzerSpec;
use crate::engine::{AnalyzedToken, EngineTransport, RetryPolicy, TransportResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// What to run text through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisTarget {
    /// A named analyzer, built in or defined on the index
    Analyzer(String),

    /// An ad hoc pipeline of component names
    Pipeline {
        char_filters: Vec<String>,
        tokenizer: String,
        filters: Vec<String>,
    },
}

impl AnalysisTarget {
    pub fn analyzer(name: impl Into<String>) -> Self {
        Self::Analyzer(name.into())
    }

    pub fn tokenizer(name: impl Into<String>) -> Self {
        Self::Pipeline {
            char_filters: Vec::new(),
            tokenizer: name.into(),
            filters: Vec::new(),
        }
    }

    fn request_body(&self, text: &str) -> Value {
        match self {
            AnalysisTarget::Analyzer(name) => json!({ "text": text, "analyzer": name }),
            AnalysisTarget::Pipeline {
                char_filters,
                tokenizer,
                filters,
            } => {
                let mut body = json!({ "text": text, "tokenizer": tokenizer });
                if !char_filters.is_empty() {
                    body["char_filter"] = json!(char_filters);
                }
                if !filters.is_empty() {
                    body["filter"] = json!(filters);
                }
                body
            }
        }
    }
}

/// Runs a spec's pipeline by component names, so it can be tried before the
/// index that would define it exists.
impl From<&AnalyzerSpec> for AnalysisTarget {
    fn from(spec: &AnalyzerSpec) -> Self {
        if spec.is_builtin() {
            return Self::Analyzer(spec.identifier.clone());
        }
        Self::Pipeline {
            char_filters: spec.char_filters.clone(),
            tokenizer: spec.tokenizer.clone(),
            filters: spec.filters.clone(),
        }
    }
}

/// Diagnostic utility submitting raw text through an analyzer
pub struct AnalysisInspector {
    transport: Arc<dyn EngineTransport>,
    retry: RetryPolicy,
}

impl AnalysisInspector {
    pub fn new(transport: Arc<dyn EngineTransport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Tokenize `text`, optionally in the scope of an index so its custom
    /// analyzers and components resolve
    pub async fn tokenize(
        &self,
        index: Option<&str>,
        target: &AnalysisTarget,
        text: &str,
    ) -> TransportResult<Vec<AnalyzedToken>> {
        let body = target.request_body(text);

        let (result, attempts) = self
            .retry
            .run("analyze", || self.transport.analyze(index, &body))
            .await;
        let response = result?;

        debug!(
            index = index.unwrap_or("_all"),
            tokens = response.tokens.len(),
            attempts,
            "Text analyzed"
        );

        Ok(response.tokens)
    }

    /// Token strings joined with single spaces
    pub fn tokens_as_text(tokens: &[AnalyzedToken]) -> String {
        tokens
            .iter()
            .map(|t| t.token.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
