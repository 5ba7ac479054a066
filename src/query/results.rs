//! Query results

use crate::engine::{RawExplanation, SearchResponse};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write as _;

/// A matching document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub id: String,

    pub doc_type: Option<String>,

    /// Relevance score; absent when the engine skipped scoring
    pub score: Option<f64>,

    /// Stored source, when returned
    pub source: Option<Value>,
}

impl Hit {
    /// Source value of `field`
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.source.as_ref().and_then(|s| s.get(field))
    }
}

/// Hits of a search, best first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    /// Total matching documents, not just the returned page
    pub total: u64,

    pub max_score: Option<f64>,

    pub hits: Vec<Hit>,

    /// Engine-side execution time
    pub took_ms: u64,

    pub timed_out: bool,
}

impl ResultSet {
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.id.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

impl From<SearchResponse> for ResultSet {
    fn from(response: SearchResponse) -> Self {
        Self {
            total: response.hits.total,
            max_score: response.hits.max_score,
            hits: response
                .hits
                .hits
                .into_iter()
                .map(|raw| Hit {
                    id: raw.id,
                    doc_type: raw.doc_type,
                    score: raw.score,
                    source: raw.source,
                })
                .collect(),
            took_ms: response.took,
            timed_out: response.timed_out,
        }
    }
}

/// One bucket of a terms aggregation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TermCount {
    pub term: String,
    pub count: u64,
}

/// Read the buckets of aggregation `name`, ordered by descending count then term
pub(crate) fn term_counts(aggregations: Option<&Map<String, Value>>, name: &str) -> Result<Vec<TermCount>, String> {
    let buckets = aggregations
        .and_then(|aggs| aggs.get(name))
        .and_then(|agg| agg.get("buckets"))
        .and_then(Value::as_array)
        .ok_or_else(|| format!("aggregation '{}' missing from response", name))?;

    let mut counts = buckets
        .iter()
        .map(|bucket| {
            let term = match bucket.get("key_as_string").or_else(|| bucket.get("key")) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                Some(Value::Bool(b)) => b.to_string(),
                _ => return Err(format!("bucket without key in '{}'", name)),
            };
            let count = bucket
                .get("doc_count")
                .and_then(Value::as_u64)
                .ok_or_else(|| format!("bucket '{}' without doc_count", term))?;
            Ok(TermCount { term, count })
        })
        .collect::<Result<Vec<_>, String>>()?;

    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.term.cmp(&b.term)));
    Ok(counts)
}

/// One scoring step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationNode {
    pub value: f64,
    pub description: String,
    pub details: Vec<ExplanationNode>,
}

impl From<RawExplanation> for ExplanationNode {
    fn from(raw: RawExplanation) -> Self {
        Self {
            value: raw.value,
            description: raw.description,
            details: raw.details.into_iter().map(Into::into).collect(),
        }
    }
}

impl ExplanationNode {
    fn render_into(&self, depth: usize, out: &mut String) {
        let _ = writeln!(out, "{}{} = {}", "  ".repeat(depth), self.value, self.description);
        for detail in &self.details {
            detail.render_into(depth + 1, out);
        }
    }

    fn depth(&self) -> usize {
        1 + self.details.iter().map(ExplanationNode::depth).max().unwrap_or(0)
    }
}

/// How a query scored one document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationTree {
    pub document_id: String,

    /// Whether the document matched at all; a non-match still carries a reason
    pub matched: bool,

    pub root: ExplanationNode,
}

impl ExplanationTree {
    /// Final score
    pub fn score(&self) -> f64 {
        self.root.value
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    /// Indented text, one node per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.root.render_into(0, &mut out);
        out
    }
}

/// A candidate correction for one input term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestOption {
    pub text: String,

    #[serde(default)]
    pub score: f64,

    /// Documents containing the suggestion
    #[serde(default)]
    pub freq: u64,
}

/// Suggestions for one term of the input text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// The input term
    pub text: String,

    #[serde(default)]
    pub offset: usize,

    #[serde(default)]
    pub length: usize,

    #[serde(default)]
    pub options: Vec<SuggestOption>,
}

impl Suggestion {
    /// Best option, if the term was not already in the index
    pub fn best(&self) -> Option<&SuggestOption> {
        self.options.first()
    }
}
