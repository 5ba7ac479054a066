//! Wire types exchanged with the search engine

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single token produced by the analyze endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedToken {
    pub token: String,

    #[serde(default)]
    pub start_offset: usize,

    #[serde(default)]
    pub end_offset: usize,

    #[serde(rename = "type", default)]
    pub token_type: String,

    #[serde(default)]
    pub position: usize,
}

/// Response of the analyze endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub tokens: Vec<AnalyzedToken>,
}

/// Per-operation outcome inside a bulk response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemResult {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,

    pub status: u16,

    #[serde(default)]
    pub error: Option<Value>,
}

impl BulkItemResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Error type and reason, tolerating both object and plain string error bodies
    pub fn error_detail(&self) -> (Option<String>, String) {
        match &self.error {
            Some(value) => error_parts(value),
            None => (None, format!("status {}", self.status)),
        }
    }
}

/// Response of the bulk endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,

    #[serde(default)]
    pub errors: bool,

    /// Each item is a single-key object keyed by the action kind
    #[serde(default)]
    pub items: Vec<HashMap<String, BulkItemResult>>,
}

impl BulkResponse {
    /// Flatten items to their result, dropping the action key
    pub fn results(&self) -> Vec<Option<&BulkItemResult>> {
        self.items.iter().map(|item| item.values().next()).collect()
    }
}

/// Acknowledgement for a single-document write
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteAck {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(rename = "_version", default)]
    pub version: Option<u64>,

    #[serde(default)]
    pub created: Option<bool>,

    #[serde(default)]
    pub found: Option<bool>,
}

/// A raw search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_index", default)]
    pub index: String,

    #[serde(rename = "_type", default)]
    pub doc_type: Option<String>,

    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "_score", default)]
    pub score: Option<f64>,

    #[serde(rename = "_source", default)]
    pub source: Option<Value>,
}

/// The `hits` envelope of a search response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default, deserialize_with = "total_hits")]
    pub total: u64,

    #[serde(default)]
    pub max_score: Option<f64>,

    #[serde(default)]
    pub hits: Vec<RawHit>,
}

/// Response of the search endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: u64,

    #[serde(default)]
    pub timed_out: bool,

    #[serde(default)]
    pub hits: HitsEnvelope,

    #[serde(default)]
    pub aggregations: Option<serde_json::Map<String, Value>>,
}

/// A node of the scoring explanation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawExplanation {
    #[serde(default)]
    pub value: f64,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub details: Vec<RawExplanation>,
}

/// Response of the explain endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResponse {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,

    #[serde(default)]
    pub matched: bool,

    #[serde(default)]
    pub explanation: Option<RawExplanation>,
}

/// Older engines report a bare number, newer ones `{"value": n}`
fn total_hits<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::Object(map) => map.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => 0,
    })
}

/// Split an engine error value into (type, reason)
pub fn error_parts(value: &Value) -> (Option<String>, String) {
    match value {
        Value::String(reason) => (None, reason.clone()),
        Value::Object(map) => {
            let error_type = map.get("type").and_then(Value::as_str).map(str::to_string);
            let mut reason = map
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            if let Some(cause) = map.get("caused_by").and_then(|c| c.get("reason")).and_then(Value::as_str) {
                reason = format!("{}: {}", reason, cause);
            }
            (error_type, reason)
        }
        other => (None, other.to_string()),
    }
}

/// Decode the error envelope of a non-success response body
pub fn decode_error_body(body: &str) -> (Option<String>, String) {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => match value.get("error") {
            Some(error) => error_parts(error),
            None => (None, value.to_string()),
        },
        Err(_) if body.is_empty() => (None, "No response body".to_string()),
        Err(_) => (None, body.to_string()),
    }
}
