//! Shared test utilities
//!
//! [`FakeEngine`] is an in-memory engine behind the transport trait. It
//! stores settings, mappings and documents, emulates the built-in analyzers
//! closely enough for matching tests, rejects unparsable numeric values the
//! way the engine does, and can inject bulk failures and throttling.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use search_orchestrator::engine::{
    AnalyzeResponse, AnalyzedToken, BulkResponse, EngineTransport, ExplainResponse, SearchResponse,
    TransportError, TransportResult, WriteAck,
};
use search_orchestrator::ingest::CancellationFlag;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

#[derive(Default)]
struct FakeIndex {
    analysis: Value,
    /// doc type -> properties
    mappings: BTreeMap<String, Map<String, Value>>,
    /// (doc type, id) -> source
    docs: BTreeMap<(String, String), Value>,
}

#[derive(Default)]
struct State {
    indices: BTreeMap<String, FakeIndex>,
    calls: Vec<String>,
    bulk_failures: VecDeque<TransportError>,
    truncate_next_bulk: bool,
    throttled: HashMap<String, u32>,
    cancel_on_bulk: Option<CancellationFlag>,
}

/// In-memory engine
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<State>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// The same engine behind the trait object components take
    pub fn transport(self: &Arc<Self>) -> Arc<dyn EngineTransport> {
        self.clone()
    }

    /// Fail the next bulk call with `err`
    pub fn fail_next_bulk(&self, err: TransportError) {
        self.state.lock().bulk_failures.push_back(err);
    }

    /// Drop the last item of the next bulk response
    pub fn truncate_next_bulk(&self) {
        self.state.lock().truncate_next_bulk = true;
    }

    /// Answer writes of `id` with 429 the next `times` times
    pub fn throttle(&self, id: &str, times: u32) {
        self.state.lock().throttled.insert(id.to_string(), times);
    }

    /// Trip `flag` once the next bulk call has been handled
    pub fn cancel_on_bulk(&self, flag: CancellationFlag) {
        self.state.lock().cancel_on_bulk = Some(flag);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn document(&self, index: &str, doc_type: &str, id: &str) -> Option<Value> {
        self.state
            .lock()
            .indices
            .get(index)
            .and_then(|i| i.docs.get(&(doc_type.to_string(), id.to_string())))
            .cloned()
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.state
            .lock()
            .indices
            .get(index)
            .map(|i| i.docs.len())
            .unwrap_or(0)
    }

    /// Store a document without going through any write path
    pub fn seed(&self, index: &str, doc_type: &str, id: &str, source: Value) {
        let mut state = self.state.lock();
        let idx = state.indices.entry(index.to_string()).or_default();
        idx.docs.insert((doc_type.to_string(), id.to_string()), source);
    }
}

fn status(status: u16, error_type: Option<&str>, reason: impl Into<String>) -> TransportError {
    TransportError::Status {
        status,
        error_type: error_type.map(str::to_string),
        reason: reason.into(),
    }
}

fn index_missing(index: &str) -> TransportError {
    status(404, Some("index_not_found_exception"), format!("no such index [{}]", index))
}

fn tokenize_standard(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn tokenize(tokenizer: &str, text: &str) -> Vec<String> {
    match tokenizer {
        "keyword" => vec![text.to_string()],
        "whitespace" => text.split_whitespace().map(str::to_string).collect(),
        "letter" => text
            .split(|c: char| !c.is_alphabetic())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        "lowercase" => text
            .split(|c: char| !c.is_alphabetic())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect(),
        _ => tokenize_standard(text),
    }
}

fn stem(token: &str) -> String {
    let mut stemmed = if token.len() > 3 && token.ends_with("ies") {
        format!("{}i", &token[..token.len() - 3])
    } else if token.ends_with("ss") {
        token.to_string()
    } else if token.len() > 3 && token.ends_with('s') {
        token[..token.len() - 1].to_string()
    } else {
        token.to_string()
    };
    if stemmed.len() > 2 && stemmed.ends_with('y') {
        stemmed.pop();
        stemmed.push('i');
    }
    stemmed
}

fn apply_filter(filter: &str, analysis: &Value, tokens: Vec<String>) -> Vec<String> {
    let custom = analysis.get("filter").and_then(|f| f.get(filter));
    let kind = custom
        .and_then(|f| f.get("type"))
        .and_then(Value::as_str)
        .unwrap_or(filter);

    match kind {
        "lowercase" => tokens.into_iter().map(|t| t.to_lowercase()).collect(),
        "possessive_english" => tokens
            .into_iter()
            .map(|t| t.strip_suffix("'s").map(str::to_string).unwrap_or(t))
            .collect(),
        "stop" => {
            let words: BTreeSet<String> = match custom.and_then(|f| f.get("stopwords")) {
                Some(Value::Array(list)) => list
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect(),
                _ => ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            };
            tokens.into_iter().filter(|t| !words.contains(t)).collect()
        }
        "porter_stem" | "stemmer" | "kstem" => tokens.iter().map(|t| stem(t)).collect(),
        "length" => {
            let min = custom.and_then(|f| f.get("min")).and_then(Value::as_u64).unwrap_or(0) as usize;
            let max = custom
                .and_then(|f| f.get("max"))
                .and_then(Value::as_u64)
                .unwrap_or(u64::MAX) as usize;
            tokens
                .into_iter()
                .filter(|t| t.chars().count() >= min && t.chars().count() <= max)
                .collect()
        }
        _ => tokens,
    }
}

fn apply_char_filter(name: &str, text: &str) -> String {
    match name {
        "html_strip" => match Regex::new(r"<[^>]*>") {
            Ok(tags) => tags.replace_all(text, " ").into_owned(),
            Err(_) => text.to_string(),
        },
        _ => text.to_string(),
    }
}

fn run_pipeline(
    analysis: &Value,
    char_filters: &[String],
    tokenizer: &str,
    filters: &[String],
    text: &str,
) -> Vec<String> {
    let mut text = text.to_string();
    for name in char_filters {
        text = apply_char_filter(name, &text);
    }
    let mut tokens = tokenize(tokenizer, &text);
    for filter in filters {
        tokens = apply_filter(filter, analysis, tokens);
    }
    tokens
}

fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn builtin_pipeline(name: &str) -> Option<(&'static str, Vec<String>)> {
    let filters = |names: &[&str]| names.iter().map(|n| n.to_string()).collect::<Vec<_>>();
    Some(match name {
        "standard" => ("standard", filters(&["lowercase"])),
        "simple" => ("lowercase", Vec::new()),
        "whitespace" => ("whitespace", Vec::new()),
        "stop" => ("lowercase", filters(&["stop"])),
        "keyword" => ("keyword", Vec::new()),
        "english" => (
            "standard",
            filters(&["possessive_english", "lowercase", "stop", "porter_stem"]),
        ),
        _ => return None,
    })
}

/// Tokens of `text` through analyzer `name`, custom definitions first
fn analyze_named(analysis: &Value, name: &str, text: &str) -> TransportResult<Vec<String>> {
    if let Some(custom) = analysis.get("analyzer").and_then(|a| a.get(name)) {
        if custom.get("type").and_then(Value::as_str) == Some("custom") {
            let tokenizer = custom
                .get("tokenizer")
                .and_then(Value::as_str)
                .unwrap_or("standard");
            return Ok(run_pipeline(
                analysis,
                &strings(custom.get("char_filter")),
                tokenizer,
                &strings(custom.get("filter")),
                text,
            ));
        }
        if let Some(builtin) = custom.get("type").and_then(Value::as_str) {
            return analyze_named(&Value::Null, builtin, text);
        }
    }
    match builtin_pipeline(name) {
        Some((tokenizer, filters)) => Ok(run_pipeline(analysis, &[], tokenizer, &filters, text)),
        None => Err(status(
            400,
            Some("illegal_argument_exception"),
            format!("failed to find analyzer [{}]", name),
        )),
    }
}

fn default_analyzer(analysis: &Value) -> &str {
    if analysis.get("analyzer").and_then(|a| a.get("default")).is_some() {
        "default"
    } else {
        "standard"
    }
}

enum FieldIndexing<'a> {
    Exact,
    Analyzed(&'a str),
}

impl FakeIndex {
    fn field(&self, doc_type: &str, field: &str) -> Option<&Value> {
        self.mappings.get(doc_type).and_then(|p| p.get(field))
    }

    fn indexing<'a>(&'a self, doc_type: &str, field: &str) -> FieldIndexing<'a> {
        match self.field(doc_type, field) {
            Some(mapping) => {
                let is_string = matches!(mapping.get("type").and_then(Value::as_str), Some("string" | "text"));
                let analyzed = mapping.get("index").and_then(Value::as_str) != Some("not_analyzed");
                if is_string && analyzed {
                    let analyzer = mapping
                        .get("analyzer")
                        .and_then(Value::as_str)
                        .unwrap_or_else(|| default_analyzer(&self.analysis));
                    FieldIndexing::Analyzed(analyzer)
                } else {
                    FieldIndexing::Exact
                }
            }
            None => FieldIndexing::Analyzed(default_analyzer(&self.analysis)),
        }
    }

    fn analyze_field(&self, doc_type: &str, field: &str, text: &str) -> Vec<String> {
        match self.indexing(doc_type, field) {
            FieldIndexing::Exact => vec![text.to_string()],
            FieldIndexing::Analyzed(analyzer) => {
                analyze_named(&self.analysis, analyzer, text).unwrap_or_default()
            }
        }
    }

    /// Indexed terms of `field` in `source`
    fn terms(&self, doc_type: &str, field: &str, source: &Value) -> Vec<String> {
        let values = match source.get(field) {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        };
        values
            .iter()
            .flat_map(|value| match value {
                Value::String(s) => self.analyze_field(doc_type, field, s),
                other => vec![other.to_string()],
            })
            .collect()
    }

    /// Reject values the mapped type cannot parse
    fn check_source(&self, doc_type: &str, source: &Value) -> TransportResult<()> {
        let Some(fields) = source.as_object() else {
            return Err(status(400, Some("mapper_parsing_exception"), "failed to parse, document is empty"));
        };
        for (name, value) in fields {
            let Some(mapping) = self.field(doc_type, name) else {
                continue;
            };
            let parses = match mapping.get("type").and_then(Value::as_str) {
                Some("integer" | "long" | "short" | "byte") => match value {
                    Value::Number(n) => n.is_i64() || n.is_u64(),
                    Value::String(s) => s.trim().parse::<i64>().is_ok(),
                    Value::Null => true,
                    _ => false,
                },
                Some("float" | "double") => match value {
                    Value::Number(_) | Value::Null => true,
                    Value::String(s) => s.trim().parse::<f64>().is_ok(),
                    _ => false,
                },
                _ => true,
            };
            if !parses {
                return Err(TransportError::Status {
                    status: 400,
                    error_type: Some("mapper_parsing_exception".to_string()),
                    reason: format!("failed to parse [{}]: For input string: {}", name, value),
                });
            }
        }
        Ok(())
    }

    /// Score of `source` against `query`, `None` when it does not match
    fn score(&self, doc_type: &str, source: &Value, query: &Value) -> TransportResult<Option<(f64, Vec<String>)>> {
        let Some((kind, clause)) = query.as_object().and_then(|q| q.iter().next()) else {
            return Err(status(400, Some("parsing_exception"), "empty query"));
        };

        match kind.as_str() {
            "match_all" => Ok(Some((1.0, Vec::new()))),
            "match" => {
                let Some((field, body)) = clause.as_object().and_then(|c| c.iter().next()) else {
                    return Err(status(400, Some("parsing_exception"), "match without field"));
                };
                let text = body
                    .get("query")
                    .and_then(Value::as_str)
                    .or_else(|| body.as_str())
                    .unwrap_or_default();
                let and = body.get("operator").and_then(Value::as_str) == Some("and");

                let wanted: BTreeSet<String> = self.analyze_field(doc_type, field, text).into_iter().collect();
                let present: BTreeSet<String> = self.terms(doc_type, field, source).into_iter().collect();
                let matched: Vec<String> = wanted.intersection(&present).cloned().collect();

                let hit = if and {
                    !wanted.is_empty() && matched.len() == wanted.len()
                } else {
                    !matched.is_empty()
                };
                Ok(hit.then(|| {
                    let explained = matched.iter().map(|t| format!("{}:{}", field, t)).collect();
                    (matched.len() as f64, explained)
                }))
            }
            "constant_score" => {
                let term = clause
                    .pointer("/filter/term")
                    .and_then(Value::as_object)
                    .and_then(|t| t.iter().next());
                let Some((field, expected)) = term else {
                    return Err(status(400, Some("parsing_exception"), "unsupported filter"));
                };
                let hit = match self.indexing(doc_type, field) {
                    FieldIndexing::Exact => match (source.get(field), expected) {
                        (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
                        (Some(Value::Number(a)), Value::String(b)) => a.to_string() == *b,
                        (Some(actual), expected) => actual == expected,
                        (None, _) => false,
                    },
                    // Terms are not analyzed, indexed tokens are
                    FieldIndexing::Analyzed(_) => {
                        let wanted = match expected {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        self.terms(doc_type, field, source).contains(&wanted)
                    }
                };
                Ok(hit.then(|| (1.0, vec![format!("ConstantScore({})", field)])))
            }
            "query_string" => {
                let text = clause.get("query").and_then(Value::as_str).unwrap_or_default();
                let fields: Vec<String> = match clause.get("default_field").and_then(Value::as_str) {
                    Some(field) => vec![field.to_string()],
                    None => source
                        .as_object()
                        .map(|s| s.keys().cloned().collect())
                        .unwrap_or_default(),
                };
                let mut matched = Vec::new();
                for field in &fields {
                    if matches!(self.indexing(doc_type, field), FieldIndexing::Exact) {
                        continue;
                    }
                    let wanted: BTreeSet<String> = self.analyze_field(doc_type, field, text).into_iter().collect();
                    let present: BTreeSet<String> = self.terms(doc_type, field, source).into_iter().collect();
                    matched.extend(wanted.intersection(&present).map(|t| format!("{}:{}", field, t)));
                }
                Ok((!matched.is_empty()).then(|| (matched.len() as f64, matched)))
            }
            "more_like_this" => {
                let like = clause.get("like").and_then(Value::as_str).unwrap_or_default();
                let min_term_freq = clause.get("min_term_freq").and_then(Value::as_u64).unwrap_or(2) as usize;
                let analyzer = clause.get("analyzer").and_then(Value::as_str);

                let mut matched = Vec::new();
                for field in strings(clause.get("fields")) {
                    let sample = match analyzer {
                        Some(analyzer) => analyze_named(&self.analysis, analyzer, like)?,
                        None => self.analyze_field(doc_type, &field, like),
                    };
                    let mut frequencies: BTreeMap<String, usize> = BTreeMap::new();
                    for token in sample {
                        *frequencies.entry(token).or_default() += 1;
                    }
                    let present: BTreeSet<String> = self.terms(doc_type, &field, source).into_iter().collect();
                    matched.extend(
                        frequencies
                            .into_iter()
                            .filter(|(term, freq)| *freq >= min_term_freq && present.contains(term))
                            .map(|(term, _)| format!("{}:{}", field, term)),
                    );
                }
                Ok((!matched.is_empty()).then(|| (matched.len() as f64, matched)))
            }
            other => Err(status(
                400,
                Some("parsing_exception"),
                format!("no [query] registered for [{}]", other),
            )),
        }
    }
}

fn ack(id: &str, created: bool) -> WriteAck {
    WriteAck {
        id: id.to_string(),
        version: Some(1),
        created: Some(created),
        found: None,
    }
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut previous = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let current = row[j + 1];
            row[j + 1] = if ca == *cb {
                previous
            } else {
                1 + previous.min(row[j]).min(row[j + 1])
            };
            previous = current;
        }
    }
    row[b.len()]
}

impl State {
    fn log(&mut self, call: impl Into<String>) {
        self.calls.push(call.into());
    }

    fn take_throttle(&mut self, id: &str) -> bool {
        match self.throttled.get_mut(id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn index_doc(&mut self, index: &str, doc_type: &str, id: &str, source: &Value) -> TransportResult<bool> {
        if self.take_throttle(id) {
            return Err(status(429, Some("es_rejected_execution_exception"), "rejected execution"));
        }
        let idx = self.indices.get_mut(index).ok_or_else(|| index_missing(index))?;
        idx.check_source(doc_type, source)?;
        let created = idx
            .docs
            .insert((doc_type.to_string(), id.to_string()), source.clone())
            .is_none();
        Ok(created)
    }

    fn update_doc(&mut self, index: &str, doc_type: &str, id: &str, body: &Value) -> TransportResult<()> {
        if self.take_throttle(id) {
            return Err(status(429, Some("es_rejected_execution_exception"), "rejected execution"));
        }
        let idx = self.indices.get_mut(index).ok_or_else(|| index_missing(index))?;
        let partial = body.get("doc").cloned().unwrap_or_else(|| json!({}));
        idx.check_source(doc_type, &partial)?;

        let key = (doc_type.to_string(), id.to_string());
        let existing = idx.docs.get_mut(&key).ok_or_else(|| {
            status(
                404,
                Some("document_missing_exception"),
                format!("[{}][{}]: document missing", doc_type, id),
            )
        })?;
        if let (Some(target), Some(changes)) = (existing.as_object_mut(), partial.as_object()) {
            for (name, value) in changes {
                target.insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn delete_doc(&mut self, index: &str, doc_type: &str, id: &str) -> TransportResult<()> {
        if self.take_throttle(id) {
            return Err(status(429, Some("es_rejected_execution_exception"), "rejected execution"));
        }
        let idx = self.indices.get_mut(index).ok_or_else(|| index_missing(index))?;
        match idx.docs.remove(&(doc_type.to_string(), id.to_string())) {
            Some(_) => Ok(()),
            None => Err(status(404, None, format!("{{\"found\":false,\"_id\":\"{}\"}}", id))),
        }
    }
}

fn bulk_item(action: &str, index: &str, doc_type: &str, id: &str, result: TransportResult<u16>) -> Value {
    let mut item = json!({ "_index": index, "_type": doc_type, "_id": id });
    match result {
        Ok(code) => item["status"] = json!(code),
        Err(TransportError::Status {
            status,
            error_type,
            reason,
        }) => {
            item["status"] = json!(status);
            if let Some(error_type) = error_type {
                item["error"] = json!({ "type": error_type, "reason": reason });
            }
        }
        Err(other) => {
            item["status"] = json!(500);
            item["error"] = json!({ "type": "exception", "reason": other.to_string() });
        }
    }
    let mut wrapper = Map::new();
    wrapper.insert(action.to_string(), item);
    Value::Object(wrapper)
}

#[async_trait]
impl EngineTransport for FakeEngine {
    async fn index_exists(&self, index: &str) -> TransportResult<bool> {
        let mut state = self.state.lock();
        state.log(format!("index_exists {}", index));
        Ok(state.indices.contains_key(index))
    }

    async fn create_index(&self, index: &str, body: &Value) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.log(format!("create_index {}", index));
        if state.indices.contains_key(index) {
            return Err(status(
                400,
                Some("index_already_exists_exception"),
                format!("index [{}] already exists", index),
            ));
        }
        let analysis = body
            .pointer("/settings/analysis")
            .cloned()
            .unwrap_or_else(|| json!({}));
        state.indices.insert(
            index.to_string(),
            FakeIndex {
                analysis,
                ..FakeIndex::default()
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.log(format!("delete_index {}", index));
        state
            .indices
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| index_missing(index))
    }

    async fn put_mapping(&self, index: &str, doc_type: &str, body: &Value) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.log(format!("put_mapping {} {}", index, doc_type));
        let idx = state.indices.get_mut(index).ok_or_else(|| index_missing(index))?;

        let properties = body
            .get(doc_type)
            .and_then(|t| t.get("properties"))
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        for (name, field) in &properties {
            for existing in idx.mappings.values() {
                if let Some(current) = existing.get(name) {
                    if current.get("type") != field.get("type") || current.get("index") != field.get("index") {
                        return Err(status(
                            400,
                            Some("merge_mapping_exception"),
                            format!("mapper [{}] has different options", name),
                        ));
                    }
                }
            }
        }

        idx.mappings
            .entry(doc_type.to_string())
            .or_default()
            .extend(properties);
        Ok(())
    }

    async fn get_mapping(&self, index: &str) -> TransportResult<Value> {
        let mut state = self.state.lock();
        state.log(format!("get_mapping {}", index));
        let idx = state.indices.get(index).ok_or_else(|| index_missing(index))?;

        let mut types = Map::new();
        for (doc_type, properties) in &idx.mappings {
            types.insert(doc_type.clone(), json!({ "properties": properties }));
        }
        let mut response = Map::new();
        response.insert(index.to_string(), json!({ "mappings": types }));
        Ok(Value::Object(response))
    }

    async fn get_settings(&self, index: &str) -> TransportResult<Value> {
        let mut state = self.state.lock();
        state.log(format!("get_settings {}", index));
        let idx = state.indices.get(index).ok_or_else(|| index_missing(index))?;

        let mut response = Map::new();
        response.insert(
            index.to_string(),
            json!({ "settings": { "index": {
                "number_of_shards": "5",
                "analysis": idx.analysis,
            }}}),
        );
        Ok(Value::Object(response))
    }

    async fn refresh(&self, index: &str) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.log(format!("refresh {}", index));
        if state.indices.contains_key(index) {
            Ok(())
        } else {
            Err(index_missing(index))
        }
    }

    async fn analyze(&self, index: Option<&str>, body: &Value) -> TransportResult<AnalyzeResponse> {
        let mut state = self.state.lock();
        state.log(format!("analyze {}", index.unwrap_or("_all")));

        let analysis = match index {
            Some(index) => state
                .indices
                .get(index)
                .ok_or_else(|| index_missing(index))?
                .analysis
                .clone(),
            None => Value::Null,
        };
        let text = body.get("text").and_then(Value::as_str).unwrap_or_default();

        let tokens = match body.get("analyzer").and_then(Value::as_str) {
            Some(analyzer) => analyze_named(&analysis, analyzer, text)?,
            None => {
                let tokenizer = body.get("tokenizer").and_then(Value::as_str).unwrap_or("standard");
                run_pipeline(
                    &analysis,
                    &strings(body.get("char_filter")),
                    tokenizer,
                    &strings(body.get("filter")),
                    text,
                )
            }
        };

        Ok(AnalyzeResponse {
            tokens: tokens
                .into_iter()
                .enumerate()
                .map(|(position, token)| AnalyzedToken {
                    start_offset: 0,
                    end_offset: token.len(),
                    token,
                    token_type: "<ALPHANUM>".to_string(),
                    position,
                })
                .collect(),
        })
    }

    async fn bulk(&self, body: String) -> TransportResult<BulkResponse> {
        let mut state = self.state.lock();
        state.log("bulk");

        if let Some(err) = state.bulk_failures.pop_front() {
            return Err(err);
        }

        let mut lines = body.lines().filter(|l| !l.trim().is_empty());
        let mut items = Vec::new();

        while let Some(line) = lines.next() {
            let action: Value = serde_json::from_str(line)?;
            let Some((kind, meta)) = action.as_object().and_then(|a| a.iter().next()) else {
                return Err(status(400, Some("action_request_validation_exception"), "malformed action line"));
            };
            let index = meta.get("_index").and_then(Value::as_str).unwrap_or_default().to_string();
            let doc_type = meta.get("_type").and_then(Value::as_str).unwrap_or_default().to_string();
            let id = meta.get("_id").and_then(Value::as_str).unwrap_or_default().to_string();

            let result = match kind.as_str() {
                "index" => {
                    let payload: Value = serde_json::from_str(lines.next().unwrap_or("{}"))?;
                    state
                        .index_doc(&index, &doc_type, &id, &payload)
                        .map(|created| if created { 201 } else { 200 })
                }
                "update" => {
                    let payload: Value = serde_json::from_str(lines.next().unwrap_or("{}"))?;
                    state.update_doc(&index, &doc_type, &id, &payload).map(|_| 200)
                }
                "delete" => state.delete_doc(&index, &doc_type, &id).map(|_| 200),
                other => Err(status(
                    400,
                    Some("illegal_argument_exception"),
                    format!("unknown action [{}]", other),
                )),
            };
            items.push(bulk_item(kind, &index, &doc_type, &id, result));
        }

        if std::mem::take(&mut state.truncate_next_bulk) {
            items.pop();
        }
        if let Some(flag) = state.cancel_on_bulk.take() {
            flag.cancel();
        }

        let errors = items.iter().any(|item| {
            item.as_object()
                .and_then(|o| o.values().next())
                .and_then(|i| i.get("status"))
                .and_then(Value::as_u64)
                .is_some_and(|s| s >= 300)
        });
        Ok(serde_json::from_value(json!({
            "took": 3,
            "errors": errors,
            "items": items,
        }))?)
    }

    async fn index_document(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: &Value,
    ) -> TransportResult<WriteAck> {
        let mut state = self.state.lock();
        state.log(format!("index_document {}", id));
        let created = state.index_doc(index, doc_type, id, body)?;
        Ok(ack(id, created))
    }

    async fn update_document(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: &Value,
    ) -> TransportResult<WriteAck> {
        let mut state = self.state.lock();
        state.log(format!("update_document {}", id));
        state.update_doc(index, doc_type, id, body)?;
        Ok(ack(id, false))
    }

    async fn delete_document(&self, index: &str, doc_type: &str, id: &str) -> TransportResult<WriteAck> {
        let mut state = self.state.lock();
        state.log(format!("delete_document {}", id));
        state.delete_doc(index, doc_type, id)?;
        Ok(WriteAck {
            found: Some(true),
            ..ack(id, false)
        })
    }

    async fn search(
        &self,
        index: &str,
        doc_type: Option<&str>,
        body: &Value,
    ) -> TransportResult<SearchResponse> {
        let mut state = self.state.lock();
        state.log(format!("search {}", index));
        let idx = state.indices.get(index).ok_or_else(|| index_missing(index))?;

        let query = body.get("query").cloned().unwrap_or_else(|| json!({ "match_all": {} }));
        let min_score = body.get("min_score").and_then(Value::as_f64).unwrap_or(0.0);

        let mut matched = Vec::new();
        for ((t, id), source) in &idx.docs {
            if doc_type.is_some_and(|wanted| wanted != t.as_str()) {
                continue;
            }
            if let Some((score, _)) = idx.score(t, source, &query)? {
                if score >= min_score {
                    matched.push((score, t.clone(), id.clone(), source.clone()));
                }
            }
        }
        matched.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.2.cmp(&b.2)));

        let aggregations = match body.get("aggs").and_then(Value::as_object) {
            Some(aggs) => {
                let mut results = Map::new();
                for (name, agg) in aggs {
                    let field = agg.pointer("/terms/field").and_then(Value::as_str).unwrap_or_default();
                    // 2.x semantics: 10 buckets unless asked, 0 means all of them
                    let size = match agg.pointer("/terms/size").and_then(Value::as_u64) {
                        Some(0) => usize::MAX,
                        Some(n) => n as usize,
                        None => 10,
                    };
                    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
                    for (_, t, _, source) in &matched {
                        let terms: BTreeSet<String> = idx.terms(t, field, source).into_iter().collect();
                        for term in terms {
                            *counts.entry(term).or_default() += 1;
                        }
                    }
                    let mut ranked: Vec<(String, u64)> = counts.into_iter().collect();
                    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                    let other: u64 = ranked.iter().skip(size).map(|(_, count)| count).sum();
                    // Key order on purpose; callers must sort
                    let mut kept: Vec<(String, u64)> = ranked.into_iter().take(size).collect();
                    kept.sort_by(|a, b| a.0.cmp(&b.0));
                    let buckets: Vec<Value> = kept
                        .into_iter()
                        .map(|(key, count)| json!({ "key": key, "doc_count": count }))
                        .collect();
                    results.insert(
                        name.clone(),
                        json!({ "sum_other_doc_count": other, "buckets": buckets }),
                    );
                }
                Some(Value::Object(results))
            }
            None => None,
        };

        let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let total = matched.len();
        let max_score = matched.first().map(|m| m.0);

        let hits: Vec<Value> = matched
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(score, t, id, source)| {
                json!({ "_index": index, "_type": t, "_id": id, "_score": score, "_source": source })
            })
            .collect();

        let mut response = json!({
            "took": 1,
            "timed_out": false,
            "hits": { "total": total, "max_score": max_score, "hits": hits },
        });
        if let Some(aggregations) = aggregations {
            response["aggregations"] = aggregations;
        }
        Ok(serde_json::from_value(response)?)
    }

    async fn explain(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        body: &Value,
    ) -> TransportResult<ExplainResponse> {
        let mut state = self.state.lock();
        state.log(format!("explain {}", id));
        let idx = state.indices.get(index).ok_or_else(|| index_missing(index))?;

        let source = idx
            .docs
            .get(&(doc_type.to_string(), id.to_string()))
            .ok_or_else(|| status(404, None, format!("{{\"_id\":\"{}\",\"matched\":false}}", id)))?;
        let query = body.get("query").cloned().unwrap_or_else(|| json!({ "match_all": {} }));

        let explanation = match idx.score(doc_type, source, &query)? {
            Some((score, parts)) => json!({
                "value": score,
                "description": "sum of:",
                "details": parts
                    .iter()
                    .map(|p| json!({ "value": 1.0, "description": format!("weight({})", p), "details": [] }))
                    .collect::<Vec<_>>(),
            }),
            None => json!({ "value": 0.0, "description": "no matching term", "details": [] }),
        };
        let matched = explanation["value"].as_f64().is_some_and(|v| v > 0.0);

        Ok(serde_json::from_value(json!({
            "_index": index,
            "_type": doc_type,
            "_id": id,
            "matched": matched,
            "explanation": explanation,
        }))?)
    }

    async fn suggest(&self, index: &str, body: &Value) -> TransportResult<Value> {
        let mut state = self.state.lock();
        state.log(format!("suggest {}", index));
        let idx = state.indices.get(index).ok_or_else(|| index_missing(index))?;

        let mut response = json!({ "_shards": { "total": 5, "successful": 5, "failed": 0 } });
        let Some(suggesters) = body.as_object() else {
            return Ok(response);
        };

        for (name, suggester) in suggesters {
            let text = suggester.get("text").and_then(Value::as_str).unwrap_or_default();
            let field = suggester.pointer("/term/field").and_then(Value::as_str).unwrap_or_default();

            let mut vocabulary: BTreeMap<String, u64> = BTreeMap::new();
            for ((t, _), source) in &idx.docs {
                let terms: BTreeSet<String> = idx.terms(t, field, source).into_iter().collect();
                for term in terms {
                    *vocabulary.entry(term).or_default() += 1;
                }
            }

            let lowered = text.to_lowercase();
            let mut cursor = 0;
            let mut entries = Vec::new();
            for token in tokenize_standard(&lowered) {
                let offset = lowered[cursor..].find(&token).map(|o| o + cursor).unwrap_or(cursor);
                cursor = offset + token.len();

                let mut options: Vec<(f64, u64, String)> = if vocabulary.contains_key(&token) {
                    Vec::new()
                } else {
                    vocabulary
                        .iter()
                        .filter_map(|(term, freq)| {
                            let distance = levenshtein(&token, term);
                            (distance <= 2).then(|| {
                                let longest = token.chars().count().max(term.chars().count()) as f64;
                                (1.0 - distance as f64 / longest, *freq, term.clone())
                            })
                        })
                        .collect()
                };
                options.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

                entries.push(json!({
                    "text": token,
                    "offset": offset,
                    "length": token.len(),
                    "options": options
                        .into_iter()
                        .map(|(score, freq, text)| json!({ "text": text, "score": score, "freq": freq }))
                        .collect::<Vec<_>>(),
                }));
            }
            response[name.as_str()] = json!(entries);
        }

        Ok(response)
    }
}

/// Yelp-style review schema used across the suites
pub fn review_schema(index: &str) -> search_orchestrator::schema::IndexSchema {
    use search_orchestrator::schema::{FieldMapping, IndexSchema, TypeMapping};

    IndexSchema::new(index)
        .with_type(
            TypeMapping::new("review")
                .field(FieldMapping::analyzed("text", "english"))
                .field(FieldMapping::keyword("business_id"))
                .field(FieldMapping::keyword("user_id"))
                .field(FieldMapping::integer("stars"))
                .field(FieldMapping::float("sent_per_token"))
                .field(FieldMapping::date("date").with_format("yyyy-MM-dd")),
        )
        .with_type(
            TypeMapping::new("business")
                .field(FieldMapping::keyword("business_id"))
                .field(FieldMapping::text("name"))
                .field(FieldMapping::keyword("city")),
        )
}
