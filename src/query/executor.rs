//! Query execution against a live index

use crate::engine::{EngineTransport, RetryPolicy, TransportError};
use crate::query::error::{QueryError, QueryResult};
use crate::query::results::{term_counts, ExplanationNode, ExplanationTree, ResultSet, Suggestion, TermCount};
use crate::query::spec::{FieldUse, MatchOperator, QuerySpec, SearchOptions, TERMS_AGGREGATION};
use crate::schema::{FieldKind, FieldMapping, IndexMode, IndexSchema, SchemaError, SchemaManager};
use dashmap::DashMap;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the term suggester in suggest bodies
const SUGGESTION: &str = "term-suggestion";

/// Builds queries, checks them against the live mapping and decodes results
///
/// Live mappings are cached per index. A field missing from the cache forces
/// one reload; call [`QueryExecutor::invalidate`] after changing a mapping
/// in place.
pub struct QueryExecutor {
    transport: Arc<dyn EngineTransport>,
    schema: SchemaManager,
    mappings: DashMap<String, Arc<IndexSchema>>,
    retry: RetryPolicy,
}

impl QueryExecutor {
    pub fn new(transport: Arc<dyn EngineTransport>) -> Self {
        Self {
            schema: SchemaManager::new(transport.clone()),
            transport,
            mappings: DashMap::new(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.schema = self.schema.with_retry(retry);
        self.retry = retry;
        self
    }

    /// Documents whose `field` matches the analyzed tokens of `text`
    pub async fn match_query(
        &self,
        index: &str,
        doc_type: &str,
        field: &str,
        text: &str,
        operator: MatchOperator,
    ) -> QueryResult<ResultSet> {
        let spec = QuerySpec::match_query(field, text, operator);
        self.search(index, Some(doc_type), &spec, &SearchOptions::default())
            .await
    }

    /// Documents sharing significant terms with `sample_text`
    pub async fn more_like_this(
        &self,
        index: &str,
        doc_type: &str,
        fields: &[&str],
        sample_text: &str,
        analyzer: Option<&str>,
        min_term_frequency: u32,
    ) -> QueryResult<ResultSet> {
        let spec = QuerySpec::MoreLikeThis {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            like_text: sample_text.to_string(),
            analyzer: analyzer.map(str::to_string),
            min_term_freq: min_term_frequency,
        };
        self.search(index, Some(doc_type), &spec, &SearchOptions::default())
            .await
    }

    /// Documents whose not_analyzed `field` equals `value` exactly
    pub async fn exact_term_filter(
        &self,
        index: &str,
        doc_type: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> QueryResult<ResultSet> {
        let spec = QuerySpec::term(field, value);
        self.search(index, Some(doc_type), &spec, &SearchOptions::default())
            .await
    }

    /// Document counts per term of `aggregation_field` over the documents
    /// matching `query`, highest count first
    pub async fn terms_aggregation(
        &self,
        index: &str,
        doc_type: &str,
        query: &QuerySpec,
        aggregation_field: &str,
    ) -> QueryResult<Vec<TermCount>> {
        let spec = query.clone().aggregate(aggregation_field);
        self.check_fields(index, Some(doc_type), &spec).await?;

        let body = spec.to_body(&SearchOptions::size(0));
        let (result, _) = self
            .retry
            .run("search", || self.transport.search(index, Some(doc_type), &body))
            .await;
        let response = result.map_err(|e| engine_error(index, e))?;

        let counts = term_counts(response.aggregations.as_ref(), TERMS_AGGREGATION).map_err(QueryError::Decode)?;
        let uncounted = response
            .aggregations
            .as_ref()
            .and_then(|aggs| aggs.get(TERMS_AGGREGATION))
            .and_then(|agg| agg.get("sum_other_doc_count"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if uncounted > 0 {
            warn!(
                index = %index,
                field = %aggregation_field,
                uncounted,
                "Terms aggregation truncated by the engine"
            );
        }
        debug!(
            index = %index,
            field = %aggregation_field,
            buckets = counts.len(),
            "Terms aggregated"
        );
        Ok(counts)
    }

    /// Scoring breakdown of document `id` against `query`
    pub async fn explain(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        query: &QuerySpec,
    ) -> QueryResult<ExplanationTree> {
        self.check_fields(index, Some(doc_type), query).await?;

        let body = json!({ "query": query.to_query() });
        let (result, _) = self
            .retry
            .run("explain", || self.transport.explain(index, doc_type, id, &body))
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_not_found() && e.error_type() != Some("index_not_found_exception") => {
                return Err(QueryError::DocumentNotFound {
                    index: index.to_string(),
                    doc_type: doc_type.to_string(),
                    id: id.to_string(),
                })
            }
            Err(e) => return Err(engine_error(index, e)),
        };

        let root = match response.explanation {
            Some(raw) => ExplanationNode::from(raw),
            None if !response.matched => ExplanationNode {
                value: 0.0,
                description: "no matching clause".to_string(),
                details: Vec::new(),
            },
            None => return Err(QueryError::Decode(format!("explain of '{}' matched without an explanation", id))),
        };

        Ok(ExplanationTree {
            document_id: response.id.unwrap_or_else(|| id.to_string()),
            matched: response.matched,
            root,
        })
    }

    /// Candidate corrections for each term of `text`, looked up in `field`
    pub async fn suggest(&self, index: &str, field: &str, text: &str) -> QueryResult<Vec<Suggestion>> {
        let spec = QuerySpec::QueryString {
            query: text.to_string(),
            default_field: Some(field.to_string()),
        };
        self.check_fields(index, None, &spec).await?;

        let mut body = Map::new();
        body.insert(
            SUGGESTION.to_string(),
            json!({ "text": text, "term": { "field": field } }),
        );
        let body = Value::Object(body);

        let (result, _) = self
            .retry
            .run("suggest", || self.transport.suggest(index, &body))
            .await;
        let response = result.map_err(|e| engine_error(index, e))?;

        let suggestions = response
            .get(SUGGESTION)
            .cloned()
            .ok_or_else(|| QueryError::Decode(format!("suggestion '{}' missing from response", SUGGESTION)))?;
        serde_json::from_value(suggestions).map_err(|e| QueryError::Decode(e.to_string()))
    }

    /// Run any query, optionally restricted to one document type
    pub async fn search(
        &self,
        index: &str,
        doc_type: Option<&str>,
        query: &QuerySpec,
        options: &SearchOptions,
    ) -> QueryResult<ResultSet> {
        self.check_fields(index, doc_type, query).await?;

        let body = query.to_body(options);
        let (result, attempts) = self
            .retry
            .run("search", || self.transport.search(index, doc_type, &body))
            .await;
        let results = ResultSet::from(result.map_err(|e| engine_error(index, e))?);

        debug!(
            index = %index,
            query = query.kind(),
            total = results.total,
            returned = results.len(),
            took_ms = results.took_ms,
            attempts,
            "Search executed"
        );
        Ok(results)
    }

    /// Drop the cached mapping of `index`
    pub fn invalidate(&self, index: &str) {
        if self.mappings.remove(index).is_some() {
            info!(index = %index, "Cached mapping invalidated");
        }
    }

    async fn mapping(&self, index: &str, reload: bool) -> QueryResult<Arc<IndexSchema>> {
        if !reload {
            if let Some(cached) = self.mappings.get(index) {
                return Ok(cached.value().clone());
            }
        }

        let live = Arc::new(self.schema.describe(index).await?);
        self.mappings.insert(index.to_string(), live.clone());
        Ok(live)
    }

    /// Fail fast on fields the query cannot use as mapped
    async fn check_fields(&self, index: &str, doc_type: Option<&str>, query: &QuerySpec) -> QueryResult<()> {
        let fields = query.referenced_fields();
        if fields.is_empty() && doc_type.is_none() {
            return Ok(());
        }

        let mut schema = self.mapping(index, false).await?;
        let stale = doc_type.is_some_and(|t| schema.doc_type(t).is_none())
            || fields
                .iter()
                .any(|(field, _)| find_field(&schema, doc_type, field).is_none());
        if stale {
            schema = self.mapping(index, true).await?;
        }

        if let Some(doc_type) = doc_type {
            if schema.doc_type(doc_type).is_none() {
                return Err(SchemaError::TypeNotFound {
                    index: index.to_string(),
                    doc_type: doc_type.to_string(),
                }
                .into());
            }
        }

        for (field, usage) in fields {
            let mapping = find_field(&schema, doc_type, field).ok_or_else(|| QueryError::UnknownField {
                index: index.to_string(),
                doc_type: doc_type.map(str::to_string),
                field: field.to_string(),
            })?;

            if let Some(expected) = unmet_requirement(mapping, usage) {
                return Err(QueryError::SchemaMismatch {
                    index: index.to_string(),
                    field: field.to_string(),
                    query: query.kind(),
                    expected,
                    actual: mapping.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn find_field<'a>(schema: &'a IndexSchema, doc_type: Option<&str>, field: &str) -> Option<&'a FieldMapping> {
    match doc_type {
        Some(doc_type) => schema.field(doc_type, field),
        None => schema.types().iter().find_map(|t| t.get(field)),
    }
}

/// What `usage` needs that `mapping` lacks
fn unmet_requirement(mapping: &FieldMapping, usage: FieldUse) -> Option<&'static str> {
    match usage {
        FieldUse::Search => None,
        FieldUse::Exact | FieldUse::Aggregation if mapping.mode != IndexMode::NotAnalyzed => {
            Some("a not_analyzed field")
        }
        FieldUse::Similarity if mapping.kind != FieldKind::Text => Some("an analyzed text field"),
        _ => None,
    }
}

fn engine_error(index: &str, err: TransportError) -> QueryError {
    if err.error_type() == Some("index_not_found_exception") || (err.is_not_found() && err.error_type().is_none()) {
        QueryError::Schema(SchemaError::IndexNotFound(index.to_string()))
    } else {
        QueryError::Transport(err)
    }
}
