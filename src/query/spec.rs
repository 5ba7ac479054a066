//! Query specifications

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Aggregation name used in request bodies
pub(crate) const TERMS_AGGREGATION: &str = "terms_by_field";

/// Terms bucket size asking for every distinct term
pub const ALL_BUCKETS: usize = 0;

/// How the analyzed tokens of a match query combine
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatchOperator {
    /// Every token must match
    And,
    /// At least one token must match
    #[default]
    Or,
}

/// How a query uses a field, which decides the mapping it needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUse {
    /// Match and free text: any mapped field
    Search,
    /// Exact term: must be not_analyzed
    Exact,
    /// More-like-this: must be analyzed text
    Similarity,
    /// Terms aggregation: must be not_analyzed
    Aggregation,
}

/// A query, immutable once built; aggregations wrap another query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuerySpec {
    MatchAll,

    Match {
        field: String,
        text: String,
        operator: MatchOperator,
    },

    MoreLikeThis {
        fields: Vec<String>,
        like_text: String,
        analyzer: Option<String>,
        /// Terms occurring fewer times in the sample are ignored
        min_term_freq: u32,
    },

    /// Constant-score filter on an exact value
    TermFilter { field: String, value: Value },

    /// Free text in the engine's query-string syntax
    QueryString {
        query: String,
        default_field: Option<String>,
    },

    /// Term counts of `field` over the documents matching `query`.
    /// `size: None` leaves the bucket count to the engine (10 buckets).
    Aggregation {
        query: Box<QuerySpec>,
        field: String,
        size: Option<usize>,
    },
}

impl QuerySpec {
    pub fn match_query(field: impl Into<String>, text: impl Into<String>, operator: MatchOperator) -> Self {
        Self::Match {
            field: field.into(),
            text: text.into(),
            operator,
        }
    }

    pub fn more_like_this<I, S>(fields: I, like_text: impl Into<String>, min_term_freq: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MoreLikeThis {
            fields: fields.into_iter().map(Into::into).collect(),
            like_text: like_text.into(),
            analyzer: None,
            min_term_freq,
        }
    }

    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::TermFilter {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn query_string(query: impl Into<String>) -> Self {
        Self::QueryString {
            query: query.into(),
            default_field: None,
        }
    }

    /// Count every term of `field` over the documents matching `self`
    pub fn aggregate(self, field: impl Into<String>) -> Self {
        self.aggregate_top(field, ALL_BUCKETS)
    }

    /// Count the `size` most frequent terms of `field`
    pub fn aggregate_top(self, field: impl Into<String>, size: usize) -> Self {
        Self::Aggregation {
            query: Box::new(self),
            field: field.into(),
            size: Some(size),
        }
    }

    /// The `query` clause
    pub fn to_query(&self) -> Value {
        match self {
            QuerySpec::MatchAll => json!({ "match_all": {} }),
            QuerySpec::Match {
                field,
                text,
                operator,
            } => {
                let mut clause = Map::new();
                clause.insert(
                    field.clone(),
                    json!({ "query": text, "operator": operator.as_ref() }),
                );
                json!({ "match": clause })
            }
            QuerySpec::MoreLikeThis {
                fields,
                like_text,
                analyzer,
                min_term_freq,
            } => {
                let mut clause = json!({
                    "fields": fields,
                    "like": like_text,
                    "min_term_freq": min_term_freq,
                });
                if let Some(analyzer) = analyzer {
                    clause["analyzer"] = json!(analyzer);
                }
                json!({ "more_like_this": clause })
            }
            QuerySpec::TermFilter { field, value } => {
                let mut term = Map::new();
                term.insert(field.clone(), value.clone());
                json!({ "constant_score": { "filter": { "term": term } } })
            }
            QuerySpec::QueryString {
                query,
                default_field,
            } => {
                let mut clause = json!({ "query": query });
                if let Some(field) = default_field {
                    clause["default_field"] = json!(field);
                }
                json!({ "query_string": clause })
            }
            QuerySpec::Aggregation { query, .. } => query.to_query(),
        }
    }

    /// The `aggs` clause, if any
    pub fn to_aggregations(&self) -> Option<Value> {
        match self {
            QuerySpec::Aggregation { field, size, .. } => {
                let mut terms = json!({ "field": field });
                if let Some(size) = size {
                    terms["size"] = json!(size);
                }
                let mut aggs = Map::new();
                aggs.insert(TERMS_AGGREGATION.to_string(), json!({ "terms": terms }));
                Some(Value::Object(aggs))
            }
            _ => None,
        }
    }

    /// Search request body
    pub fn to_body(&self, options: &SearchOptions) -> Value {
        let mut body = json!({ "query": self.to_query() });
        if let Some(aggs) = self.to_aggregations() {
            body["aggs"] = aggs;
        }
        if let Some(size) = options.size {
            body["size"] = json!(size);
        }
        if let Some(from) = options.from {
            body["from"] = json!(from);
        }
        if let Some(min_score) = options.min_score {
            body["min_score"] = json!(min_score);
        }
        body
    }

    /// Fields the query touches and how
    pub fn referenced_fields(&self) -> Vec<(&str, FieldUse)> {
        match self {
            QuerySpec::MatchAll => Vec::new(),
            QuerySpec::Match { field, .. } => vec![(field.as_str(), FieldUse::Search)],
            QuerySpec::MoreLikeThis { fields, .. } => fields
                .iter()
                .map(|f| (f.as_str(), FieldUse::Similarity))
                .collect(),
            QuerySpec::TermFilter { field, .. } => vec![(field.as_str(), FieldUse::Exact)],
            QuerySpec::QueryString { default_field, .. } => default_field
                .iter()
                .map(|f| (f.as_str(), FieldUse::Search))
                .collect(),
            QuerySpec::Aggregation { query, field, .. } => {
                let mut fields = query.referenced_fields();
                fields.push((field.as_str(), FieldUse::Aggregation));
                fields
            }
        }
    }

    /// Short name used in errors and logs
    pub fn kind(&self) -> &'static str {
        match self {
            QuerySpec::MatchAll => "match_all",
            QuerySpec::Match { .. } => "match",
            QuerySpec::MoreLikeThis { .. } => "more_like_this",
            QuerySpec::TermFilter { .. } => "term",
            QuerySpec::QueryString { .. } => "query_string",
            QuerySpec::Aggregation { .. } => "terms aggregation",
        }
    }
}

/// Paging and score threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub size: Option<usize>,
    pub from: Option<usize>,
    /// Hits scoring below this are dropped; useful to cut more-like-this noise
    pub min_score: Option<f64>,
}

impl SearchOptions {
    pub fn size(size: usize) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn with_from(mut self, from: usize) -> Self {
        self.from = Some(from);
        self
    }

    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }
}
