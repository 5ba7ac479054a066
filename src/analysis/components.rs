//! Analysis building blocks: character filters, tokenizers and token filters

use crate::analysis::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// The kind of analysis component a name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    #[strum(serialize = "character filter")]
    CharFilter,
    #[strum(serialize = "tokenizer")]
    Tokenizer,
    #[strum(serialize = "token filter")]
    TokenFilter,
    #[strum(serialize = "analyzer")]
    Analyzer,
}

impl ComponentKind {
    /// Key of this component section inside the analysis settings
    pub fn settings_key(&self) -> &'static str {
        match self {
            ComponentKind::CharFilter => "char_filter",
            ComponentKind::Tokenizer => "tokenizer",
            ComponentKind::TokenFilter => "filter",
            ComponentKind::Analyzer => "analyzer",
        }
    }
}

/// Character filters the engine ships with
pub const BUILTIN_CHAR_FILTERS: &[&str] = &["html_strip", "mapping", "pattern_replace"];

/// Tokenizers the engine ships with
pub const BUILTIN_TOKENIZERS: &[&str] = &[
    "standard",
    "classic",
    "keyword",
    "letter",
    "lowercase",
    "whitespace",
    "ngram",
    "edge_ngram",
    "pattern",
    "uax_url_email",
    "path_hierarchy",
    "thai",
];

/// Token filters the engine ships with
pub const BUILTIN_TOKEN_FILTERS: &[&str] = &[
    "standard",
    "lowercase",
    "uppercase",
    "asciifolding",
    "apostrophe",
    "classic",
    "decimal_digit",
    "edge_ngram",
    "elision",
    "keyword_marker",
    "kstem",
    "length",
    "ngram",
    "porter_stem",
    "possessive_english",
    "reverse",
    "shingle",
    "snowball",
    "stemmer",
    "stop",
    "synonym",
    "trim",
    "truncate",
    "unique",
    "word_delimiter",
];

/// Whether `name` is a component the engine provides without configuration
pub fn is_builtin(kind: ComponentKind, name: &str) -> bool {
    let names = match kind {
        ComponentKind::CharFilter => BUILTIN_CHAR_FILTERS,
        ComponentKind::Tokenizer => BUILTIN_TOKENIZERS,
        ComponentKind::TokenFilter => BUILTIN_TOKEN_FILTERS,
        ComponentKind::Analyzer => return crate::analysis::builtin::builtin_analyzer(name).is_some(),
    };
    names.contains(&name)
}

/// Custom character filter definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CharFilterKind {
    /// Literal replacements written as `"from=>to"`
    Mapping { mappings: Vec<String> },

    /// Strip HTML markup, optionally keeping some tags
    HtmlStrip {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        escaped_tags: Vec<String>,
    },

    /// Regex replacement
    PatternReplace {
        pattern: String,
        #[serde(default)]
        replacement: String,
    },
}

/// Custom tokenizer definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenizerKind {
    Standard {
        #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
        max_token_length: Option<u32>,
    },
    Pattern {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        flags: Option<String>,
    },
    #[serde(alias = "nGram")]
    Ngram {
        #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
        min_gram: Option<u32>,
        #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
        max_gram: Option<u32>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        token_chars: Vec<String>,
    },
    #[serde(alias = "edgeNGram")]
    EdgeNgram {
        #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
        min_gram: Option<u32>,
        #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
        max_gram: Option<u32>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        token_chars: Vec<String>,
    },
}

/// Stop word configuration: a named preset such as `_english_` or an explicit list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stopwords {
    Preset(String),
    List(Vec<String>),
}

/// Custom token filter definitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenFilterKind {
    Stop {
        stopwords: Stopwords,
        #[serde(default, deserialize_with = "lenient_bool", skip_serializing_if = "Option::is_none")]
        ignore_case: Option<bool>,
    },
    Stemmer {
        language: String,
    },
    Synonym {
        synonyms: Vec<String>,
    },
    Length {
        #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
        min: Option<u32>,
        #[serde(default, deserialize_with = "lenient_u32", skip_serializing_if = "Option::is_none")]
        max: Option<u32>,
    },
    Lowercase,
    KeywordMarker {
        keywords: Vec<String>,
    },
}

impl CharFilterKind {
    pub(crate) fn validate(&self, name: &str) -> ConfigResult<()> {
        match self {
            CharFilterKind::Mapping { mappings } => {
                if let Some(bad) = mappings.iter().find(|rule| !rule.contains("=>")) {
                    return Err(ConfigError::InvalidIdentifier {
                        name: name.to_string(),
                        reason: format!("mapping rule '{}' is not of the form 'from=>to'", bad),
                    });
                }
                Ok(())
            }
            CharFilterKind::HtmlStrip { .. } => Ok(()),
            CharFilterKind::PatternReplace { pattern, .. } => {
                check_pattern(ComponentKind::CharFilter, name, pattern)
            }
        }
    }
}

impl TokenizerKind {
    pub(crate) fn validate(&self, name: &str) -> ConfigResult<()> {
        match self {
            TokenizerKind::Pattern { pattern, .. } => {
                check_pattern(ComponentKind::Tokenizer, name, pattern)
            }
            TokenizerKind::Ngram { min_gram, max_gram, .. }
            | TokenizerKind::EdgeNgram { min_gram, max_gram, .. } => {
                match (min_gram, max_gram) {
                    (Some(min), Some(max)) if min > max => Err(ConfigError::InvalidIdentifier {
                        name: name.to_string(),
                        reason: format!("min_gram {} is greater than max_gram {}", min, max),
                    }),
                    _ => Ok(()),
                }
            }
            TokenizerKind::Standard { .. } => Ok(()),
        }
    }
}

impl TokenFilterKind {
    pub(crate) fn validate(&self, name: &str) -> ConfigResult<()> {
        match self {
            TokenFilterKind::Stop {
                stopwords: Stopwords::Preset(preset),
                ..
            } if !(preset.starts_with('_') && preset.ends_with('_')) => {
                Err(ConfigError::InvalidIdentifier {
                    name: name.to_string(),
                    reason: format!("stopword preset '{}' must look like '_english_'", preset),
                })
            }
            TokenFilterKind::Length {
                min: Some(min),
                max: Some(max),
            } if min > max => Err(ConfigError::InvalidIdentifier {
                name: name.to_string(),
                reason: format!("min length {} is greater than max length {}", min, max),
            }),
            TokenFilterKind::Synonym { synonyms } if synonyms.is_empty() => {
                Err(ConfigError::InvalidIdentifier {
                    name: name.to_string(),
                    reason: "synonym filter needs at least one rule".to_string(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Compile a pattern locally. The engine uses a different regex dialect, so
/// constructs this crate merely does not support are left for the engine to judge.
fn check_pattern(component: ComponentKind, name: &str, pattern: &str) -> ConfigResult<()> {
    match regex::Regex::new(pattern) {
        Ok(_) => Ok(()),
        Err(regex::Error::Syntax(msg)) if msg.contains("not supported") => Ok(()),
        Err(e) => Err(ConfigError::InvalidPattern {
            component,
            name: name.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Settings read back from the engine carry numbers as strings
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("expected unsigned integer, got {}", n))),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected unsigned integer, got '{}'", s))),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected unsigned integer, got {}",
            other
        ))),
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::String(s)) => s
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected boolean, got '{}'", s))),
        Some(other) => Err(serde::de::Error::custom(format!("expected boolean, got {}", other))),
    }
}
