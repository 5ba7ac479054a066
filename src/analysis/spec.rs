//! Analyzer specifications

use crate::analysis::builtin::builtin_analyzer;
use crate::analysis::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Where an analyzer definition comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerOrigin {
    /// Shipped with the engine
    Builtin,
    /// Defined in index settings
    #[default]
    Custom,
}

/// A named analysis pipeline: character filters, one tokenizer, token filters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerSpec {
    pub identifier: String,

    #[serde(default)]
    pub char_filters: Vec<String>,

    pub tokenizer: String,

    #[serde(default)]
    pub filters: Vec<String>,

    /// Allow the identifier to shadow a built-in analyzer
    #[serde(default)]
    pub override_builtin: bool,

    #[serde(default, skip_serializing)]
    pub origin: AnalyzerOrigin,
}

impl AnalyzerSpec {
    /// Start building a custom analyzer
    pub fn builder(identifier: impl Into<String>) -> AnalyzerSpecBuilder {
        AnalyzerSpecBuilder {
            identifier: identifier.into(),
            char_filters: Vec::new(),
            tokenizer: None,
            filters: Vec::new(),
            override_builtin: false,
        }
    }

    pub fn is_builtin(&self) -> bool {
        self.origin == AnalyzerOrigin::Builtin
    }

    /// Check the identifier and the single-tokenizer rule
    pub fn validate(&self) -> ConfigResult<()> {
        validate_identifier(&self.identifier)?;

        if self.tokenizer.trim().is_empty() {
            return Err(ConfigError::MissingTokenizer(self.identifier.clone()));
        }

        for name in self.char_filters.iter().chain(self.filters.iter()) {
            validate_identifier(name)?;
        }

        Ok(())
    }

    /// Body of this analyzer under `settings.analysis.analyzer`
    pub fn to_settings_body(&self) -> Value {
        let mut body = json!({
            "type": "custom",
            "tokenizer": self.tokenizer,
        });

        if !self.char_filters.is_empty() {
            body["char_filter"] = json!(self.char_filters);
        }
        if !self.filters.is_empty() {
            body["filter"] = json!(self.filters);
        }

        body
    }

    /// Rebuild an analyzer from the body the engine reports in its settings
    pub fn from_settings_body(identifier: &str, body: &Value) -> ConfigResult<Self> {
        let kind = body.get("type").and_then(Value::as_str).unwrap_or("custom");

        if kind != "custom" {
            // Configured variant of a built-in analyzer, e.g. {"type": "standard", "stopwords": ...}
            let base = builtin_analyzer(kind).ok_or_else(|| {
                ConfigError::Parse(format!(
                    "analyzer '{}' has unknown type '{}'",
                    identifier, kind
                ))
            })?;
            return Ok(Self {
                identifier: identifier.to_string(),
                origin: AnalyzerOrigin::Custom,
                ..base.clone()
            });
        }

        let tokenizer = body
            .get("tokenizer")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigError::MissingTokenizer(identifier.to_string()))?;

        Ok(Self {
            identifier: identifier.to_string(),
            char_filters: string_list(body.get("char_filter")),
            tokenizer: tokenizer.to_string(),
            filters: string_list(body.get("filter")),
            override_builtin: builtin_analyzer(identifier).is_some(),
            origin: AnalyzerOrigin::Custom,
        })
    }
}

/// Builder for [`AnalyzerSpec`]
#[derive(Debug, Clone)]
pub struct AnalyzerSpecBuilder {
    identifier: String,
    char_filters: Vec<String>,
    tokenizer: Option<String>,
    filters: Vec<String>,
    override_builtin: bool,
}

impl AnalyzerSpecBuilder {
    pub fn char_filter(mut self, name: impl Into<String>) -> Self {
        self.char_filters.push(name.into());
        self
    }

    pub fn tokenizer(mut self, name: impl Into<String>) -> Self {
        self.tokenizer = Some(name.into());
        self
    }

    pub fn filter(mut self, name: impl Into<String>) -> Self {
        self.filters.push(name.into());
        self
    }

    pub fn filters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn override_builtin(mut self) -> Self {
        self.override_builtin = true;
        self
    }

    pub fn build(self) -> ConfigResult<AnalyzerSpec> {
        let tokenizer = self
            .tokenizer
            .ok_or_else(|| ConfigError::MissingTokenizer(self.identifier.clone()))?;

        let spec = AnalyzerSpec {
            identifier: self.identifier,
            char_filters: self.char_filters,
            tokenizer,
            filters: self.filters,
            override_builtin: self.override_builtin,
            origin: AnalyzerOrigin::Custom,
        };
        spec.validate()?;
        Ok(spec)
    }
}

/// Names the engine accepts for analyzers and analysis components
pub(crate) fn validate_identifier(name: &str) -> ConfigResult<()> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.starts_with('_') {
        Some("must not start with '_'")
    } else if name.chars().any(|c| c.is_whitespace() || c == ',' || c == '"') {
        Some("must not contain whitespace, commas or quotes")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidIdentifier {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// Settings may report a list either as an array or as a single comma separated string
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
