//! Field and document-type mappings

use crate::analysis::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use tracing::warn;

/// Data kind of a mapped field
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
    /// Full text, analyzed
    Text,
    /// Exact string
    Keyword,
    Integer,
    Float,
    Date,
}

impl FieldKind {
    fn wire_type(&self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::Keyword => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Date => "date",
        }
    }
}

/// How a field is indexed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexMode {
    /// Run through an analyzer; `None` means the index default
    Analyzed { analyzer: Option<String> },
    /// Indexed verbatim
    NotAnalyzed,
}

/// Term vector detail stored per field
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TermVector {
    No,
    Yes,
    WithPositions,
    WithOffsets,
    WithPositionsOffsets,
    WithPositionsPayloads,
    WithPositionsOffsetsPayloads,
}

/// Binding of one field name to a data kind and indexing behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub name: String,
    pub kind: FieldKind,
    pub mode: IndexMode,
    pub store: bool,
    pub term_vector: Option<TermVector>,
    /// Date format, dates only
    pub format: Option<String>,
}

impl FieldMapping {
    fn new(name: impl Into<String>, kind: FieldKind, mode: IndexMode) -> Self {
        Self {
            name: name.into(),
            kind,
            mode,
            store: false,
            term_vector: None,
            format: None,
        }
    }

    /// Analyzed text using the index default analyzer
    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text, IndexMode::Analyzed { analyzer: None })
    }

    /// Analyzed text using a named analyzer
    pub fn analyzed(name: impl Into<String>, analyzer: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Text,
            IndexMode::Analyzed {
                analyzer: Some(analyzer.into()),
            },
        )
    }

    /// Exact string
    pub fn keyword(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Keyword, IndexMode::NotAnalyzed)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer, IndexMode::NotAnalyzed)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float, IndexMode::NotAnalyzed)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date, IndexMode::NotAnalyzed)
    }

    pub fn stored(mut self) -> Self {
        self.store = true;
        self
    }

    pub fn with_term_vector(mut self, term_vector: TermVector) -> Self {
        self.term_vector = Some(term_vector);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn is_analyzed(&self) -> bool {
        matches!(self.mode, IndexMode::Analyzed { .. })
    }

    /// Explicit analyzer reference, if any
    pub fn analyzer(&self) -> Option<&str> {
        match &self.mode {
            IndexMode::Analyzed { analyzer } => analyzer.as_deref(),
            IndexMode::NotAnalyzed => None,
        }
    }

    /// Check the analyzed/exact rules for this field
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |reason: &str| ConfigError::InvalidField {
            field: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.is_empty() {
            return Err(invalid("field name must not be empty"));
        }
        if self.name.starts_with('_') {
            return Err(invalid("names starting with '_' are reserved for metadata fields"));
        }
        if self.name.contains('.') {
            return Err(invalid("field names must not contain '.'"));
        }

        match (self.kind, &self.mode) {
            (FieldKind::Text, IndexMode::NotAnalyzed) => {
                return Err(invalid("text fields are analyzed; map exact strings as keyword"))
            }
            (FieldKind::Text, IndexMode::Analyzed { analyzer: Some(name) }) if name.trim().is_empty() => {
                return Err(invalid("analyzer reference must not be empty"))
            }
            (kind, IndexMode::Analyzed { .. }) if kind != FieldKind::Text => {
                return Err(invalid(&format!("{} fields cannot be analyzed", kind)))
            }
            _ => {}
        }

        if self.term_vector.is_some() && self.kind != FieldKind::Text {
            return Err(invalid("term vectors apply to text fields only"));
        }
        if self.format.is_some() && self.kind != FieldKind::Date {
            return Err(invalid("format applies to date fields only"));
        }

        Ok(())
    }

    /// Whether a field mapped as `self` may be mapped as `other` in the same index
    pub fn compatible_with(&self, other: &FieldMapping) -> bool {
        self.kind == other.kind && self.mode == other.mode
    }

    /// Mapping body of this field inside `properties`
    pub fn to_wire(&self) -> Value {
        let mut body = Map::new();
        body.insert("type".to_string(), json!(self.kind.wire_type()));

        match &self.mode {
            IndexMode::Analyzed { analyzer } => {
                body.insert("index".to_string(), json!("analyzed"));
                if let Some(analyzer) = analyzer {
                    body.insert("analyzer".to_string(), json!(analyzer));
                }
            }
            IndexMode::NotAnalyzed => {
                body.insert("index".to_string(), json!("not_analyzed"));
            }
        }

        if self.store {
            body.insert("store".to_string(), json!(true));
        }
        if let Some(term_vector) = self.term_vector {
            body.insert("term_vector".to_string(), json!(term_vector.to_string()));
        }
        if let Some(format) = &self.format {
            body.insert("format".to_string(), json!(format));
        }

        Value::Object(body)
    }

    /// Parse a field body as the engine reports it
    pub fn from_wire(name: &str, body: &Value) -> ConfigResult<Self> {
        let invalid = |reason: String| ConfigError::InvalidField {
            field: name.to_string(),
            reason,
        };

        let wire_type = body
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("mapping has no type".to_string()))?;
        let index = body.get("index").and_then(Value::as_str);
        let analyzer = body
            .get("analyzer")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mode_for_string = |index: Option<&str>| match index {
            None | Some("analyzed") => Ok(IndexMode::Analyzed { analyzer: analyzer.clone() }),
            Some("not_analyzed") => Ok(IndexMode::NotAnalyzed),
            Some(other) => Err(invalid(format!("unsupported index mode '{}'", other))),
        };

        let (kind, mode) = match wire_type {
            "string" => {
                let mode = mode_for_string(index)?;
                let kind = match mode {
                    IndexMode::NotAnalyzed => FieldKind::Keyword,
                    IndexMode::Analyzed { .. } => FieldKind::Text,
                };
                (kind, mode)
            }
            "text" => (FieldKind::Text, IndexMode::Analyzed { analyzer: analyzer.clone() }),
            "keyword" => (FieldKind::Keyword, IndexMode::NotAnalyzed),
            "integer" | "long" | "short" | "byte" => (FieldKind::Integer, IndexMode::NotAnalyzed),
            "float" | "double" | "half_float" | "scaled_float" => {
                (FieldKind::Float, IndexMode::NotAnalyzed)
            }
            "date" => (FieldKind::Date, IndexMode::NotAnalyzed),
            other => return Err(invalid(format!("unsupported field type '{}'", other))),
        };

        if mode == IndexMode::NotAnalyzed && analyzer.is_some() {
            return Err(invalid("not_analyzed fields take no analyzer".to_string()));
        }

        let store = match body.get("store") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => matches!(s.as_str(), "yes" | "true"),
            _ => false,
        };

        let term_vector = match body.get("term_vector").and_then(Value::as_str) {
            Some(tv) => Some(
                tv.parse::<TermVector>()
                    .map_err(|_| invalid(format!("unknown term_vector '{}'", tv)))?,
            ),
            None => None,
        };

        let format = if kind == FieldKind::Date {
            body.get("format").and_then(Value::as_str).map(str::to_string)
        } else {
            None
        };

        Ok(Self {
            name: name.to_string(),
            kind,
            mode,
            store,
            term_vector,
            format,
        })
    }
}

impl fmt::Display for FieldMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mode {
            IndexMode::Analyzed { analyzer: Some(a) } => write!(f, "{} (analyzed with {})", self.kind, a),
            IndexMode::Analyzed { analyzer: None } => write!(f, "{} (analyzed with index default)", self.kind),
            IndexMode::NotAnalyzed => write!(f, "{} (not_analyzed)", self.kind),
        }
    }
}

/// Fields of one document type, in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMapping {
    pub doc_type: String,
    pub fields: Vec<FieldMapping>,
}

impl TypeMapping {
    pub fn new(doc_type: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldMapping) -> Self {
        self.fields.push(field);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        validate_type_name(&self.doc_type)?;

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            field.validate()?;
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigError::DuplicateField {
                    doc_type: self.doc_type.clone(),
                    field: field.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// `{"properties": {...}}`
    pub fn properties_body(&self) -> Value {
        let properties: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.to_wire()))
            .collect();
        json!({ "properties": properties })
    }

    /// Put-mapping body, `{"<type>": {"properties": {...}}}`
    pub fn to_wire(&self) -> Value {
        let mut body = Map::new();
        body.insert(self.doc_type.clone(), self.properties_body());
        Value::Object(body)
    }

    /// Parse the body of one type from a get-mapping response.
    ///
    /// Fields of a kind this crate does not model (booleans, objects,
    /// geo points, `"index": "no"`) are skipped so the rest of the type
    /// stays usable.
    pub fn from_wire(doc_type: &str, body: &Value) -> ConfigResult<Self> {
        let mut mapping = Self::new(doc_type);
        if let Some(properties) = body.get("properties").and_then(Value::as_object) {
            for (name, field) in properties {
                match FieldMapping::from_wire(name, field) {
                    Ok(parsed) => mapping.fields.push(parsed),
                    Err(e) => {
                        warn!(doc_type = %doc_type, field = %name, error = %e, "Skipping unmodelled live field");
                    }
                }
            }
        }
        Ok(mapping)
    }
}

fn validate_type_name(name: &str) -> ConfigResult<()> {
    let reason = if name.is_empty() {
        Some("document type must not be empty")
    } else if name.starts_with('_') {
        Some("document type must not start with '_'")
    } else if name.contains('.') || name.contains('#') || name.contains(',') {
        Some("document type must not contain '.', '#' or ','")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}
