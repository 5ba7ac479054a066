//! Schema definitions loaded from TOML or YAML files
//!
//! ```toml
//! name = "yelp"
//!
//! [analysis.char_filter.amp]
//! type = "mapping"
//! mappings = ["&=> and "]
//!
//! [analysis.analyzer.my_english]
//! char_filter = ["amp"]
//! tokenizer = "standard"
//! filter = ["lowercase", "stop", "porter_stem"]
//!
//! [[types]]
//! name = "review"
//!
//! [[types.fields]]
//! name = "text"
//! type = "text"
//! analyzer = "my_english"
//! store = true
//! term_vector = "with_positions_offsets_payloads"
//! ```

use crate::analysis::{
    AnalyzerRegistry, AnalyzerSpec, CharFilterKind, ConfigError, ConfigResult, TokenFilterKind,
    TokenizerKind,
};
use crate::schema::index_schema::IndexSchema;
use crate::schema::mapping::{FieldKind, FieldMapping, IndexMode, TermVector, TypeMapping};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaFile {
    name: String,
    #[serde(default)]
    analysis: AnalysisSection,
    #[serde(default)]
    types: Vec<TypeSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnalysisSection {
    #[serde(default)]
    char_filter: BTreeMap<String, CharFilterKind>,
    #[serde(default)]
    tokenizer: BTreeMap<String, TokenizerKind>,
    #[serde(default)]
    filter: BTreeMap<String, TokenFilterKind>,
    #[serde(default)]
    analyzer: BTreeMap<String, AnalyzerSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnalyzerSection {
    #[serde(default)]
    char_filter: Vec<String>,
    tokenizer: Option<String>,
    #[serde(default)]
    filter: Vec<String>,
    #[serde(default)]
    override_builtin: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TypeSection {
    name: String,
    #[serde(default)]
    fields: Vec<FieldSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSection {
    name: String,
    #[serde(rename = "type")]
    kind: FieldKind,
    analyzer: Option<String>,
    #[serde(default)]
    store: bool,
    term_vector: Option<TermVector>,
    format: Option<String>,
}

impl FieldSection {
    fn into_mapping(self) -> ConfigResult<FieldMapping> {
        let mode = match (self.kind, self.analyzer) {
            (FieldKind::Text, analyzer) => IndexMode::Analyzed { analyzer },
            (_, Some(_)) => {
                return Err(ConfigError::InvalidField {
                    field: self.name,
                    reason: "not_analyzed fields take no analyzer".to_string(),
                })
            }
            (_, None) => IndexMode::NotAnalyzed,
        };

        Ok(FieldMapping {
            name: self.name,
            kind: self.kind,
            mode,
            store: self.store,
            term_vector: self.term_vector,
            format: self.format,
        })
    }
}

impl SchemaFile {
    fn into_schema(self) -> ConfigResult<IndexSchema> {
        let mut analysis = AnalyzerRegistry::new();

        for (name, kind) in self.analysis.char_filter {
            analysis.define_char_filter(name, kind)?;
        }
        for (name, kind) in self.analysis.tokenizer {
            analysis.define_tokenizer(name, kind)?;
        }
        for (name, kind) in self.analysis.filter {
            analysis.define_filter(name, kind)?;
        }
        for (name, section) in self.analysis.analyzer {
            let mut builder = AnalyzerSpec::builder(name);
            for char_filter in section.char_filter {
                builder = builder.char_filter(char_filter);
            }
            if let Some(tokenizer) = section.tokenizer {
                builder = builder.tokenizer(tokenizer);
            }
            builder = builder.filters(section.filter);
            if section.override_builtin {
                builder = builder.override_builtin();
            }
            analysis.define(builder.build()?)?;
        }

        let mut schema = IndexSchema::new(self.name).with_analysis(analysis);
        for section in self.types {
            let mut mapping = TypeMapping::new(section.name);
            for field in section.fields {
                mapping = mapping.field(field.into_mapping()?);
            }
            schema = schema.with_type(mapping);
        }

        schema.validate()?;
        Ok(schema)
    }
}

impl IndexSchema {
    /// Parse and validate a schema written in TOML
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let file: SchemaFile =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_schema()
    }

    /// Parse and validate a schema written in YAML
    pub fn from_yaml_str(source: &str) -> ConfigResult<Self> {
        let file: SchemaFile =
            serde_yaml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_schema()
    }

    /// Load a schema file, choosing the format by extension
    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loading schema file");

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&source),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&source),
            _ => Err(ConfigError::Parse(format!(
                "{}: expected a .toml, .yaml or .yml file",
                path.display()
            ))),
        }
    }
}
