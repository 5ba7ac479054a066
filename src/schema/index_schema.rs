//! Index schema: analysis settings plus document-type mappings

use crate::analysis::{AnalyzerRegistry, ConfigError, ConfigResult};
use crate::schema::diff::{FieldChange, FieldRef, SchemaDiff};
use crate::schema::mapping::{FieldMapping, TypeMapping};
use serde_json::{json, Value};
use std::collections::HashSet;

const MAX_INDEX_NAME_BYTES: usize = 255;
const FORBIDDEN_INDEX_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ',', '#', ' '];

/// Complete definition of an index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSchema {
    pub name: String,
    pub analysis: AnalyzerRegistry,
    types: Vec<TypeMapping>,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            analysis: AnalyzerRegistry::new(),
            types: Vec::new(),
        }
    }

    pub fn with_analysis(mut self, analysis: AnalyzerRegistry) -> Self {
        self.analysis = analysis;
        self
    }

    pub fn with_type(mut self, mapping: TypeMapping) -> Self {
        self.types.push(mapping);
        self
    }

    /// Add a type, or the fields of `mapping` missing from an existing type
    pub(crate) fn merge_type(&mut self, mapping: &TypeMapping) {
        match self.types.iter_mut().find(|t| t.doc_type == mapping.doc_type) {
            Some(existing) => {
                for field in &mapping.fields {
                    if existing.get(&field.name).is_none() {
                        existing.fields.push(field.clone());
                    }
                }
            }
            None => self.types.push(mapping.clone()),
        }
    }

    pub fn types(&self) -> &[TypeMapping] {
        &self.types
    }

    pub fn doc_type(&self, doc_type: &str) -> Option<&TypeMapping> {
        self.types.iter().find(|t| t.doc_type == doc_type)
    }

    pub fn field(&self, doc_type: &str, field: &str) -> Option<&FieldMapping> {
        self.doc_type(doc_type).and_then(|t| t.get(field))
    }

    /// Validate names, mappings and that every analyzed field resolves to an analyzer
    pub fn validate(&self) -> ConfigResult<()> {
        validate_index_name(&self.name)?;

        let mut seen = HashSet::new();
        for mapping in &self.types {
            mapping.validate()?;
            if !seen.insert(mapping.doc_type.as_str()) {
                return Err(ConfigError::DuplicateType(mapping.doc_type.clone()));
            }
            self.check_analyzers(mapping)?;
        }
        Ok(())
    }

    /// Analyzed fields of `mapping` must resolve against this schema's analysis
    pub fn check_analyzers(&self, mapping: &TypeMapping) -> ConfigResult<()> {
        for field in mapping.fields.iter().filter(|f| f.is_analyzed()) {
            if let Some(analyzer) = field.analyzer() {
                if self.analysis.resolve(analyzer).is_err() {
                    return Err(ConfigError::UnresolvedAnalyzer {
                        field: field.name.clone(),
                        analyzer: analyzer.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Create-index body, `{"settings": {"analysis": {...}}}`
    pub fn settings_body(&self) -> Value {
        if self.analysis.is_empty() {
            json!({})
        } else {
            json!({ "settings": self.analysis.settings_body() })
        }
    }

    /// Analyzed fields that rely on the index default analyzer
    pub fn implicit_default_fields(&self) -> Vec<FieldRef> {
        self.types
            .iter()
            .flat_map(|t| {
                t.fields
                    .iter()
                    .filter(|f| f.is_analyzed() && f.analyzer().is_none())
                    .map(move |f| FieldRef::new(&t.doc_type, &f.name))
            })
            .collect()
    }

    /// Compare this (expected) schema with a live one
    pub fn diff(&self, live: &IndexSchema) -> SchemaDiff {
        let mut diff = SchemaDiff::default();

        for expected in self.analysis.custom_analyzers() {
            match live
                .analysis
                .custom_analyzers()
                .find(|a| a.identifier == expected.identifier)
            {
                None => diff.missing_analyzers.push(expected.identifier.clone()),
                Some(found)
                    if found.char_filters != expected.char_filters
                        || found.tokenizer != expected.tokenizer
                        || found.filters != expected.filters =>
                {
                    diff.changed_analyzers.push(expected.identifier.clone())
                }
                Some(_) => {}
            }
        }

        for expected_type in &self.types {
            let Some(live_type) = live.doc_type(&expected_type.doc_type) else {
                diff.missing_types.push(expected_type.doc_type.clone());
                continue;
            };

            for expected in &expected_type.fields {
                let field_ref = FieldRef::new(&expected_type.doc_type, &expected.name);
                let Some(found) = live_type.get(&expected.name) else {
                    diff.missing_fields.push(field_ref);
                    continue;
                };

                if expected.analyzer().is_some() && found.is_analyzed() && found.analyzer().is_none() {
                    diff.defaulted_fields.push(field_ref);
                } else if !same_definition(expected, found) {
                    diff.changed_fields.push(FieldChange {
                        field: field_ref,
                        expected: expected.clone(),
                        live: found.clone(),
                    });
                }
            }

            for found in &live_type.fields {
                if expected_type.get(&found.name).is_none() {
                    diff.unexpected_fields
                        .push(FieldRef::new(&expected_type.doc_type, &found.name));
                }
            }
        }

        diff
    }

    /// Rebuild a schema from get-settings and get-mapping responses
    pub fn from_live(name: &str, settings: &Value, mapping: &Value) -> ConfigResult<Self> {
        let mut schema = IndexSchema::new(name);

        let analysis = index_entry(settings, name)
            .and_then(|s| s.pointer("/settings/index/analysis"))
            .cloned()
            .unwrap_or_else(|| json!({}));
        schema.analysis = AnalyzerRegistry::from_settings(&analysis)?;

        if let Some(types) = index_entry(mapping, name)
            .and_then(|m| m.get("mappings"))
            .and_then(Value::as_object)
        {
            for (doc_type, body) in types {
                if doc_type.starts_with('_') {
                    continue;
                }
                schema.types.push(TypeMapping::from_wire(doc_type, body)?);
            }
        }

        Ok(schema)
    }
}

/// The engine keys responses by concrete index name; fall back to the
/// single entry when `name` is an alias
fn index_entry<'a>(response: &'a Value, name: &str) -> Option<&'a Value> {
    let entries = response.as_object()?;
    entries.get(name).or_else(|| {
        if entries.len() == 1 {
            entries.values().next()
        } else {
            None
        }
    })
}

/// Live mappings only echo options that were set, so defaults compare equal
fn same_definition(expected: &FieldMapping, live: &FieldMapping) -> bool {
    expected.kind == live.kind
        && expected.mode == live.mode
        && expected.store == live.store
        && expected.term_vector.unwrap_or(crate::schema::TermVector::No)
            == live.term_vector.unwrap_or(crate::schema::TermVector::No)
        && (expected.format.is_none() || expected.format == live.format)
}

/// Index names the engine accepts
pub fn validate_index_name(name: &str) -> ConfigResult<()> {
    let reason = if name.is_empty() {
        Some("index name must not be empty".to_string())
    } else if name.len() > MAX_INDEX_NAME_BYTES {
        Some(format!("index name must not exceed {} bytes", MAX_INDEX_NAME_BYTES))
    } else if name == "." || name == ".." {
        Some("index name must not be '.' or '..'".to_string())
    } else if name.starts_with(['_', '-', '+']) {
        Some("index name must not start with '_', '-' or '+'".to_string())
    } else if name.chars().any(char::is_uppercase) {
        Some("index name must be lowercase".to_string())
    } else if let Some(c) = name.chars().find(|c| FORBIDDEN_INDEX_CHARS.contains(c)) {
        Some(format!("index name must not contain '{}'", c))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ConfigError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
