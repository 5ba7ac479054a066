//! Differences between an expected schema and the live one

use crate::schema::mapping::FieldMapping;
use serde::Serialize;
use std::fmt;

/// A field inside a document type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRef {
    pub doc_type: String,
    pub field: String,
}

impl FieldRef {
    pub fn new(doc_type: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            doc_type: doc_type.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.doc_type, self.field)
    }
}

/// A field mapped differently than expected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: FieldRef,
    pub expected: FieldMapping,
    pub live: FieldMapping,
}

/// Result of comparing an expected schema with the live index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaDiff {
    /// Custom analyzers the live index does not define
    pub missing_analyzers: Vec<String>,

    /// Custom analyzers defined with a different pipeline
    pub changed_analyzers: Vec<String>,

    pub missing_types: Vec<String>,

    pub missing_fields: Vec<FieldRef>,

    /// Live fields the expected schema does not declare, typically dynamic mappings
    pub unexpected_fields: Vec<FieldRef>,

    pub changed_fields: Vec<FieldChange>,

    /// Fields that name an analyzer but are analyzed with the index default
    pub defaulted_fields: Vec<FieldRef>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.missing_analyzers.is_empty()
            && self.changed_analyzers.is_empty()
            && self.missing_types.is_empty()
            && self.missing_fields.is_empty()
            && self.unexpected_fields.is_empty()
            && self.changed_fields.is_empty()
            && self.defaulted_fields.is_empty()
    }

    /// Whether documents would be analyzed differently than expected.
    /// Extra dynamic fields do not count.
    pub fn has_drift(&self) -> bool {
        !(self.missing_analyzers.is_empty()
            && self.changed_analyzers.is_empty()
            && self.missing_types.is_empty()
            && self.missing_fields.is_empty()
            && self.changed_fields.is_empty()
            && self.defaulted_fields.is_empty())
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "schema matches");
        }

        let mut parts = Vec::new();
        if !self.missing_analyzers.is_empty() {
            parts.push(format!("missing analyzers: {}", self.missing_analyzers.join(", ")));
        }
        if !self.changed_analyzers.is_empty() {
            parts.push(format!("changed analyzers: {}", self.changed_analyzers.join(", ")));
        }
        if !self.missing_types.is_empty() {
            parts.push(format!("missing types: {}", self.missing_types.join(", ")));
        }
        for (label, fields) in [
            ("missing fields", &self.missing_fields),
            ("unexpected fields", &self.unexpected_fields),
            ("fields on default analyzer", &self.defaulted_fields),
        ] {
            if !fields.is_empty() {
                let names: Vec<String> = fields.iter().map(ToString::to_string).collect();
                parts.push(format!("{}: {}", label, names.join(", ")));
            }
        }
        for change in &self.changed_fields {
            parts.push(format!(
                "{} expected {} but is {}",
                change.field, change.expected, change.live
            ));
        }

        write!(f, "{}", parts.join("; "))
    }
}
