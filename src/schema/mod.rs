//! Index schema management
//!
//! An [`IndexSchema`] couples the analysis settings of an index with the
//! mappings of its document types. [`SchemaManager`] provisions it on the
//! engine and reads the live state back, so a field that silently fell back
//! to the default analyzer shows up in a [`SchemaDiff`].

mod diff;
mod error;
mod file;
mod index_schema;
mod manager;
mod mapping;

pub use diff::{FieldChange, FieldRef, SchemaDiff};
pub use error::{SchemaError, SchemaResult};
pub use index_schema::{validate_index_name, IndexSchema};
pub use manager::{EnsureOutcome, SchemaManager};
pub use mapping::{FieldKind, FieldMapping, IndexMode, TermVector, TypeMapping};
