//! Bulk operations and their NDJSON encoding

use crate::ingest::document::{fields_to_json, Document, Fields};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What a bulk operation does to its target document
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    /// Create or overwrite the whole document
    Index,
    /// Merge fields into an existing document
    Update,
    Delete,
}

/// Target of a bulk operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub kind: ActionKind,
    pub index: String,
    pub doc_type: String,
    pub id: String,
}

/// Body carried by a bulk operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Document(Fields),
    PartialUpdate(Fields),
    Empty,
}

/// One action descriptor with its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOperation {
    pub action: ActionDescriptor,
    pub payload: Payload,
}

impl BulkOperation {
    /// Index (create or overwrite) a document
    pub fn index(index: impl Into<String>, document: Document) -> Self {
        Self {
            action: ActionDescriptor {
                kind: ActionKind::Index,
                index: index.into(),
                doc_type: document.doc_type,
                id: document.id,
            },
            payload: Payload::Document(document.fields),
        }
    }

    /// Merge `fields` into an existing document
    pub fn update(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
        fields: Fields,
    ) -> Self {
        Self {
            action: ActionDescriptor {
                kind: ActionKind::Update,
                index: index.into(),
                doc_type: doc_type.into(),
                id: id.into(),
            },
            payload: Payload::PartialUpdate(fields),
        }
    }

    pub fn delete(index: impl Into<String>, doc_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            action: ActionDescriptor {
                kind: ActionKind::Delete,
                index: index.into(),
                doc_type: doc_type.into(),
                id: id.into(),
            },
            payload: Payload::Empty,
        }
    }

    pub fn id(&self) -> &str {
        &self.action.id
    }

    pub fn kind(&self) -> ActionKind {
        self.action.kind
    }

    /// `{"index": {"_index": ..., "_type": ..., "_id": ...}}`
    pub fn action_line(&self) -> Value {
        let mut line = serde_json::Map::new();
        line.insert(
            self.action.kind.as_ref().to_string(),
            json!({
                "_index": self.action.index,
                "_type": self.action.doc_type,
                "_id": self.action.id,
            }),
        );
        Value::Object(line)
    }

    /// Body sent for this operation, both in bulk and as a single request
    pub fn payload_body(&self) -> Option<Value> {
        match &self.payload {
            Payload::Document(fields) => Some(fields_to_json(fields)),
            Payload::PartialUpdate(fields) => Some(json!({ "doc": fields_to_json(fields) })),
            Payload::Empty => None,
        }
    }

    /// NDJSON lines of this operation, each terminated by a newline
    pub fn encode(&self) -> String {
        let mut encoded = self.action_line().to_string();
        encoded.push('\n');
        if let Some(payload) = self.payload_body() {
            encoded.push_str(&payload.to_string());
            encoded.push('\n');
        }
        encoded
    }
}

/// Ceilings for one aggregate submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_docs: usize,
    pub max_bytes: usize,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_docs: 500,
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// An encoded aggregate submission
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    /// Positions of the operations in the submitted sequence, in order
    pub positions: Vec<usize>,
    pub body: String,
}

impl EncodedBatch {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Split operations into submissions within `limits`, keeping their order.
/// An operation larger than `max_bytes` on its own gets a submission to itself.
pub fn chunk_operations(operations: &[BulkOperation], limits: BatchLimits) -> Vec<EncodedBatch> {
    let max_docs = limits.max_docs.max(1);
    let mut batches = Vec::new();
    let mut current = EncodedBatch {
        positions: Vec::new(),
        body: String::new(),
    };

    for (position, operation) in operations.iter().enumerate() {
        let encoded = operation.encode();
        let over_docs = current.len() >= max_docs;
        let over_bytes = current.body.len() + encoded.len() > limits.max_bytes;

        if !current.is_empty() && (over_docs || over_bytes) {
            batches.push(std::mem::replace(
                &mut current,
                EncodedBatch {
                    positions: Vec::new(),
                    body: String::new(),
                },
            ));
        }

        current.positions.push(position);
        current.body.push_str(&encoded);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
