//! Index lifecycle and mapping management

use crate::analysis::ConfigError;
use crate::engine::{EngineTransport, RetryPolicy, TransportError};
use crate::schema::diff::SchemaDiff;
use crate::schema::error::{SchemaError, SchemaResult};
use crate::schema::index_schema::{validate_index_name, IndexSchema};
use crate::schema::mapping::TypeMapping;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What [`SchemaManager::ensure_index`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The index did not exist and was created
    Created,
    /// The index existed and was dropped and created again
    Recreated,
    /// The index existed and was kept; only the listed types were (re)put
    Reused { layered_types: Vec<String> },
}

/// Manages index creation, deletion and mappings
///
/// Schema operations must not run concurrently with loads into the same
/// index; ordering is the caller's responsibility.
#[derive(Clone)]
pub struct SchemaManager {
    transport: Arc<dyn EngineTransport>,
    retry: RetryPolicy,
}

impl SchemaManager {
    pub fn new(transport: Arc<dyn EngineTransport>) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
        }
    }

    /// Retry policy for read-only calls; mutations are never retried
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Whether the index exists
    pub async fn exists(&self, index: &str) -> SchemaResult<bool> {
        let (result, _) = self
            .retry
            .run("index_exists", || self.transport.index_exists(index))
            .await;
        Ok(result?)
    }

    /// Make sure `name` exists with `schema`
    ///
    /// With `recreate` an existing index is dropped first and every document
    /// in it is lost. Without it an existing index is kept as is: its
    /// analysis settings are fixed at creation, so only document types are
    /// layered on through [`SchemaManager::add_mapping`]. The explicit `name`
    /// wins over `schema.name`.
    pub async fn ensure_index(
        &self,
        name: &str,
        schema: &IndexSchema,
        recreate: bool,
    ) -> SchemaResult<EnsureOutcome> {
        validate_index_name(name)?;
        schema.validate()?;

        if schema.name != name {
            debug!(index = %name, schema = %schema.name, "Schema applied under a different index name");
        }

        let exists = self.exists(name).await?;

        if exists && !recreate {
            return self.layer_types(name, schema).await;
        }

        if exists {
            info!(index = %name, "Dropping index before recreating it");
            self.transport
                .delete_index(name)
                .await
                .map_err(|e| SchemaError::from_engine(name, "delete index", e))?;
        }

        self.transport
            .create_index(name, &schema.settings_body())
            .await
            .map_err(|e| SchemaError::from_engine(name, "create index", e))?;

        for mapping in schema.types() {
            self.put_mapping(name, mapping).await?;
        }

        for field in schema.implicit_default_fields() {
            warn!(index = %name, field = %field, "Analyzed field uses the index default analyzer");
        }

        info!(
            index = %name,
            types = schema.types().len(),
            analyzers = schema.analysis.custom_analyzers().count(),
            recreated = exists,
            "Index created"
        );

        Ok(if exists {
            EnsureOutcome::Recreated
        } else {
            EnsureOutcome::Created
        })
    }

    async fn layer_types(&self, name: &str, schema: &IndexSchema) -> SchemaResult<EnsureOutcome> {
        if !schema.analysis.is_empty() {
            warn!(index = %name, "Reusing existing index; requested analysis settings are not reapplied");
        }

        let mut live = self.describe(name).await?;
        let mut layered_types = Vec::new();

        for mapping in schema.types() {
            let up_to_date = live.doc_type(&mapping.doc_type).is_some_and(|existing| {
                mapping.fields.iter().all(|f| {
                    existing
                        .get(&f.name)
                        .is_some_and(|live_field| live_field.compatible_with(f))
                })
            });
            if up_to_date {
                continue;
            }

            self.check_mapping(name, mapping, &live)?;
            self.put_mapping(name, mapping).await?;
            live.merge_type(mapping);
            layered_types.push(mapping.doc_type.clone());
        }

        info!(index = %name, layered = layered_types.len(), "Reusing existing index");
        Ok(EnsureOutcome::Reused { layered_types })
    }

    /// Add a document type, or new fields of one, to an existing index
    ///
    /// Fails if a field is already mapped, in any type of the index, with an
    /// incompatible definition.
    pub async fn add_mapping(&self, index: &str, mapping: &TypeMapping) -> SchemaResult<()> {
        mapping.validate()?;
        let live = self.describe(index).await?;
        self.check_mapping(index, mapping, &live)?;
        self.put_mapping(index, mapping).await
    }

    fn check_mapping(&self, index: &str, mapping: &TypeMapping, live: &IndexSchema) -> SchemaResult<()> {
        live.check_analyzers(mapping)?;

        for requested in &mapping.fields {
            for existing_type in live.types() {
                let Some(existing) = existing_type.get(&requested.name) else {
                    continue;
                };
                if !existing.compatible_with(requested) {
                    return Err(SchemaError::IncompatibleField {
                        index: index.to_string(),
                        doc_type: existing_type.doc_type.clone(),
                        field: requested.name.clone(),
                        existing: existing.to_string(),
                        requested: requested.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn put_mapping(&self, index: &str, mapping: &TypeMapping) -> SchemaResult<()> {
        self.transport
            .put_mapping(index, &mapping.doc_type, &mapping.to_wire())
            .await
            .map_err(|e| SchemaError::from_engine(index, "put mapping", e))?;

        info!(index = %index, doc_type = %mapping.doc_type, fields = mapping.fields.len(), "Mapping applied");
        Ok(())
    }

    /// Fetch the live settings and mapping of an index
    pub async fn describe(&self, index: &str) -> SchemaResult<IndexSchema> {
        let (settings, _) = self
            .retry
            .run("get_settings", || self.transport.get_settings(index))
            .await;
        let settings = settings.map_err(|e| not_found_or(index, e))?;

        let (mapping, _) = self
            .retry
            .run("get_mapping", || self.transport.get_mapping(index))
            .await;
        let mapping = mapping.map_err(|e| not_found_or(index, e))?;

        IndexSchema::from_live(index, &settings, &mapping).map_err(|e| match e {
            ConfigError::Io(e) => SchemaError::Config(ConfigError::Io(e)),
            other => SchemaError::InvalidLiveMapping {
                index: index.to_string(),
                reason: other.to_string(),
            },
        })
    }

    /// Compare the live index with `expected`
    pub async fn verify(&self, index: &str, expected: &IndexSchema) -> SchemaResult<SchemaDiff> {
        let live = self.describe(index).await?;
        let diff = expected.diff(&live);

        if diff.has_drift() {
            warn!(index = %index, diff = %diff, "Live schema differs from expected schema");
        } else {
            debug!(index = %index, "Live schema matches expected schema");
        }
        Ok(diff)
    }

    /// Drop an index and every document in it. Returns whether it existed.
    pub async fn drop_index(&self, index: &str) -> SchemaResult<bool> {
        if !self.exists(index).await? {
            return Ok(false);
        }

        self.transport
            .delete_index(index)
            .await
            .map_err(|e| SchemaError::from_engine(index, "delete index", e))?;

        info!(index = %index, "Index dropped");
        Ok(true)
    }

    /// Make recent writes visible to search
    pub async fn refresh(&self, index: &str) -> SchemaResult<()> {
        let (result, _) = self
            .retry
            .run("refresh", || self.transport.refresh(index))
            .await;
        result.map_err(|e| not_found_or(index, e))
    }
}

fn not_found_or(index: &str, err: TransportError) -> SchemaError {
    if err.is_not_found() {
        SchemaError::IndexNotFound(index.to_string())
    } else {
        SchemaError::Transport(err)
    }
}
