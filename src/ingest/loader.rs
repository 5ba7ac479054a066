//! Resilient bulk loading
//!
//! Operations are first sent as aggregate bulk submissions, chunked by
//! document count and body size. A submission that times out, fails in
//! transport, or comes back with a response that does not identify every
//! operation falls back to per-document writes. Throttled items of an
//! otherwise decoded response are retried the same way, together with every
//! later operation of the batch on the same document. Per-document
//! failures are recorded in the [`LoadReport`] and never abort the load.
//!
//! In the fallback path operations targeting the same document run one
//! after another in submission order; different documents run concurrently
//! up to `fallback_concurrency`.

use crate::config::{BulkConfig, EngineConfig};
use crate::engine::{EngineTransport, RetryPolicy, TransportError, TransportResult, WriteAck};
use crate::ingest::document::{Document, Fields, SourceRow};
use crate::ingest::error::{LoadError, LoadResult};
use crate::ingest::operation::{chunk_operations, ActionKind, BatchLimits, BulkOperation};
use crate::ingest::report::{FailureDetail, LoadFailure, LoadReport, SkipReason, SkippedRow};
use crate::schema::SchemaManager;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const THROTTLED: u16 = 429;

type Target<'a> = (&'a str, &'a str, &'a str);

fn target(operation: &BulkOperation) -> Target<'_> {
    let action = &operation.action;
    (action.index.as_str(), action.doc_type.as_str(), action.id.as_str())
}

/// Shared flag that stops a load from issuing new requests
///
/// Requests already in flight complete or fail normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Tuning of a [`BulkLoader`]
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub limits: BatchLimits,

    /// Concurrent per-document writes in the fallback path
    pub fallback_concurrency: usize,

    /// Retry policy for each per-document write
    pub document_retry: RetryPolicy,

    /// Rows missing any of these fields are skipped
    pub mandatory_fields: Vec<String>,

    pub cancellation: CancellationFlag,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            limits: BatchLimits::default(),
            fallback_concurrency: 4,
            document_retry: RetryPolicy::default(),
            mandatory_fields: Vec::new(),
            cancellation: CancellationFlag::default(),
        }
    }
}

impl LoadOptions {
    pub fn from_config(bulk: &BulkConfig, engine: &EngineConfig) -> Self {
        Self {
            limits: BatchLimits {
                max_docs: bulk.max_batch_docs,
                max_bytes: bulk.max_batch_bytes,
            },
            fallback_concurrency: bulk.fallback_concurrency,
            document_retry: engine.retry_policy().with_max_attempts(bulk.document_attempts),
            ..Self::default()
        }
    }

    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_fallback_concurrency(mut self, concurrency: usize) -> Self {
        self.fallback_concurrency = concurrency.max(1);
        self
    }

    pub fn with_document_retry(mut self, retry: RetryPolicy) -> Self {
        self.document_retry = retry;
        self
    }

    pub fn with_mandatory_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mandatory_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }
}

enum DocumentOutcome {
    Written,
    Failed(FailureDetail),
    NotAttempted,
}

struct Settled {
    position: usize,
    outcome: DocumentOutcome,
    attempts: u32,
}

/// Writes documents into an index, isolating per-document failures
pub struct BulkLoader {
    transport: Arc<dyn EngineTransport>,
    schema: SchemaManager,
    options: LoadOptions,
}

impl BulkLoader {
    pub fn new(transport: Arc<dyn EngineTransport>) -> Self {
        Self {
            schema: SchemaManager::new(Arc::clone(&transport)),
            transport,
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Turn `rows` into documents of `doc_type` and index them into `index`
    ///
    /// Only a missing index or an unmapped document type is an error; every
    /// other outcome, including rejected documents, is reported.
    pub async fn load<I, R, IdFn, MapFn>(
        &self,
        index: &str,
        doc_type: &str,
        rows: I,
        id_extractor: IdFn,
        field_map: MapFn,
    ) -> LoadResult<LoadReport>
    where
        I: IntoIterator<Item = R>,
        R: SourceRow,
        IdFn: Fn(&R) -> Option<String>,
        MapFn: Fn(&R) -> Fields,
    {
        self.check_target(index, doc_type).await?;

        let mut report = LoadReport::new(index);
        let mut operations = Vec::new();

        'rows: for (position, row) in rows.into_iter().enumerate() {
            for field in &self.options.mandatory_fields {
                if row.is_missing(field) {
                    report.skipped.push(SkippedRow {
                        row: position,
                        reason: SkipReason::MissingField(field.clone()),
                    });
                    continue 'rows;
                }
            }

            let Some(id) = id_extractor(&row).filter(|id| !id.is_empty()) else {
                report.skipped.push(SkippedRow {
                    row: position,
                    reason: SkipReason::MissingId,
                });
                continue;
            };

            let document = Document::new(doc_type, id, field_map(&row));
            operations.push(BulkOperation::index(index, document));
        }

        if !report.skipped.is_empty() {
            info!(index = %index, skipped = report.skipped.len(), "Rows filtered out before submission");
        }

        self.submit(&operations, &mut report).await;
        self.finish(&mut report);
        Ok(report)
    }

    /// Submit arbitrary index, update and delete operations
    pub async fn apply(&self, operations: Vec<BulkOperation>) -> LoadResult<LoadReport> {
        let targets: BTreeSet<(&str, &str)> = operations
            .iter()
            .map(|op| (op.action.index.as_str(), op.action.doc_type.as_str()))
            .collect();

        for (index, doc_type) in &targets {
            self.check_target(index, doc_type).await?;
        }

        let indices: BTreeSet<&str> = targets.iter().map(|(index, _)| *index).collect();
        let mut report = LoadReport::new(indices.into_iter().collect::<Vec<_>>().join(","));

        self.submit(&operations, &mut report).await;
        self.finish(&mut report);
        Ok(report)
    }

    async fn check_target(&self, index: &str, doc_type: &str) -> LoadResult<()> {
        let live = self.schema.describe(index).await?;

        if live.doc_type(doc_type).is_none() {
            return Err(LoadError::TypeNotMapped {
                index: index.to_string(),
                doc_type: doc_type.to_string(),
            });
        }
        Ok(())
    }

    async fn submit(&self, operations: &[BulkOperation], report: &mut LoadReport) {
        let mut attempts = vec![0_u32; operations.len()];
        let batches = chunk_operations(operations, self.options.limits);
        let batch_count = batches.len();
        let mut batches = batches.into_iter().enumerate();

        while let Some((number, batch)) = batches.next() {
            if self.options.cancellation.is_cancelled() {
                report.cancelled = true;
                let unsent = std::iter::once(batch).chain(batches.by_ref().map(|(_, b)| b));
                for batch in unsent {
                    report
                        .not_attempted
                        .extend(batch.positions.iter().map(|&p| operations[p].id().to_string()));
                }
                warn!(index = %report.index, not_attempted = report.not_attempted.len(), "Load cancelled");
                break;
            }

            report.batches += 1;
            for &position in &batch.positions {
                attempts[position] += 1;
            }

            debug!(
                batch = number + 1,
                of = batch_count,
                documents = batch.len(),
                bytes = batch.body.len(),
                "Submitting bulk batch"
            );

            let positions = batch.positions;
            let fallback = match self.transport.bulk(batch.body).await {
                Ok(response) => {
                    let results = response.results();
                    let identified = results.len() == positions.len()
                        && positions.iter().zip(&results).all(|(&p, item)| {
                            item.is_some_and(|item| {
                                item.id.as_deref().map_or(true, |id| id == operations[p].id())
                            })
                        });

                    if identified {
                        let mut retry = Vec::new();
                        // Documents with a throttled write replay the rest of their batch order
                        let mut replayed: HashSet<Target<'_>> = HashSet::new();
                        for (&position, item) in positions.iter().zip(results.into_iter().flatten()) {
                            let key = target(&operations[position]);
                            if replayed.contains(&key) {
                                retry.push(position);
                            } else if item.status == THROTTLED {
                                replayed.insert(key);
                                retry.push(position);
                            } else if item.is_success() {
                                report.succeeded += 1;
                            } else {
                                self.record_failure(
                                    report,
                                    &operations[position],
                                    FailureDetail::from(item),
                                    attempts[position],
                                );
                            }
                        }
                        info!(
                            batch = number + 1,
                            documents = positions.len(),
                            took_ms = response.took,
                            errors = response.errors,
                            throttled = retry.len(),
                            "Bulk batch submitted"
                        );
                        retry
                    } else {
                        warn!(
                            batch = number + 1,
                            documents = positions.len(),
                            items = results.len(),
                            "Bulk response does not identify every operation, writing documents individually"
                        );
                        positions
                    }
                }
                Err(e) => {
                    warn!(
                        batch = number + 1,
                        documents = positions.len(),
                        error = %e,
                        "Aggregate submission failed, writing documents individually"
                    );
                    positions
                }
            };

            if !fallback.is_empty() {
                report.fallback_batches += 1;
                self.write_individually(&fallback, operations, &mut attempts, report)
                    .await;
            }
        }
    }

    async fn write_individually(
        &self,
        positions: &[usize],
        operations: &[BulkOperation],
        attempts: &mut [u32],
        report: &mut LoadReport,
    ) {
        let concurrency = self.options.fallback_concurrency.max(1);
        info!(documents = positions.len(), concurrency, "Falling back to per-document writes");

        // One lane per target document keeps writes to the same id ordered
        let mut lanes: Vec<Vec<usize>> = Vec::new();
        let mut lane_of: HashMap<Target<'_>, usize> = HashMap::new();
        for &position in positions {
            let key = target(&operations[position]);
            match lane_of.get(&key) {
                Some(&lane) => lanes[lane].push(position),
                None => {
                    lane_of.insert(key, lanes.len());
                    lanes.push(vec![position]);
                }
            }
        }

        let mut settled: Vec<Settled> = stream::iter(lanes)
            .map(|lane| self.write_lane(lane, operations))
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();
        settled.sort_by_key(|s| s.position);

        for Settled {
            position,
            outcome,
            attempts: made,
        } in settled
        {
            attempts[position] += made;
            if attempts[position] > 1 {
                report.retried += 1;
            }

            match outcome {
                DocumentOutcome::Written => report.succeeded += 1,
                DocumentOutcome::Failed(detail) => {
                    self.record_failure(report, &operations[position], detail, attempts[position])
                }
                DocumentOutcome::NotAttempted => {
                    report.cancelled = true;
                    report.not_attempted.push(operations[position].id().to_string());
                }
            }
        }
    }

    async fn write_lane(&self, lane: Vec<usize>, operations: &[BulkOperation]) -> Vec<Settled> {
        let mut settled = Vec::with_capacity(lane.len());

        for position in lane {
            if self.options.cancellation.is_cancelled() {
                settled.push(Settled {
                    position,
                    outcome: DocumentOutcome::NotAttempted,
                    attempts: 0,
                });
                continue;
            }

            let operation = &operations[position];
            let (result, attempts) = self
                .options
                .document_retry
                .run("write_document", || self.write_one(operation))
                .await;

            let outcome = match result {
                Ok(_) => DocumentOutcome::Written,
                Err(e) => DocumentOutcome::Failed(FailureDetail::from(&e)),
            };
            settled.push(Settled {
                position,
                outcome,
                attempts,
            });
        }

        settled
    }

    async fn write_one(&self, operation: &BulkOperation) -> TransportResult<WriteAck> {
        let action = &operation.action;
        match (action.kind, operation.payload_body()) {
            (ActionKind::Delete, _) => {
                self.transport
                    .delete_document(&action.index, &action.doc_type, &action.id)
                    .await
            }
            (ActionKind::Index, Some(body)) => {
                self.transport
                    .index_document(&action.index, &action.doc_type, &action.id, &body)
                    .await
            }
            (ActionKind::Update, Some(body)) => {
                self.transport
                    .update_document(&action.index, &action.doc_type, &action.id, &body)
                    .await
            }
            (kind, None) => Err(TransportError::Request(format!(
                "{} operation for '{}' has no payload",
                kind, action.id
            ))),
        }
    }

    fn record_failure(
        &self,
        report: &mut LoadReport,
        operation: &BulkOperation,
        detail: FailureDetail,
        attempts: u32,
    ) {
        error!(
            index = %operation.action.index,
            doc_id = %operation.id(),
            status = ?detail.status,
            error_type = ?detail.error_type,
            reason = %detail.reason,
            "Document rejected"
        );

        report.failures.push(LoadFailure {
            id: operation.id().to_string(),
            action: operation.kind(),
            payload: operation.payload_body(),
            error: detail,
            attempts,
        });
    }

    fn finish(&self, report: &mut LoadReport) {
        report.finish();
        info!(
            load_id = %report.load_id,
            index = %report.index,
            succeeded = report.succeeded,
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            not_attempted = report.not_attempted.len(),
            batches = report.batches,
            fallback_batches = report.fallback_batches,
            retried = report.retried,
            elapsed_ms = report.elapsed_ms,
            "Load finished"
        );
    }
}
