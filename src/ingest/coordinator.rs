//! Ingestion coordinator
//!
//! ```text
//! raw documents ──> normalize (in order) ──> chunks ──> bulk writes
//!                        │                              (≤ concurrency in flight,
//!                        └─> rejected: violations        retried with backoff)
//! ```
//!
//! One bad document never aborts a batch. A chunk that exhausts its
//! retries rejects every document in it with a `WriteFailure`. On
//! cancellation, chunks already submitted finish; everything not yet
//! submitted comes back as cancelled.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use uuid::Uuid;

use crate::backend::{BackendError, BulkResponse, DocumentFailure, IndexedDocument, RetryPolicy, WriteApi};
use crate::config::IndexerConfig;
use crate::lifecycle::{IndexDescriptor, IndexLifecycleManager, IndexState, LifecycleError};
use crate::normalizer::{DocumentNormalizer, FieldViolation, NormalizeError};
use crate::observability::{log_event_with_fields, warn_event, Event, MetricsRegistry, ObservationScope};

use super::batch::{
    BatchResult, DeleteFailure, DeleteResult, RawDocument, RejectedDocument, RejectionReason, WriteFailure,
};
use super::cancel::CancellationToken;
use super::errors::{IngestError, IngestResult};

/// A normalized document waiting for its chunk to be written
struct Pending {
    position: usize,
    raw: RawDocument,
    indexed: IndexedDocument,
}

/// Result of submitting one bulk request, retries included
enum Submission {
    Done { response: BulkResponse, attempts: u32 },
    Failed { error: BackendError, attempts: u32 },
    Cancelled,
}

/// Runs batches through the normalizer into the backend.
#[derive(Debug)]
pub struct IngestionCoordinator {
    normalizer: Arc<DocumentNormalizer>,
    lifecycle: Arc<IndexLifecycleManager>,
    writer: Arc<dyn WriteApi>,
    chunk_size: usize,
    concurrency: usize,
    write_retry: RetryPolicy,
    metrics: Arc<MetricsRegistry>,
}

impl IngestionCoordinator {
    pub fn new(
        normalizer: Arc<DocumentNormalizer>,
        lifecycle: Arc<IndexLifecycleManager>,
        writer: Arc<dyn WriteApi>,
        config: &IndexerConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            normalizer,
            lifecycle,
            writer,
            chunk_size: config.write_chunk_size.max(1),
            concurrency: config.write_concurrency.max(1),
            write_retry: config.write_retry_policy(),
            metrics,
        }
    }

    /// Ingests `documents` into the active index of `schema_name`.
    ///
    /// # Errors
    ///
    /// - `UnknownSchema` if the schema is not registered
    /// - `NoActiveIndex` if the schema has no Active index
    ///
    /// Everything else is accounted for in the returned [`BatchResult`].
    pub async fn ingest_batch(
        &self,
        schema_name: &str,
        documents: Vec<RawDocument>,
        cancel: &CancellationToken,
    ) -> IngestResult<BatchResult> {
        if !self.normalizer.registry().contains(schema_name) {
            return Err(IngestError::UnknownSchema(schema_name.to_string()));
        }
        let target = self
            .lifecycle
            .active(schema_name)
            .ok_or_else(|| LifecycleError::NoActiveIndex(schema_name.to_string()))?;
        self.ingest_into(&target, documents, cancel).await
    }

    /// Ingests into an explicit index, e.g. a Building version being
    /// backfilled before activation.
    ///
    /// Documents are normalized against the definition `target` was
    /// created from, so an index never receives fields its mapping lacks,
    /// whatever the registry holds now.
    pub async fn ingest_into(
        &self,
        target: &IndexDescriptor,
        documents: Vec<RawDocument>,
        cancel: &CancellationToken,
    ) -> IngestResult<BatchResult> {
        let target = self.writable(target)?;

        let count = documents.len().to_string();
        let scope = ObservationScope::with_fields(
            "INGEST_BATCH",
            &[
                ("schema", &target.schema_name),
                ("index", &target.index_id),
                ("documents", &count),
            ],
        );

        let mut result = BatchResult::default();
        let mut cancelled = Vec::new();
        let mut pending = Vec::with_capacity(documents.len());

        let mut documents = documents.into_iter().enumerate();
        for (position, mut raw) in documents.by_ref() {
            if cancel.is_cancelled() {
                cancelled.push((position, raw));
                break;
            }

            let id = raw.id.get_or_insert_with(|| Uuid::new_v4().to_string()).clone();
            match self.normalizer.normalize_with(&target.definition, &raw.body) {
                Ok(normalized) => pending.push(Pending {
                    position,
                    indexed: IndexedDocument {
                        id,
                        body: normalized.into_value(),
                    },
                    raw,
                }),
                Err(NormalizeError::Violations(violations)) => {
                    self.log_rejected(&target, &id, &violations);
                    result.rejected.push(RejectedDocument {
                        position,
                        document: raw,
                        reason: RejectionReason::Violations(violations),
                    });
                }
                Err(other) => return Err(other.into()),
            }
        }
        cancelled.extend(documents);

        let mut chunks = Vec::new();
        let mut pending = pending.into_iter().peekable();
        while pending.peek().is_some() {
            chunks.push(pending.by_ref().take(self.chunk_size).collect::<Vec<_>>());
        }

        let mut outcomes = stream::iter(chunks)
            .map(|chunk| self.write_chunk(&target, chunk, cancel))
            .buffer_unordered(self.concurrency);

        while let Some(outcome) = outcomes.next().await {
            result.accepted += outcome.accepted;
            result.rejected.extend(outcome.rejected);
            cancelled.extend(outcome.cancelled.into_iter().map(|p| (p.position, p.raw)));
        }
        drop(outcomes);

        cancelled.sort_by_key(|(position, _)| *position);
        result.cancelled = cancelled.into_iter().map(|(_, raw)| raw).collect();
        result.rejected.sort_by_key(|r| r.position);

        self.record_batch(&target, &result, scope);
        Ok(result)
    }

    fn writable(&self, target: &IndexDescriptor) -> IngestResult<IndexDescriptor> {
        let current = self
            .lifecycle
            .get(&target.index_id)
            .ok_or_else(|| LifecycleError::UnknownIndex(target.index_id.clone()))?;
        match current.state {
            IndexState::Building | IndexState::Active => Ok(current),
            state => Err(IngestError::IndexNotWritable {
                index_id: current.index_id,
                state,
            }),
        }
    }

    async fn write_chunk(&self, target: &IndexDescriptor, chunk: Vec<Pending>, cancel: &CancellationToken) -> ChunkOutcome {
        let documents: Vec<IndexedDocument> = chunk.iter().map(|p| p.indexed.clone()).collect();

        let submission = self
            .submit(&target.index_id, cancel, || self.writer.bulk_write(&target.index_id, &documents))
            .await;

        let mut outcome = ChunkOutcome::default();
        match submission {
            Submission::Done { response, attempts } => {
                self.metrics.increment_chunks_written();
                let failures = failures_by_position(&response);
                for (position, pending) in chunk.into_iter().enumerate() {
                    match failures.get(&position) {
                        Some(failure) => outcome.rejected.push(RejectedDocument {
                            position: pending.position,
                            document: pending.raw,
                            reason: RejectionReason::WriteFailure(WriteFailure {
                                index_id: target.index_id.clone(),
                                attempts,
                                message: failure.reason.clone(),
                            }),
                        }),
                        None => outcome.accepted += 1,
                    }
                }
            }
            Submission::Failed { error, attempts } => {
                for pending in chunk {
                    outcome.rejected.push(RejectedDocument {
                        position: pending.position,
                        document: pending.raw,
                        reason: RejectionReason::WriteFailure(WriteFailure {
                            index_id: target.index_id.clone(),
                            attempts,
                            message: error.to_string(),
                        }),
                    });
                }
            }
            Submission::Cancelled => outcome.cancelled = chunk,
        }
        outcome
    }

    /// Deletes documents by id from the active index of `schema_name`.
    pub async fn delete_documents(
        &self,
        schema_name: &str,
        ids: Vec<String>,
        cancel: &CancellationToken,
    ) -> IngestResult<DeleteResult> {
        if !self.normalizer.registry().contains(schema_name) {
            return Err(IngestError::UnknownSchema(schema_name.to_string()));
        }
        let target = self
            .lifecycle
            .active(schema_name)
            .ok_or_else(|| LifecycleError::NoActiveIndex(schema_name.to_string()))?;

        let chunks: Vec<Vec<String>> = ids.chunks(self.chunk_size).map(<[String]>::to_vec).collect();
        let mut outcomes = stream::iter(chunks)
            .map(|chunk| self.delete_chunk(&target, chunk, cancel))
            .buffer_unordered(self.concurrency);

        let mut result = DeleteResult::default();
        while let Some(outcome) = outcomes.next().await {
            result.deleted += outcome.deleted;
            result.failed.extend(outcome.failed);
            result.cancelled.extend(outcome.cancelled);
        }

        self.metrics.add_documents_deleted(result.deleted as u64);
        log_event_with_fields(
            Event::DocumentsDeleted,
            &[
                ("index", &target.index_id),
                ("deleted", &result.deleted.to_string()),
                ("failed", &result.failed.len().to_string()),
                ("cancelled", &result.cancelled.len().to_string()),
            ],
        );
        Ok(result)
    }

    async fn delete_chunk(&self, target: &IndexDescriptor, ids: Vec<String>, cancel: &CancellationToken) -> DeleteResult {
        let submission = self
            .submit(&target.index_id, cancel, || self.writer.bulk_delete(&target.index_id, &ids))
            .await;

        let mut outcome = DeleteResult::default();
        match submission {
            Submission::Done { response, .. } => {
                let failures = failures_by_position(&response);
                for (position, id) in ids.into_iter().enumerate() {
                    match failures.get(&position) {
                        Some(failure) => outcome.failed.push(DeleteFailure {
                            id,
                            message: failure.reason.clone(),
                        }),
                        None => outcome.deleted += 1,
                    }
                }
            }
            Submission::Failed { error, .. } => {
                let message = error.to_string();
                outcome.failed = ids
                    .into_iter()
                    .map(|id| DeleteFailure {
                        id,
                        message: message.clone(),
                    })
                    .collect();
            }
            Submission::Cancelled => outcome.cancelled = ids,
        }
        outcome
    }

    /// Sends one bulk request with retry. Nothing is sent once `cancel`
    /// has fired, and a cancel during backoff abandons the request.
    async fn submit<F, Fut>(&self, index_id: &str, cancel: &CancellationToken, mut send: F) -> Submission
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<BulkResponse, BackendError>>,
    {
        if cancel.is_cancelled() {
            return Submission::Cancelled;
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            match send().await {
                Ok(response) => return Submission::Done { response, attempts },
                Err(error) if error.is_retryable() && attempts < self.write_retry.max_attempts() => {
                    self.metrics.increment_chunk_retries();
                    warn_event(
                        Event::ChunkRetry,
                        &[
                            ("index", index_id),
                            ("attempt", &attempts.to_string()),
                            ("reason", &error.to_string()),
                        ],
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Submission::Cancelled,
                        _ = tokio::time::sleep(self.write_retry.delay_for(attempts)) => {}
                    }
                }
                Err(error) => {
                    self.metrics.increment_chunk_failures();
                    log_event_with_fields(
                        Event::ChunkFailed,
                        &[
                            ("index", index_id),
                            ("attempts", &attempts.to_string()),
                            ("reason", &error.to_string()),
                        ],
                    );
                    return Submission::Failed { error, attempts };
                }
            }
        }
    }

    fn log_rejected(&self, target: &IndexDescriptor, id: &str, violations: &[FieldViolation]) {
        let fields: Vec<&str> = violations.iter().map(|v| v.path()).collect();
        warn_event(
            Event::DocumentRejected,
            &[
                ("schema", &target.schema_name),
                ("id", id),
                ("fields", &fields.join(",")),
            ],
        );
    }

    fn record_batch(&self, target: &IndexDescriptor, result: &BatchResult, scope: ObservationScope) {
        self.metrics.add_documents_accepted(result.accepted as u64);
        self.metrics.add_documents_rejected(result.rejected.len() as u64);
        self.metrics.add_documents_cancelled(result.cancelled.len() as u64);

        let accepted = result.accepted.to_string();
        let rejected = result.rejected.len().to_string();
        let cancelled = result.cancelled.len().to_string();

        if !result.cancelled.is_empty() {
            warn_event(
                Event::BatchCancelled,
                &[("index", &target.index_id), ("cancelled", &cancelled)],
            );
        }

        scope.complete_with_fields(&[
            ("accepted", &accepted),
            ("rejected", &rejected),
            ("cancelled", &cancelled),
        ]);
    }
}

fn failures_by_position(response: &BulkResponse) -> HashMap<usize, &DocumentFailure> {
    response.failures.iter().map(|f| (f.position, f)).collect()
}

#[derive(Default)]
struct ChunkOutcome {
    accepted: usize,
    rejected: Vec<RejectedDocument>,
    cancelled: Vec<Pending>,
}
