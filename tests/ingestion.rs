//! Ingestion Tests
//!
//! Batch accounting through the service:
//! - accepted + rejected + cancelled always equals the batch size
//! - One bad document never aborts a batch
//! - Rejections carry the offending field paths
//! - Transient backend failures are retried; exhausted retries are reported

use std::sync::Arc;

use searchmap::backend::InMemoryBackend;
use searchmap::ingest::{CancellationToken, IngestError, RawDocument, RejectionReason};
use searchmap::lifecycle::LifecycleError;
use searchmap::{IndexService, IndexerConfig, ServiceError};
use serde_json::json;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

async fn setup(chunk_size: usize) -> (TempDir, Arc<InMemoryBackend>, IndexService) {
    let tmp = TempDir::new().unwrap();
    let mut config = IndexerConfig::new(tmp.path().to_string_lossy());
    config.write_chunk_size = chunk_size;
    config.retry_base_delay_ms = 1;
    config.retry_max_delay_ms = 10;
    config.retire_grace_period_ms = 0;

    let backend = Arc::new(InMemoryBackend::new());
    let service = IndexService::open(config, backend.clone(), backend.clone()).unwrap();
    service.register_builtin_schemas().await.unwrap();
    (tmp, backend, service)
}

fn experiment(i: usize) -> RawDocument {
    RawDocument::new(
        format!("exp-{}", i),
        json!({
            "legacy_name": format!("CERN-LHC-{}", i),
            "control_number": i,
            "self": {"$ref": format!("http://localhost/api/experiments/{}", i)}
        }),
    )
}

// =============================================================================
// Accounting
// =============================================================================

/// Ten documents, three with undeclared fields: seven indexed, three
/// rejected with the field names.
#[tokio::test]
async fn test_partial_batch_accounting() {
    let (_tmp, backend, service) = setup(3).await;

    let documents: Vec<_> = (0..10)
        .map(|i| match i {
            1 => RawDocument::new("exp-1", json!({"legacy_name": "A", "budget": 1})),
            4 => RawDocument::new("exp-4", json!({"collaboration": {"value": "ATLAS", "size": 3000}})),
            9 => RawDocument::new("exp-9", json!({"legacy_name": "B", "budget": 1, "spokesperson": "x"})),
            _ => experiment(i),
        })
        .collect();

    let result = service
        .ingest("experiments", documents, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.accepted, 7);
    assert_eq!(result.rejected.len(), 3);
    assert_eq!(result.total(), 10);

    let rejected: Vec<_> = result
        .rejected
        .iter()
        .map(|r| (r.position, r.reason.field_paths()))
        .collect();
    assert_eq!(
        rejected,
        vec![
            (1, vec!["budget"]),
            (4, vec!["collaboration.size"]),
            (9, vec!["budget", "spokesperson"]),
        ]
    );

    let index_id = service.lifecycle().active("experiments").unwrap().index_id;
    assert_eq!(backend.document_count(&index_id), 7);
    assert!(backend.document(&index_id, "exp-1").is_none());
}

/// Indexed documents are the normalized form, enrichment included.
#[tokio::test]
async fn test_indexed_documents_are_normalized() {
    let (_tmp, backend, service) = setup(10).await;

    service
        .ingest("experiments", vec![experiment(42)], &CancellationToken::new())
        .await
        .unwrap();

    let index_id = service.lifecycle().active("experiments").unwrap().index_id;
    let stored = backend.document(&index_id, "exp-42").unwrap();
    assert_eq!(stored["self_recid"], json!(42));
    assert_eq!(stored["experimentautocomplete"], json!("CERN-LHC-42"));
}

/// The empty batch is a complete success.
#[tokio::test]
async fn test_empty_batch() {
    let (_tmp, backend, service) = setup(10).await;
    let result = service
        .ingest("jobs", vec![], &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_complete_success());
    assert_eq!(result.total(), 0);
    assert_eq!(backend.write_calls(), 0);
}

// =============================================================================
// Backend Failures
// =============================================================================

/// Transient failures are retried and the batch still succeeds.
#[tokio::test(start_paused = true)]
async fn test_transient_failures_retried() {
    let (_tmp, backend, service) = setup(100).await;
    backend.fail_next_writes(3);

    let result = service
        .ingest("experiments", (0..20).map(experiment).collect(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.is_complete_success());
    assert_eq!(result.accepted, 20);
    assert_eq!(service.metrics().snapshot().chunk_retries, 3);
}

/// A chunk that never gets through is rejected with a write failure.
#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_reported() {
    let (_tmp, backend, service) = setup(100).await;
    backend.fail_next_writes(u32::MAX);

    let result = service
        .ingest("experiments", (0..5).map(experiment).collect(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.accepted, 0);
    assert_eq!(result.rejected.len(), 5);
    assert!(result
        .rejected
        .iter()
        .all(|r| matches!(&r.reason, RejectionReason::WriteFailure(f) if f.attempts == 4)));
}

// =============================================================================
// Preconditions
// =============================================================================

/// Unknown schema fails the whole call.
#[tokio::test]
async fn test_unknown_schema_fails_batch() {
    let (_tmp, _backend, service) = setup(10).await;
    let err = service
        .ingest("conferences", vec![experiment(1)], &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Ingest(IngestError::UnknownSchema(ref name)) if name == "conferences"
    ));
}

/// A schema whose only index is draining has nowhere to write.
#[tokio::test]
async fn test_no_active_index_fails_batch() {
    let (_tmp, _backend, service) = setup(10).await;
    let active = service.lifecycle().active("jobs").unwrap();
    service.lifecycle().retire(&active).await.unwrap();

    let err = service
        .ingest("jobs", vec![], &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Ingest(IngestError::Lifecycle(LifecycleError::NoActiveIndex(_)))
    ));
}

// =============================================================================
// Deletion
// =============================================================================

/// Deleted documents disappear from the active index.
#[tokio::test]
async fn test_delete_by_id() {
    let (_tmp, backend, service) = setup(2).await;
    service
        .ingest("experiments", (0..5).map(experiment).collect(), &CancellationToken::new())
        .await
        .unwrap();

    let result = service
        .delete(
            "experiments",
            vec!["exp-0".into(), "exp-2".into(), "exp-4".into()],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.deleted, 3);
    let index_id = service.lifecycle().active("experiments").unwrap().index_id;
    assert_eq!(backend.document_count(&index_id), 2);
    assert_eq!(service.metrics().snapshot().documents_deleted, 3);
}
