//! Operational counters
//!
//! Counters only, monotonic, reset on process start.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Metrics registry shared by the registry, lifecycle manager and
/// ingestion coordinator.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    schemas_registered: AtomicU64,
    schemas_replaced: AtomicU64,
    schemas_rejected: AtomicU64,
    indexes_created: AtomicU64,
    indexes_activated: AtomicU64,
    indexes_deleted: AtomicU64,
    admin_retries: AtomicU64,
    documents_accepted: AtomicU64,
    documents_rejected: AtomicU64,
    documents_cancelled: AtomicU64,
    documents_deleted: AtomicU64,
    chunks_written: AtomicU64,
    chunk_retries: AtomicU64,
    chunk_failures: AtomicU64,
}

macro_rules! counter {
    ($inc:ident, $add:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }

        pub fn $add(&self, n: u64) {
            self.$field.fetch_add(n, Ordering::Relaxed);
        }
    };
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    counter!(increment_schemas_registered, add_schemas_registered, schemas_registered);
    counter!(increment_schemas_replaced, add_schemas_replaced, schemas_replaced);
    counter!(increment_schemas_rejected, add_schemas_rejected, schemas_rejected);
    counter!(increment_indexes_created, add_indexes_created, indexes_created);
    counter!(increment_indexes_activated, add_indexes_activated, indexes_activated);
    counter!(increment_indexes_deleted, add_indexes_deleted, indexes_deleted);
    counter!(increment_admin_retries, add_admin_retries, admin_retries);
    counter!(increment_documents_accepted, add_documents_accepted, documents_accepted);
    counter!(increment_documents_rejected, add_documents_rejected, documents_rejected);
    counter!(increment_documents_cancelled, add_documents_cancelled, documents_cancelled);
    counter!(increment_documents_deleted, add_documents_deleted, documents_deleted);
    counter!(increment_chunks_written, add_chunks_written, chunks_written);
    counter!(increment_chunk_retries, add_chunk_retries, chunk_retries);
    counter!(increment_chunk_failures, add_chunk_failures, chunk_failures);

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            schemas_registered: self.schemas_registered.load(Ordering::Relaxed),
            schemas_replaced: self.schemas_replaced.load(Ordering::Relaxed),
            schemas_rejected: self.schemas_rejected.load(Ordering::Relaxed),
            indexes_created: self.indexes_created.load(Ordering::Relaxed),
            indexes_activated: self.indexes_activated.load(Ordering::Relaxed),
            indexes_deleted: self.indexes_deleted.load(Ordering::Relaxed),
            admin_retries: self.admin_retries.load(Ordering::Relaxed),
            documents_accepted: self.documents_accepted.load(Ordering::Relaxed),
            documents_rejected: self.documents_rejected.load(Ordering::Relaxed),
            documents_cancelled: self.documents_cancelled.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
            chunks_written: self.chunks_written.load(Ordering::Relaxed),
            chunk_retries: self.chunk_retries.load(Ordering::Relaxed),
            chunk_failures: self.chunk_failures.load(Ordering::Relaxed),
        }
    }

    /// Snapshot as a JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Point-in-time metrics values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    pub schemas_registered: u64,
    pub schemas_replaced: u64,
    pub schemas_rejected: u64,
    pub indexes_created: u64,
    pub indexes_activated: u64,
    pub indexes_deleted: u64,
    pub admin_retries: u64,
    pub documents_accepted: u64,
    pub documents_rejected: u64,
    pub documents_cancelled: u64,
    pub documents_deleted: u64,
    pub chunks_written: u64,
    pub chunk_retries: u64,
    pub chunk_failures: u64,
}
