//! Document write API

use serde::Serialize;
use serde_json::Value;

use super::BackendFuture;

/// A normalized document addressed by identifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedDocument {
    pub id: String,
    pub body: Value,
}

/// Per-document refusal inside an otherwise accepted bulk request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    /// Position of the refused item within the request. Ids may repeat
    /// inside one request, positions do not.
    pub position: usize,
    pub id: String,
    pub reason: String,
}

/// Outcome of one bulk request that reached the backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    pub failures: Vec<DocumentFailure>,
}

impl BulkResponse {
    /// Every document succeeded
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Bulk document writes against a named index.
///
/// An `Err` fails the whole request. Individual documents refused by the
/// backend come back in [`BulkResponse::failures`].
pub trait WriteApi: Send + Sync + std::fmt::Debug {
    /// Index or overwrite documents by id
    fn bulk_write<'a>(&'a self, index_id: &'a str, documents: &'a [IndexedDocument]) -> BackendFuture<'a, BulkResponse>;

    /// Remove documents by id; missing ids are not failures
    fn bulk_delete<'a>(&'a self, index_id: &'a str, ids: &'a [String]) -> BackendFuture<'a, BulkResponse>;
}
