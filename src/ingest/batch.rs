//! Batch inputs and their accounting

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalizer::FieldViolation;

/// A source document as submitted for ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Backend document id; generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub body: Value,
}

impl RawDocument {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        Self {
            id: Some(id.into()),
            body,
        }
    }

    /// Document whose id will be generated on ingestion
    pub fn anonymous(body: Value) -> Self {
        Self { id: None, body }
    }
}

/// Terminal write failure for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    pub index_id: String,
    /// Bulk requests made for the document's chunk
    pub attempts: u32,
    pub message: String,
}

/// Why a document did not make it into the index
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RejectionReason {
    Violations(Vec<FieldViolation>),
    WriteFailure(WriteFailure),
}

impl RejectionReason {
    /// Paths of the offending fields; empty for write failures
    pub fn field_paths(&self) -> Vec<&str> {
        match self {
            RejectionReason::Violations(violations) => violations.iter().map(FieldViolation::path).collect(),
            RejectionReason::WriteFailure(_) => Vec::new(),
        }
    }
}

/// A rejected document with its position in the submitted batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedDocument {
    pub position: usize,
    pub document: RawDocument,
    pub reason: RejectionReason,
}

/// Full accounting of one batch. Every submitted document is counted in
/// exactly one of `accepted`, `rejected` or `cancelled`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchResult {
    pub accepted: usize,
    /// Ordered by batch position
    pub rejected: Vec<RejectedDocument>,
    /// Never submitted because the batch was cancelled; ordered by position
    pub cancelled: Vec<RawDocument>,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.accepted + self.rejected.len() + self.cancelled.len()
    }

    pub fn is_complete_success(&self) -> bool {
        self.rejected.is_empty() && self.cancelled.is_empty()
    }

    /// Merges another batch's accounting into this one
    pub fn absorb(&mut self, other: BatchResult) {
        self.accepted += other.accepted;
        self.rejected.extend(other.rejected);
        self.cancelled.extend(other.cancelled);
    }
}

/// Document the backend would not delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    pub id: String,
    pub message: String,
}

/// Accounting of one delete request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteResult {
    pub deleted: usize,
    pub failed: Vec<DeleteFailure>,
    pub cancelled: Vec<String>,
}
