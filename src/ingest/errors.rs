//! Ingestion errors
//!
//! Only preconditions fail a batch. Per-document problems are reported in
//! the batch result instead.

use thiserror::Error;

use crate::lifecycle::{IndexState, LifecycleError};
use crate::normalizer::NormalizeError;

/// Result type for ingestion
pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("Unknown schema '{0}'")]
    UnknownSchema(String),

    #[error("Index '{index_id}' is {state} and cannot accept writes")]
    IndexNotWritable { index_id: String, state: IndexState },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Normalization failed for a reason other than the document itself
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

impl IngestError {
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::UnknownSchema(_) => "INGEST_UNKNOWN_SCHEMA",
            IngestError::IndexNotWritable { .. } => "INGEST_INDEX_NOT_WRITABLE",
            IngestError::Lifecycle(e) => e.code(),
            IngestError::Normalize(e) => e.code(),
        }
    }
}
