//! Batch ingestion
//!
//! Raw documents are normalized against their schema and bulk-written to
//! an index in bounded, retried chunks. A batch always returns a full
//! accounting: accepted, rejected (with reasons) and cancelled.

mod batch;
mod cancel;
mod coordinator;
mod errors;

pub use batch::{
    BatchResult, DeleteFailure, DeleteResult, RawDocument, RejectedDocument, RejectionReason, WriteFailure,
};
pub use cancel::CancellationToken;
pub use coordinator::IngestionCoordinator;
pub use errors::{IngestError, IngestResult};
