//! Observable lifecycle events
//!
//! Events are explicit and typed. Their string form is the `event` key of
//! every log line.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Startup
    /// Persisted schemas loaded into the registry
    SchemasLoaded,
    /// Persisted descriptor table loaded
    DescriptorsLoaded,

    // Schema registry
    /// New schema published
    SchemaRegistered,
    /// Existing schema replaced wholesale
    SchemaReplaced,
    /// Registration or replacement refused
    SchemaRejected,

    // Index lifecycle
    /// Backend index created, descriptor Building
    IndexCreated,
    /// Descriptor became Active
    IndexActivated,
    /// Descriptor drained into Retiring
    IndexRetiring,
    /// Backend index deleted
    IndexDeleted,
    /// Building descriptor dropped without ever activating
    IndexDiscarded,
    /// Schema replacement produced no structural change
    IndexUnchanged,
    /// Retiring index kept because nothing else serves its schema
    IndexDeletionRefused,
    /// Admin call failed and will be retried
    AdminRetry,

    // Ingestion
    /// Document refused by the normalizer
    DocumentRejected,
    /// Bulk chunk failed and will be retried
    ChunkRetry,
    /// Bulk chunk exhausted its retries
    ChunkFailed,
    /// Delete request finished
    DocumentsDeleted,
    /// Batch stopped by cancellation
    BatchCancelled,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SchemasLoaded => "SCHEMAS_LOADED",
            Event::DescriptorsLoaded => "DESCRIPTORS_LOADED",

            Event::SchemaRegistered => "SCHEMA_REGISTERED",
            Event::SchemaReplaced => "SCHEMA_REPLACED",
            Event::SchemaRejected => "SCHEMA_REJECTED",

            Event::IndexCreated => "INDEX_CREATED",
            Event::IndexActivated => "INDEX_ACTIVATED",
            Event::IndexRetiring => "INDEX_RETIRING",
            Event::IndexDeleted => "INDEX_DELETED",
            Event::IndexDiscarded => "INDEX_DISCARDED",
            Event::IndexUnchanged => "INDEX_UNCHANGED",
            Event::IndexDeletionRefused => "INDEX_DELETION_REFUSED",
            Event::AdminRetry => "ADMIN_RETRY",

            Event::DocumentRejected => "DOCUMENT_REJECTED",
            Event::ChunkRetry => "CHUNK_RETRY",
            Event::ChunkFailed => "CHUNK_FAILED",
            Event::DocumentsDeleted => "DOCUMENTS_DELETED",
            Event::BatchCancelled => "BATCH_CANCELLED",
        }
    }

    /// Returns true if this event reports a failure
    pub fn is_failure(&self) -> bool {
        matches!(self, Event::SchemaRejected | Event::ChunkFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_are_upper_snake() {
        let events = [
            Event::SchemasLoaded,
            Event::DescriptorsLoaded,
            Event::SchemaRegistered,
            Event::SchemaReplaced,
            Event::SchemaRejected,
            Event::IndexCreated,
            Event::IndexActivated,
            Event::IndexRetiring,
            Event::IndexDeleted,
            Event::IndexDiscarded,
            Event::IndexUnchanged,
            Event::IndexDeletionRefused,
            Event::AdminRetry,
            Event::DocumentRejected,
            Event::ChunkRetry,
            Event::ChunkFailed,
            Event::DocumentsDeleted,
            Event::BatchCancelled,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_failure_events() {
        assert!(Event::ChunkFailed.is_failure());
        assert!(!Event::IndexActivated.is_failure());
    }
}
