//! searchmap - schema governance and document ingestion for search backends
//!
//! - `schema`: validated, persisted record schemas and their backend mappings
//! - `normalizer`: raw documents checked and shaped against a schema
//! - `lifecycle`: versioned backend indexes, alias swaps, retirement
//! - `ingest`: chunked, retried, cancellable bulk writes with full accounting
//! - `service`: one explicitly constructed context wiring all of the above
//!
//! The search engine itself is external and reached only through the
//! `backend` traits.

pub mod backend;
pub mod config;
pub mod durable;
pub mod ingest;
pub mod lifecycle;
pub mod normalizer;
pub mod observability;
pub mod schema;
pub mod service;

pub use config::IndexerConfig;
pub use service::{IndexService, SchemaChange, ServiceError, ServiceResult};
