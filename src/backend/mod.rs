//! Search backend collaborators
//!
//! The search engine itself is external. This module defines the two APIs
//! the indexer talks to, the retry policy wrapped around them, and an
//! in-memory implementation.

use std::future::Future;
use std::pin::Pin;

mod admin;
mod errors;
mod memory;
mod retry;
mod write;

pub use admin::AdminApi;
pub use errors::{BackendError, BackendResult, RetryExhausted};
pub use memory::InMemoryBackend;
pub use retry::{retry, RetryPolicy};
pub use write::{BulkResponse, DocumentFailure, IndexedDocument, WriteApi};

/// Boxed future returned by backend calls
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = BackendResult<T>> + Send + 'a>>;
