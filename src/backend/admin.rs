//! Index-administration API

use serde_json::Value;

use super::BackendFuture;

/// Creates, deletes and aliases backend indexes.
///
/// An index's mapping is fixed at creation; there is no update call.
pub trait AdminApi: Send + Sync + std::fmt::Debug {
    /// Create `index_id` with the given structural mapping
    fn create_index<'a>(&'a self, index_id: &'a str, mapping: &'a Value) -> BackendFuture<'a, ()>;

    /// Delete `index_id` and everything stored in it
    fn delete_index<'a>(&'a self, index_id: &'a str) -> BackendFuture<'a, ()>;

    /// Point `alias` at `index_id`, moving it off any previous index
    fn set_alias<'a>(&'a self, alias: &'a str, index_id: &'a str) -> BackendFuture<'a, ()>;
}
