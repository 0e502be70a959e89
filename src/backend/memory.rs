//! In-process backend
//!
//! Implements both APIs over plain maps. Faults can be injected to exercise
//! retry and partial-failure paths:
//!
//! - `fail_next_admin_calls(n)`: the next `n` admin calls are Unavailable
//! - `fail_next_writes(n)`: the next `n` bulk requests are Unavailable
//! - `reject_document(id)`: that id fails inside every bulk write

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use serde_json::Value;

use super::admin::AdminApi;
use super::errors::{BackendError, BackendResult};
use super::write::{BulkResponse, DocumentFailure, IndexedDocument, WriteApi};
use super::BackendFuture;

#[derive(Debug, Default)]
struct StoredIndex {
    mapping: Value,
    documents: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct State {
    indexes: BTreeMap<String, StoredIndex>,
    aliases: BTreeMap<String, String>,
    admin_failures: u32,
    write_failures: u32,
    rejected_ids: HashSet<String>,
    admin_calls: usize,
    write_calls: usize,
}

/// Search backend held in memory
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| BackendError::Unavailable("backend state lock poisoned".into()))
    }

    fn with_state<T>(&self, f: impl FnOnce(&State) -> T) -> Option<T> {
        self.state.lock().ok().map(|state| f(&state))
    }

    /// Fail the next `n` admin calls with `Unavailable`
    pub fn fail_next_admin_calls(&self, n: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.admin_failures = n;
        }
    }

    /// Fail the next `n` bulk requests with `Unavailable`
    pub fn fail_next_writes(&self, n: u32) {
        if let Ok(mut state) = self.state.lock() {
            state.write_failures = n;
        }
    }

    /// Refuse `id` inside every later bulk write
    pub fn reject_document(&self, id: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.rejected_ids.insert(id.to_string());
        }
    }

    /// Existing index identifiers, sorted
    pub fn index_ids(&self) -> Vec<String> {
        self.with_state(|s| s.indexes.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_index(&self, index_id: &str) -> bool {
        self.with_state(|s| s.indexes.contains_key(index_id))
            .unwrap_or(false)
    }

    /// Mapping the index was created with
    pub fn mapping(&self, index_id: &str) -> Option<Value> {
        self.with_state(|s| s.indexes.get(index_id).map(|i| i.mapping.clone()))
            .flatten()
    }

    /// Index the alias currently points at
    pub fn alias(&self, alias: &str) -> Option<String> {
        self.with_state(|s| s.aliases.get(alias).cloned()).flatten()
    }

    pub fn document(&self, index_id: &str, id: &str) -> Option<Value> {
        self.with_state(|s| {
            s.indexes
                .get(index_id)
                .and_then(|i| i.documents.get(id).cloned())
        })
        .flatten()
    }

    pub fn document_count(&self, index_id: &str) -> usize {
        self.with_state(|s| s.indexes.get(index_id).map_or(0, |i| i.documents.len()))
            .unwrap_or(0)
    }

    /// Admin calls received, failed ones included
    pub fn admin_calls(&self) -> usize {
        self.with_state(|s| s.admin_calls).unwrap_or(0)
    }

    /// Bulk requests received, failed ones included
    pub fn write_calls(&self) -> usize {
        self.with_state(|s| s.write_calls).unwrap_or(0)
    }

    fn admin<T>(&self, op: impl FnOnce(&mut State) -> BackendResult<T>) -> BackendResult<T> {
        let mut state = self.lock()?;
        state.admin_calls += 1;
        if state.admin_failures > 0 {
            state.admin_failures -= 1;
            return Err(BackendError::Unavailable("injected admin failure".into()));
        }
        op(&mut state)
    }

    fn bulk(
        &self,
        index_id: &str,
        op: impl FnOnce(&mut StoredIndex, &HashSet<String>) -> BulkResponse,
    ) -> BackendResult<BulkResponse> {
        let mut state = self.lock()?;
        state.write_calls += 1;
        if state.write_failures > 0 {
            state.write_failures -= 1;
            return Err(BackendError::Unavailable("injected write failure".into()));
        }

        let State {
            indexes,
            rejected_ids,
            ..
        } = &mut *state;
        let index = indexes
            .get_mut(index_id)
            .ok_or_else(|| BackendError::Rejected(format!("no such index '{}'", index_id)))?;
        Ok(op(index, rejected_ids))
    }
}

impl AdminApi for InMemoryBackend {
    fn create_index<'a>(&'a self, index_id: &'a str, mapping: &'a Value) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.admin(|state| {
                if state.indexes.contains_key(index_id) {
                    return Err(BackendError::Rejected(format!(
                        "index '{}' already exists",
                        index_id
                    )));
                }
                state.indexes.insert(
                    index_id.to_string(),
                    StoredIndex {
                        mapping: mapping.clone(),
                        documents: BTreeMap::new(),
                    },
                );
                Ok(())
            })
        })
    }

    fn delete_index<'a>(&'a self, index_id: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.admin(|state| {
                state
                    .indexes
                    .remove(index_id)
                    .ok_or_else(|| BackendError::Rejected(format!("no such index '{}'", index_id)))?;
                state.aliases.retain(|_, target| target != index_id);
                Ok(())
            })
        })
    }

    fn set_alias<'a>(&'a self, alias: &'a str, index_id: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.admin(|state| {
                if !state.indexes.contains_key(index_id) {
                    return Err(BackendError::Rejected(format!("no such index '{}'", index_id)));
                }
                state.aliases.insert(alias.to_string(), index_id.to_string());
                Ok(())
            })
        })
    }
}

impl WriteApi for InMemoryBackend {
    fn bulk_write<'a>(&'a self, index_id: &'a str, documents: &'a [IndexedDocument]) -> BackendFuture<'a, BulkResponse> {
        Box::pin(async move {
            self.bulk(index_id, |index, rejected_ids| {
                let mut response = BulkResponse::ok();
                for (position, doc) in documents.iter().enumerate() {
                    if rejected_ids.contains(&doc.id) {
                        response.failures.push(DocumentFailure {
                            position,
                            id: doc.id.clone(),
                            reason: "document rejected by backend".into(),
                        });
                        continue;
                    }
                    index.documents.insert(doc.id.clone(), doc.body.clone());
                }
                response
            })
        })
    }

    fn bulk_delete<'a>(&'a self, index_id: &'a str, ids: &'a [String]) -> BackendFuture<'a, BulkResponse> {
        Box::pin(async move {
            self.bulk(index_id, |index, _| {
                for id in ids {
                    index.documents.remove(id);
                }
                BulkResponse::ok()
            })
        })
    }
}
