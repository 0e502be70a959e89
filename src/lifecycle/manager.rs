//! Index lifecycle manager
//!
//! Owns the descriptor table and every state transition in it.
//!
//! - Transitions for one schema name are serialized by a per-name async
//!   lock, held across the admin calls they make
//! - Table changes are persisted before they become visible
//! - A version number is reserved durably before its index is created,
//!   so a failed creation never hands the same version out twice
//! - Admin calls are retried with backoff, then surfaced; a partially
//!   created index is not rolled back
//! - A Retiring index is only deleted while another index of its schema
//!   is Active
//! - An existing index's mapping is never modified: a structural schema
//!   change always produces a new version

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::Utc;

use crate::backend::{retry, AdminApi, BackendResult, RetryExhausted, RetryPolicy};
use crate::config::IndexerConfig;
use crate::observability::{log_event_with_fields, warn_event, Event, MetricsRegistry};
use crate::schema::{requires_new_index, to_admin_mapping, SchemaDefinition};

use super::descriptor::{alias_name, IndexDescriptor, IndexState};
use super::errors::{LifecycleError, LifecycleResult};
use super::locks::KeyedLocks;
use super::store::{DescriptorStore, DescriptorTable};

/// Manages versioned backend indexes per schema name.
#[derive(Debug)]
pub struct IndexLifecycleManager {
    table: RwLock<DescriptorTable>,
    store: Option<DescriptorStore>,
    admin: Arc<dyn AdminApi>,
    index_prefix: String,
    admin_retry: RetryPolicy,
    locks: KeyedLocks,
    metrics: Arc<MetricsRegistry>,
}

impl IndexLifecycleManager {
    /// Manager with no persisted table
    pub fn in_memory(admin: Arc<dyn AdminApi>, config: &IndexerConfig, metrics: Arc<MetricsRegistry>) -> Self {
        Self::with_table(DescriptorTable::default(), None, admin, config, metrics)
    }

    /// Opens the manager over a persisted descriptor table.
    pub fn open(
        store: DescriptorStore,
        admin: Arc<dyn AdminApi>,
        config: &IndexerConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> LifecycleResult<Self> {
        let table = store.load()?;

        let count = table.descriptors.len().to_string();
        let path = store.path().display().to_string();
        log_event_with_fields(Event::DescriptorsLoaded, &[("count", &count), ("path", &path)]);

        Ok(Self::with_table(table, Some(store), admin, config, metrics))
    }

    fn with_table(
        table: DescriptorTable,
        store: Option<DescriptorStore>,
        admin: Arc<dyn AdminApi>,
        config: &IndexerConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            table: RwLock::new(table),
            store,
            admin,
            index_prefix: config.index_prefix.clone(),
            admin_retry: config.admin_retry_policy(),
            locks: KeyedLocks::default(),
            metrics,
        }
    }

    /// Creates the next index version for `schema`, in Building state.
    pub async fn create_index(&self, schema: &SchemaDefinition) -> LifecycleResult<IndexDescriptor> {
        let _guard = self.locks.lock(&schema.name).await?;

        let version = self.update(|table| Ok(table.reserve_version(&schema.name)))?;
        let descriptor = IndexDescriptor::building(schema, &self.index_prefix, version);

        let mapping = to_admin_mapping(schema);
        self.admin_call(&descriptor.index_id, || {
            self.admin.create_index(&descriptor.index_id, &mapping)
        })
        .await?;

        self.update(|table| {
            table.descriptors.push(descriptor.clone());
            Ok(())
        })?;

        self.metrics.increment_indexes_created();
        log_event_with_fields(
            Event::IndexCreated,
            &[
                ("schema", &descriptor.schema_name),
                ("index", &descriptor.index_id),
                ("version", &descriptor.version.to_string()),
            ],
        );
        Ok(descriptor)
    }

    /// Building → Active, pointing the schema's alias at the index.
    ///
    /// # Errors
    ///
    /// - `AlreadyActive` if another index of the schema is Active
    /// - `InvalidTransition` unless the descriptor is Building
    pub async fn activate(&self, descriptor: &IndexDescriptor) -> LifecycleResult<IndexDescriptor> {
        let _guard = self.locks.lock(&descriptor.schema_name).await?;

        let current = self.current(&descriptor.index_id)?;
        if let Some(active) = self.active(&current.schema_name) {
            if active.index_id != current.index_id {
                return Err(LifecycleError::AlreadyActive {
                    schema: current.schema_name,
                    active: active.index_id,
                });
            }
        }
        check_transition(&current, IndexState::Active)?;

        let alias = alias_name(&self.index_prefix, &current.schema_name);
        self.admin_call(&current.index_id, || {
            self.admin.set_alias(&alias, &current.index_id)
        })
        .await?;

        let activated = self.transition(&current.index_id, IndexState::Active)?;
        self.metrics.increment_indexes_activated();
        log_event_with_fields(
            Event::IndexActivated,
            &[("schema", &activated.schema_name), ("index", &activated.index_id), ("alias", &alias)],
        );
        Ok(activated)
    }

    /// Building → Active, retiring the schema's current Active index in the
    /// same table change.
    ///
    /// The alias is moved first. If that fails nothing has changed and the
    /// previous index is still Active.
    ///
    /// Returns the activated descriptor and the one it displaced.
    pub async fn swap_active(
        &self,
        building: &IndexDescriptor,
    ) -> LifecycleResult<(IndexDescriptor, Option<IndexDescriptor>)> {
        let _guard = self.locks.lock(&building.schema_name).await?;

        let current = self.current(&building.index_id)?;
        check_transition(&current, IndexState::Active)?;
        let previous = self.active(&current.schema_name);

        let alias = alias_name(&self.index_prefix, &current.schema_name);
        self.admin_call(&current.index_id, || {
            self.admin.set_alias(&alias, &current.index_id)
        })
        .await?;

        let (activated, retiring) = self.update(|table| {
            let retiring = match &previous {
                Some(previous) => Some(set_state(
                    &mut table.descriptors,
                    &previous.index_id,
                    IndexState::Retiring,
                )?),
                None => None,
            };
            let activated = set_state(&mut table.descriptors, &current.index_id, IndexState::Active)?;
            Ok((activated, retiring))
        })?;

        if let Some(retiring) = &retiring {
            log_event_with_fields(
                Event::IndexRetiring,
                &[("schema", &retiring.schema_name), ("index", &retiring.index_id)],
            );
        }
        self.metrics.increment_indexes_activated();
        log_event_with_fields(
            Event::IndexActivated,
            &[("schema", &activated.schema_name), ("index", &activated.index_id), ("alias", &alias)],
        );
        Ok((activated, retiring))
    }

    /// Active → Retiring. The index keeps serving in-flight reads.
    pub async fn retire(&self, descriptor: &IndexDescriptor) -> LifecycleResult<IndexDescriptor> {
        let _guard = self.locks.lock(&descriptor.schema_name).await?;
        self.retire_locked(&descriptor.index_id)
    }

    fn retire_locked(&self, index_id: &str) -> LifecycleResult<IndexDescriptor> {
        let retiring = self.transition(index_id, IndexState::Retiring)?;
        log_event_with_fields(
            Event::IndexRetiring,
            &[("schema", &retiring.schema_name), ("index", &retiring.index_id)],
        );
        Ok(retiring)
    }

    /// Drains an Active or Retiring index and deletes it.
    ///
    /// The per-name lock is released during the grace period, so a
    /// replacement can be activated while the old index drains. The delete
    /// is only issued if the index is still Retiring afterwards.
    ///
    /// An index that is already Retiring when this is called is only
    /// deleted while another index of its schema is Active, checked both
    /// before and after the grace period. Otherwise it stays in place and
    /// `NoActiveReplacement` is returned.
    pub async fn retire_and_delete(
        &self,
        descriptor: &IndexDescriptor,
        grace: Duration,
    ) -> LifecycleResult<IndexDescriptor> {
        let needs_replacement = {
            let _guard = self.locks.lock(&descriptor.schema_name).await?;
            let current = self.current(&descriptor.index_id)?;
            match current.state {
                IndexState::Active => {
                    self.retire_locked(&current.index_id)?;
                    false
                }
                IndexState::Retiring => {
                    self.ensure_replacement(&current)?;
                    true
                }
                other => {
                    return Err(LifecycleError::InvalidTransition {
                        index_id: current.index_id,
                        from: other,
                        to: IndexState::Retiring,
                    });
                }
            }
        };

        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }

        let _guard = self.locks.lock(&descriptor.schema_name).await?;
        let current = self.current(&descriptor.index_id)?;
        check_transition(&current, IndexState::Deleted)?;
        if needs_replacement {
            self.ensure_replacement(&current)?;
        }
        self.delete_locked(current, Event::IndexDeleted).await
    }

    fn ensure_replacement(&self, retiring: &IndexDescriptor) -> LifecycleResult<()> {
        if self.read(|table| has_active(table, &retiring.schema_name))? {
            return Ok(());
        }
        warn_event(
            Event::IndexDeletionRefused,
            &[("schema", &retiring.schema_name), ("index", &retiring.index_id)],
        );
        Err(LifecycleError::NoActiveReplacement {
            schema: retiring.schema_name.clone(),
            index_id: retiring.index_id.clone(),
        })
    }

    /// Building → Deleted for a version that will never be activated.
    pub async fn discard(&self, descriptor: &IndexDescriptor) -> LifecycleResult<IndexDescriptor> {
        let _guard = self.locks.lock(&descriptor.schema_name).await?;
        let current = self.current(&descriptor.index_id)?;
        if current.state != IndexState::Building {
            return Err(LifecycleError::InvalidTransition {
                index_id: current.index_id,
                from: current.state,
                to: IndexState::Deleted,
            });
        }
        self.delete_locked(current, Event::IndexDiscarded).await
    }

    async fn delete_locked(&self, current: IndexDescriptor, event: Event) -> LifecycleResult<IndexDescriptor> {
        let still_active = self.read(|table| {
            table
                .iter()
                .any(|d| d.index_id == current.index_id && d.is_active())
        })?;
        if still_active {
            return Err(LifecycleError::InvalidTransition {
                index_id: current.index_id,
                from: IndexState::Active,
                to: IndexState::Deleted,
            });
        }

        self.admin_call(&current.index_id, || self.admin.delete_index(&current.index_id))
            .await?;

        let deleted = self.transition(&current.index_id, IndexState::Deleted)?;
        self.metrics.increment_indexes_deleted();
        log_event_with_fields(event, &[("schema", &deleted.schema_name), ("index", &deleted.index_id)]);
        Ok(deleted)
    }

    /// Reacts to a schema replacement.
    ///
    /// Returns the new Building descriptor when the mapping changed, or
    /// `None` when the existing index already fits the new definition.
    pub async fn on_schema_replaced(
        &self,
        old: &SchemaDefinition,
        new: &SchemaDefinition,
    ) -> LifecycleResult<Option<IndexDescriptor>> {
        if !requires_new_index(old, new) {
            log_event_with_fields(Event::IndexUnchanged, &[("schema", &new.name)]);
            return Ok(None);
        }
        self.create_index(new).await.map(Some)
    }

    /// The Active descriptor of `schema_name`, if any
    pub fn active(&self, schema_name: &str) -> Option<IndexDescriptor> {
        self.read(|table| {
            table
                .iter()
                .find(|d| d.schema_name == schema_name && d.is_active())
                .cloned()
        })
        .ok()
        .flatten()
    }

    /// Every descriptor of `schema_name`, by version
    pub fn descriptors(&self, schema_name: &str) -> Vec<IndexDescriptor> {
        let mut descriptors: Vec<_> = self
            .read(|table| {
                table
                    .iter()
                    .filter(|d| d.schema_name == schema_name)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        descriptors.sort_by_key(|d| d.version);
        descriptors
    }

    pub fn get(&self, index_id: &str) -> Option<IndexDescriptor> {
        self.read(|table| table.iter().find(|d| d.index_id == index_id).cloned())
            .ok()
            .flatten()
    }

    /// Retiring descriptors whose backend index still has to be deleted,
    /// e.g. after a restart interrupted `retire_and_delete`.
    ///
    /// A Retiring index whose schema has no Active index is still the only
    /// copy of that schema's data and is left out.
    pub fn pending_deletions(&self) -> Vec<IndexDescriptor> {
        self.read(|table| {
            table
                .iter()
                .filter(|d| d.state == IndexState::Retiring && has_active(table, &d.schema_name))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    /// Alias naming the active index of `schema_name`
    pub fn alias_for(&self, schema_name: &str) -> String {
        alias_name(&self.index_prefix, schema_name)
    }

    fn current(&self, index_id: &str) -> LifecycleResult<IndexDescriptor> {
        self.get(index_id)
            .ok_or_else(|| LifecycleError::UnknownIndex(index_id.to_string()))
    }

    fn transition(&self, index_id: &str, to: IndexState) -> LifecycleResult<IndexDescriptor> {
        self.update(|table| set_state(&mut table.descriptors, index_id, to))
    }

    fn read<T>(&self, f: impl FnOnce(&[IndexDescriptor]) -> T) -> LifecycleResult<T> {
        let table = self
            .table
            .read()
            .map_err(|_| LifecycleError::poisoned("descriptor table"))?;
        Ok(f(&table.descriptors))
    }

    /// Applies `f` to a copy of the table, persists it, then publishes it
    fn update<T>(&self, f: impl FnOnce(&mut DescriptorTable) -> LifecycleResult<T>) -> LifecycleResult<T> {
        let mut table = self
            .table
            .write()
            .map_err(|_| LifecycleError::poisoned("descriptor table"))?;

        let mut candidate = table.clone();
        let result = f(&mut candidate)?;
        if let Some(store) = &self.store {
            store.save(&candidate)?;
        }
        *table = candidate;
        Ok(result)
    }

    async fn admin_call<F, Fut>(&self, index_id: &str, call: F) -> LifecycleResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BackendResult<()>>,
    {
        retry(&self.admin_retry, call, |attempt, error| {
            self.metrics.increment_admin_retries();
            warn_event(
                Event::AdminRetry,
                &[
                    ("index", index_id),
                    ("attempt", &attempt.to_string()),
                    ("reason", &error.to_string()),
                ],
            );
        })
        .await
        .map_err(|exhausted| admin_error(index_id, exhausted))
    }
}

fn set_state(descriptors: &mut [IndexDescriptor], index_id: &str, to: IndexState) -> LifecycleResult<IndexDescriptor> {
    let descriptor = descriptors
        .iter_mut()
        .find(|d| d.index_id == index_id)
        .ok_or_else(|| LifecycleError::UnknownIndex(index_id.to_string()))?;
    check_transition(descriptor, to)?;
    descriptor.state = to;
    descriptor.updated_at = Utc::now();
    Ok(descriptor.clone())
}

fn has_active(descriptors: &[IndexDescriptor], schema_name: &str) -> bool {
    descriptors
        .iter()
        .any(|d| d.schema_name == schema_name && d.is_active())
}

fn check_transition(descriptor: &IndexDescriptor, to: IndexState) -> LifecycleResult<()> {
    if descriptor.state.can_transition_to(to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidTransition {
            index_id: descriptor.index_id.clone(),
            from: descriptor.state,
            to,
        })
    }
}

fn admin_error(index_id: &str, exhausted: RetryExhausted) -> LifecycleError {
    if exhausted.error.is_retryable() {
        LifecycleError::BackendUnavailable {
            index_id: index_id.to_string(),
            attempts: exhausted.attempts,
            reason: exhausted.error.to_string(),
        }
    } else {
        LifecycleError::BackendRejected {
            index_id: index_id.to_string(),
            reason: exhausted.error.to_string(),
        }
    }
}
