//! Indexing service
//!
//! Explicitly constructed context that owns one schema registry and one
//! lifecycle manager, and wires the normalizer and ingestion coordinator
//! to them. Nothing here is global; tests open as many isolated services
//! as they like.
//!
//! Startup order:
//!
//! 1. Validate configuration
//! 2. Load and validate persisted schemas
//! 3. Load the descriptor table
//! 4. Wire normalizer and coordinator

mod errors;

use std::sync::Arc;

use serde_json::Value;

use crate::backend::{AdminApi, WriteApi};
use crate::config::IndexerConfig;
use crate::ingest::{BatchResult, CancellationToken, DeleteResult, IngestionCoordinator, RawDocument};
use crate::lifecycle::{DescriptorStore, IndexDescriptor, IndexLifecycleManager, LifecycleError};
use crate::normalizer::{DocumentNormalizer, NormalizedDocument};
use crate::observability::{MetricsRegistry, ObservationScope};
use crate::schema::{builtin, SchemaDefinition, SchemaError, SchemaRegistry, SchemaStore};

pub use errors::{ServiceError, ServiceResult};

/// What a schema replacement did
#[derive(Debug, Clone)]
pub struct SchemaChange {
    /// Definition before the replacement
    pub previous: Arc<SchemaDefinition>,
    /// New index version, if the mapping changed
    pub new_index: Option<IndexDescriptor>,
    /// Accounting of the backfill into `new_index`
    pub backfill: Option<BatchResult>,
    /// Previously active index, drained and deleted
    pub retired: Option<IndexDescriptor>,
}

impl SchemaChange {
    /// The new version is serving
    pub fn is_swapped(&self) -> bool {
        self.new_index.as_ref().map_or(false, IndexDescriptor::is_active)
    }
}

/// Schema governance, normalization and ingestion over one backend
#[derive(Debug)]
pub struct IndexService {
    config: IndexerConfig,
    metrics: Arc<MetricsRegistry>,
    registry: Arc<SchemaRegistry>,
    normalizer: Arc<DocumentNormalizer>,
    lifecycle: Arc<IndexLifecycleManager>,
    coordinator: IngestionCoordinator,
}

impl IndexService {
    /// Opens the service, loading persisted state from `config.data_dir`.
    pub fn open(config: IndexerConfig, admin: Arc<dyn AdminApi>, writer: Arc<dyn WriteApi>) -> ServiceResult<Self> {
        config.validate()?;

        let metrics = Arc::new(MetricsRegistry::new());
        let data_dir = config.data_path();

        let registry = Arc::new(SchemaRegistry::open(
            SchemaStore::new(&data_dir),
            Arc::clone(&metrics),
        )?);
        let lifecycle = Arc::new(IndexLifecycleManager::open(
            DescriptorStore::new(&data_dir),
            admin,
            &config,
            Arc::clone(&metrics),
        )?);
        let normalizer = Arc::new(DocumentNormalizer::new(Arc::clone(&registry))?);
        let coordinator = IngestionCoordinator::new(
            Arc::clone(&normalizer),
            Arc::clone(&lifecycle),
            writer,
            &config,
            Arc::clone(&metrics),
        );

        Ok(Self {
            config,
            metrics,
            registry,
            normalizer,
            lifecycle,
            coordinator,
        })
    }

    /// Registers a new schema and brings up its first active index.
    pub async fn register_schema(&self, schema: SchemaDefinition) -> ServiceResult<IndexDescriptor> {
        let name = schema.name.clone();
        self.registry.register(schema)?;
        self.ensure_active_index(&name).await
    }

    /// Registers every bundled schema that is not registered yet, and makes
    /// sure each has an active index.
    pub async fn register_builtin_schemas(&self) -> ServiceResult<Vec<IndexDescriptor>> {
        let mut active = Vec::new();
        for schema in builtin::all()? {
            let name = schema.name.clone();
            if !self.registry.contains(&name) {
                self.registry.register(schema)?;
            }
            active.push(self.ensure_active_index(&name).await?);
        }
        Ok(active)
    }

    /// Returns the active index of `schema_name`, creating and activating
    /// one if there is none (e.g. after a failed first creation).
    pub async fn ensure_active_index(&self, schema_name: &str) -> ServiceResult<IndexDescriptor> {
        if let Some(active) = self.lifecycle.active(schema_name) {
            return Ok(active);
        }
        let schema = self
            .registry
            .get(schema_name)
            .ok_or_else(|| SchemaError::UnknownSchema(schema_name.to_string()))?;
        let building = self.lifecycle.create_index(&schema).await?;
        Ok(self.lifecycle.activate(&building).await?)
    }

    /// Replaces a schema and re-indexes when its mapping changed.
    ///
    /// `backfill` is written into the new version before it is activated.
    /// If the backfill is cancelled the new version stays Building and the
    /// old one keeps serving; finish with [`IndexService::complete_reindex`].
    pub async fn replace_schema(
        &self,
        schema: SchemaDefinition,
        backfill: Vec<RawDocument>,
        cancel: &CancellationToken,
    ) -> ServiceResult<SchemaChange> {
        let scope = ObservationScope::with_fields("SCHEMA_CHANGE", &[("schema", &schema.name)]);

        match self.apply_schema_change(schema, backfill, cancel).await {
            Ok(change) => {
                let reindex = change.new_index.is_some().to_string();
                let swapped = change.is_swapped().to_string();
                scope.complete_with_fields(&[("reindex", &reindex), ("swapped", &swapped)]);
                Ok(change)
            }
            Err(e) => {
                scope.fail(e.code());
                Err(e)
            }
        }
    }

    async fn apply_schema_change(
        &self,
        schema: SchemaDefinition,
        backfill: Vec<RawDocument>,
        cancel: &CancellationToken,
    ) -> ServiceResult<SchemaChange> {
        let name = schema.name.clone();
        let previous = self.registry.replace(&name, schema)?;
        let current = self
            .registry
            .get(&name)
            .ok_or_else(|| SchemaError::UnknownSchema(name.clone()))?;

        let Some(building) = self.lifecycle.on_schema_replaced(&previous, &current).await? else {
            return Ok(SchemaChange {
                previous,
                new_index: None,
                backfill: None,
                retired: None,
            });
        };

        let backfill = self.coordinator.ingest_into(&building, backfill, cancel).await?;
        if !backfill.cancelled.is_empty() {
            return Ok(SchemaChange {
                previous,
                new_index: Some(building),
                backfill: Some(backfill),
                retired: None,
            });
        }

        let (active, retired) = self.complete_reindex(&building).await?;
        Ok(SchemaChange {
            previous,
            new_index: Some(active),
            backfill: Some(backfill),
            retired,
        })
    }

    /// Swaps a backfilled Building index in: moves the alias to `building`
    /// and retires the current active index in one step, then deletes the
    /// old index after the configured grace period.
    ///
    /// If the swap fails the previous index stays Active and keeps
    /// serving; the call can simply be repeated.
    pub async fn complete_reindex(
        &self,
        building: &IndexDescriptor,
    ) -> ServiceResult<(IndexDescriptor, Option<IndexDescriptor>)> {
        let (active, previous) = self.lifecycle.swap_active(building).await?;

        let retired = match previous {
            Some(previous) => Some(
                self.lifecycle
                    .retire_and_delete(&previous, self.config.retire_grace_period())
                    .await?,
            ),
            None => None,
        };
        Ok((active, retired))
    }

    /// Deletes every Retiring index left over from an interrupted
    /// re-index, after the grace period.
    ///
    /// Only indexes whose schema has an Active replacement are deleted. An
    /// index that loses its replacement during the grace period is kept.
    pub async fn resume_pending_deletions(&self) -> ServiceResult<Vec<IndexDescriptor>> {
        let mut deleted = Vec::new();
        for pending in self.lifecycle.pending_deletions() {
            match self
                .lifecycle
                .retire_and_delete(&pending, self.config.retire_grace_period())
                .await
            {
                Ok(descriptor) => deleted.push(descriptor),
                Err(LifecycleError::NoActiveReplacement { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(deleted)
    }

    /// Ingests a batch into the active index of `schema_name`
    pub async fn ingest(
        &self,
        schema_name: &str,
        documents: Vec<RawDocument>,
        cancel: &CancellationToken,
    ) -> ServiceResult<BatchResult> {
        Ok(self.coordinator.ingest_batch(schema_name, documents, cancel).await?)
    }

    /// Deletes documents from the active index of `schema_name`
    pub async fn delete(
        &self,
        schema_name: &str,
        ids: Vec<String>,
        cancel: &CancellationToken,
    ) -> ServiceResult<DeleteResult> {
        Ok(self.coordinator.delete_documents(schema_name, ids, cancel).await?)
    }

    /// Normalizes without writing anything
    pub fn normalize(&self, schema_name: &str, raw: &Value) -> ServiceResult<NormalizedDocument> {
        Ok(self.normalizer.normalize(schema_name, raw)?)
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn normalizer(&self) -> &Arc<DocumentNormalizer> {
        &self.normalizer
    }

    pub fn lifecycle(&self) -> &Arc<IndexLifecycleManager> {
        &self.lifecycle
    }

    pub fn coordinator(&self) -> &IngestionCoordinator {
        &self.coordinator
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }
}
