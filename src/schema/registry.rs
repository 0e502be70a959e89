//! Schema registry
//!
//! Holds the current definition per schema name.
//!
//! - `get` returns an `Arc` snapshot and only takes the map's read lock for
//!   the lookup, so readers never wait on validation or file writes.
//! - `register` and `replace` are serialized by one writer mutex. Reference
//!   validation spans schemas, so writers must see each other's results.
//! - A mutation validates the complete candidate set and persists the file
//!   before publishing. Any failure leaves the registry unchanged.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

use super::errors::{SchemaError, SchemaResult};
use super::loader::SchemaStore;
use super::types::SchemaDefinition;
use super::validator::SchemaValidator;

type SchemaMap = HashMap<String, Arc<SchemaDefinition>>;

/// Registry of named schema definitions.
#[derive(Debug)]
pub struct SchemaRegistry {
    schemas: RwLock<SchemaMap>,
    writer: Mutex<()>,
    store: Option<SchemaStore>,
    metrics: Arc<MetricsRegistry>,
}

impl SchemaRegistry {
    /// Registry with no persistence
    pub fn in_memory(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
            writer: Mutex::new(()),
            store: None,
            metrics,
        }
    }

    /// Opens a registry over `store`, loading and validating every
    /// persisted schema as one set.
    pub fn open(store: SchemaStore, metrics: Arc<MetricsRegistry>) -> SchemaResult<Self> {
        let mut schemas = SchemaMap::new();
        for schema in store.load_all()? {
            let name = schema.name.clone();
            if schemas.insert(name.clone(), Arc::new(schema)).is_some() {
                return Err(SchemaError::DuplicateSchemaName(name));
            }
        }

        SchemaValidator::new(&schemas).validate_all()?;

        let count = schemas.len().to_string();
        log_event_with_fields(
            Event::SchemasLoaded,
            &[
                ("count", count.as_str()),
                ("dir", &store.schema_dir().display().to_string()),
            ],
        );

        Ok(Self {
            schemas: RwLock::new(schemas),
            writer: Mutex::new(()),
            store: Some(store),
            metrics,
        })
    }

    /// Registers a new schema.
    ///
    /// # Errors
    ///
    /// - `DuplicateSchemaName` if the name is taken (use `replace`)
    /// - `DuplicateField`, `InvalidReference`, `InvalidFieldName`,
    ///   `InvalidSchemaName` for structural problems
    /// - `Storage` if the definition cannot be persisted
    pub fn register(&self, schema: SchemaDefinition) -> SchemaResult<()> {
        let name = schema.name.clone();
        let result = self.register_inner(schema);
        self.record_outcome(&name, &result, Event::SchemaRegistered);
        result
    }

    fn register_inner(&self, schema: SchemaDefinition) -> SchemaResult<()> {
        let _writer = self.lock_writer()?;

        let mut candidates = self.snapshot()?;
        if candidates.contains_key(&schema.name) {
            return Err(SchemaError::DuplicateSchemaName(schema.name));
        }

        let schema = Arc::new(schema);
        candidates.insert(schema.name.clone(), Arc::clone(&schema));
        SchemaValidator::new(&candidates).validate(&schema)?;

        self.commit(schema)
    }

    /// Replaces an existing schema wholesale and returns the previous
    /// definition so callers can compare shapes.
    ///
    /// Every registered schema is re-validated against the replacement, so
    /// removing a field another schema references is refused.
    pub fn replace(&self, name: &str, schema: SchemaDefinition) -> SchemaResult<Arc<SchemaDefinition>> {
        let result = self.replace_inner(name, schema);
        self.record_outcome(name, &result, Event::SchemaReplaced);
        result
    }

    fn replace_inner(&self, name: &str, schema: SchemaDefinition) -> SchemaResult<Arc<SchemaDefinition>> {
        if schema.name != name {
            return Err(SchemaError::NameMismatch {
                expected: name.to_string(),
                found: schema.name,
            });
        }

        let _writer = self.lock_writer()?;

        let mut candidates = self.snapshot()?;
        let schema = Arc::new(schema);
        let previous = candidates
            .insert(name.to_string(), Arc::clone(&schema))
            .ok_or_else(|| SchemaError::UnknownSchema(name.to_string()))?;

        SchemaValidator::new(&candidates).validate_all()?;

        self.commit(schema)?;
        Ok(previous)
    }

    /// Persist, then publish. Caller holds the writer lock.
    fn commit(&self, schema: Arc<SchemaDefinition>) -> SchemaResult<()> {
        if let Some(store) = &self.store {
            store.save(&schema)?;
        }

        let mut schemas = self
            .schemas
            .write()
            .map_err(|_| SchemaError::Internal("schema map lock poisoned".into()))?;
        schemas.insert(schema.name.clone(), schema);
        Ok(())
    }

    fn record_outcome<T>(&self, name: &str, result: &SchemaResult<T>, success: Event) {
        match result {
            Ok(_) => {
                if success == Event::SchemaReplaced {
                    self.metrics.increment_schemas_replaced();
                } else {
                    self.metrics.increment_schemas_registered();
                }
                log_event_with_fields(success, &[("schema", name)]);
            }
            Err(e) => {
                self.metrics.increment_schemas_rejected();
                log_event_with_fields(
                    Event::SchemaRejected,
                    &[("schema", name), ("code", e.code()), ("reason", &e.to_string())],
                );
            }
        }
    }

    /// Gets the current definition for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<SchemaDefinition>> {
        self.schemas.read().ok()?.get(name).cloned()
    }

    /// Checks if a schema exists.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .schemas
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    /// Returns the number of registered schemas.
    pub fn len(&self) -> usize {
        self.schemas.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> SchemaResult<SchemaMap> {
        self.schemas
            .read()
            .map(|m| m.clone())
            .map_err(|_| SchemaError::Internal("schema map lock poisoned".into()))
    }

    fn lock_writer(&self) -> SchemaResult<std::sync::MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| SchemaError::Internal("schema writer lock poisoned".into()))
    }
}
