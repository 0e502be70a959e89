//! On-disk schema store
//!
//! - One file per schema name: `<data_dir>/schemas/<name>.json`
//! - File content is the native definition, pretty-printed
//! - Replacing a schema rewrites its file atomically
//! - A file whose stem differs from the definition name is malformed

use std::fs;
use std::path::{Path, PathBuf};

use crate::durable::write_atomic;

use super::errors::{SchemaError, SchemaResult};
use super::types::SchemaDefinition;

/// Reads and writes persisted schema definitions.
#[derive(Debug, Clone)]
pub struct SchemaStore {
    schema_dir: PathBuf,
}

impl SchemaStore {
    /// Creates a store for the given data directory.
    ///
    /// Schema files live under `<data_dir>/schemas/`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            schema_dir: data_dir.join("schemas"),
        }
    }

    /// Returns the schema directory path.
    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Path of the file holding `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.schema_dir.join(format!("{}.json", name))
    }

    /// Loads every schema file, ordered by file name.
    ///
    /// A missing directory means no schemas yet.
    pub fn load_all(&self) -> SchemaResult<Vec<SchemaDefinition>> {
        if !self.schema_dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.schema_dir).map_err(|e| {
            SchemaError::storage(
                self.schema_dir.display().to_string(),
                format!("Failed to read schema directory: {}", e),
            )
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                SchemaError::storage(
                    self.schema_dir.display().to_string(),
                    format!("Failed to read directory entry: {}", e),
                )
            })?;

            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        paths.iter().map(|path| self.load_file(path)).collect()
    }

    fn load_file(&self, path: &Path) -> SchemaResult<SchemaDefinition> {
        let content = fs::read_to_string(path).map_err(|e| {
            SchemaError::storage(path.display().to_string(), format!("Failed to read file: {}", e))
        })?;

        let schema: SchemaDefinition = serde_json::from_str(&content).map_err(|e| {
            SchemaError::storage(path.display().to_string(), format!("Invalid JSON: {}", e))
        })?;

        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem != schema.name {
            return Err(SchemaError::storage(
                path.display().to_string(),
                format!("file holds schema '{}'", schema.name),
            ));
        }

        Ok(schema)
    }

    /// Writes `schema` to its file, replacing any previous version.
    pub fn save(&self, schema: &SchemaDefinition) -> SchemaResult<PathBuf> {
        let path = self.path_for(&schema.name);

        let content = serde_json::to_string_pretty(schema).map_err(|e| {
            SchemaError::storage(
                path.display().to_string(),
                format!("Failed to serialize schema: {}", e),
            )
        })?;

        write_atomic(&path, content.as_bytes()).map_err(|e| {
            SchemaError::storage(path.display().to_string(), format!("Failed to write file: {}", e))
        })?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{FieldSpec, Fields};
    use tempfile::TempDir;

    fn sample_schema(name: &str) -> SchemaDefinition {
        SchemaDefinition::new(
            name,
            Fields::new()
                .with("position", FieldSpec::string())
                .with("deleted", FieldSpec::boolean()),
        )
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = SchemaStore::new(temp_dir.path());

        store.save(&sample_schema("jobs")).unwrap();
        store.save(&sample_schema("experiments")).unwrap();

        let loaded = SchemaStore::new(temp_dir.path()).load_all().unwrap();
        let names: Vec<_> = loaded.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["experiments", "jobs"]);
        assert_eq!(loaded[1], sample_schema("jobs"));
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = SchemaStore::new(temp_dir.path());

        store.save(&sample_schema("jobs")).unwrap();
        let replacement =
            SchemaDefinition::new("jobs", Fields::new().with("status", FieldSpec::string()));
        store.save(&replacement).unwrap();

        assert_eq!(store.load_all().unwrap(), vec![replacement]);
    }

    #[test]
    fn test_load_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = SchemaStore::new(&temp_dir.path().join("nothing"));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_non_json_files_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let store = SchemaStore::new(temp_dir.path());
        fs::create_dir_all(store.schema_dir()).unwrap();
        fs::write(store.schema_dir().join("README"), "notes").unwrap();

        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_malformed_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = SchemaStore::new(temp_dir.path());
        fs::create_dir_all(store.schema_dir()).unwrap();
        fs::write(store.path_for("jobs"), "{not json").unwrap();

        let err = store.load_all().unwrap_err();
        assert_eq!(err.code(), "SCHEMA_STORAGE");
    }

    #[test]
    fn test_name_must_match_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = SchemaStore::new(temp_dir.path());
        fs::create_dir_all(store.schema_dir()).unwrap();
        let content = serde_json::to_string(&sample_schema("jobs")).unwrap();
        fs::write(store.path_for("experiments"), content).unwrap();

        assert!(store.load_all().is_err());
    }
}
