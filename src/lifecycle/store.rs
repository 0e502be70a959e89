//! Durable descriptor table at `<data_dir>/indexes.json`
//!
//! The whole table is rewritten atomically on every change. Deleted
//! descriptors stay in the table, and `reserved` records the highest
//! version ever handed out per schema, so versions are never reused even
//! when index creation failed before a descriptor existed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::durable::write_atomic;

use super::descriptor::IndexDescriptor;
use super::errors::{LifecycleError, LifecycleResult};

const TABLE_FILE_NAME: &str = "indexes.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DescriptorTable {
    pub descriptors: Vec<IndexDescriptor>,
    /// Highest version reserved per schema name
    #[serde(default)]
    pub reserved: BTreeMap<String, u32>,
}

impl DescriptorTable {
    /// Claims the next unused version for `schema_name`
    pub fn reserve_version(&mut self, schema_name: &str) -> u32 {
        let used = self
            .descriptors
            .iter()
            .filter(|d| d.schema_name == schema_name)
            .map(|d| d.version)
            .max()
            .unwrap_or(0);
        let reserved = self.reserved.get(schema_name).copied().unwrap_or(0);
        let version = used.max(reserved) + 1;
        self.reserved.insert(schema_name.to_string(), version);
        version
    }
}

/// Reads and writes the descriptor table
#[derive(Debug, Clone)]
pub struct DescriptorStore {
    path: PathBuf,
}

impl DescriptorStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(TABLE_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the table. A missing file is an empty table.
    pub(crate) fn load(&self) -> LifecycleResult<DescriptorTable> {
        if !self.path.exists() {
            return Ok(DescriptorTable::default());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| self.error(format!("Failed to read descriptor table: {}", e)))?;
        let table: DescriptorTable = serde_json::from_str(&content)
            .map_err(|e| self.error(format!("Invalid descriptor table: {}", e)))?;

        Ok(table)
    }

    pub(crate) fn save(&self, table: &DescriptorTable) -> LifecycleResult<()> {
        let content = serde_json::to_vec_pretty(table)
            .map_err(|e| self.error(format!("Failed to serialize descriptor table: {}", e)))?;

        write_atomic(&self.path, &content)
            .map_err(|e| self.error(format!("Failed to write descriptor table: {}", e)))
    }

    fn error(&self, reason: String) -> LifecycleError {
        LifecycleError::storage(self.path.display().to_string(), reason)
    }
}
