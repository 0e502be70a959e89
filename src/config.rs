//! Indexer configuration
//!
//! Loaded from a JSON file. Every field except `data_dir` has a default.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/searchmap",
//!   "index_prefix": "records-",
//!   "write_chunk_size": 500
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::RetryPolicy;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Read { .. } => "CONFIG_READ_FAILED",
            ConfigError::Parse(_) => "CONFIG_PARSE_FAILED",
            ConfigError::Invalid(_) => "CONFIG_INVALID",
        }
    }
}

/// Configuration for schema storage, index naming and ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Root directory for persisted schemas and the descriptor table (required)
    pub data_dir: String,

    /// Prefix for backend index identifiers and aliases
    #[serde(default = "default_index_prefix")]
    pub index_prefix: String,

    /// Documents per bulk write request
    #[serde(default = "default_write_chunk_size")]
    pub write_chunk_size: usize,

    /// Bulk write requests allowed in flight per batch
    #[serde(default = "default_write_concurrency")]
    pub write_concurrency: usize,

    /// Retries for a failed bulk write chunk
    #[serde(default = "default_write_max_retries")]
    pub write_max_retries: u32,

    /// Retries for index-administration calls
    #[serde(default = "default_admin_max_retries")]
    pub admin_max_retries: u32,

    /// First backoff delay in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on any single backoff delay
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Time an index stays Retiring before it is deleted
    #[serde(default = "default_retire_grace_period_ms")]
    pub retire_grace_period_ms: u64,
}

fn default_index_prefix() -> String {
    "records-".to_string()
}
fn default_write_chunk_size() -> usize {
    500
}
fn default_write_concurrency() -> usize {
    4
}
fn default_write_max_retries() -> u32 {
    3
}
fn default_admin_max_retries() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    100
}
fn default_retry_max_delay_ms() -> u64 {
    5000
}
fn default_retire_grace_period_ms() -> u64 {
    30_000
}

impl IndexerConfig {
    /// Create a config rooted at `data_dir` with every other value defaulted
    pub fn new(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            index_prefix: default_index_prefix(),
            write_chunk_size: default_write_chunk_size(),
            write_concurrency: default_write_concurrency(),
            write_max_retries: default_write_max_retries(),
            admin_max_retries: default_admin_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            retire_grace_period_ms: default_retire_grace_period_ms(),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: IndexerConfig = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }

    /// Reject values that would stall or misconfigure ingestion
    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }

        if self.write_chunk_size == 0 {
            return Err(ConfigError::Invalid("write_chunk_size must be > 0".into()));
        }

        if self.write_concurrency == 0 {
            return Err(ConfigError::Invalid("write_concurrency must be > 0".into()));
        }

        if self.retry_base_delay_ms > self.retry_max_delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retry_base_delay_ms ({}) exceeds retry_max_delay_ms ({})",
                self.retry_base_delay_ms, self.retry_max_delay_ms
            )));
        }

        Ok(())
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Backoff policy for bulk write chunks
    pub fn write_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.write_max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    /// Backoff policy for index-administration calls
    pub fn admin_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.admin_max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    /// Grace period for in-flight reads against a retiring index
    pub fn retire_grace_period(&self) -> Duration {
        Duration::from_millis(self.retire_grace_period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_applied() {
        let config: IndexerConfig = serde_json::from_str(r#"{"data_dir": "/tmp/x"}"#).unwrap();
        assert_eq!(config, IndexerConfig::new("/tmp/x"));
        assert_eq!(config.index_prefix, "records-");
        assert_eq!(config.write_chunk_size, 500);
        assert_eq!(config.retire_grace_period(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_data_dir_rejected() {
        let result: Result<IndexerConfig, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("searchmap.json");
        fs::write(
            &path,
            r#"{"data_dir": "/data", "write_chunk_size": 50, "write_concurrency": 2}"#,
        )
        .unwrap();

        let config = IndexerConfig::load(&path).unwrap();
        assert_eq!(config.write_chunk_size, 50);
        assert_eq!(config.write_concurrency, 2);
        assert_eq!(config.data_path(), PathBuf::from("/data"));
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = IndexerConfig::load(&temp_dir.path().join("nope.json")).unwrap_err();
        assert_eq!(err.code(), "CONFIG_READ_FAILED");
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let mut config = IndexerConfig::new("/data");
        config.write_chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = IndexerConfig::new("/data");
        config.write_concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_base_delay_above_max_rejected() {
        let mut config = IndexerConfig::new("/data");
        config.retry_base_delay_ms = 10_000;
        config.retry_max_delay_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policies() {
        let mut config = IndexerConfig::new("/data");
        config.write_max_retries = 7;
        config.admin_max_retries = 2;
        assert_eq!(config.write_retry_policy().max_retries(), 7);
        assert_eq!(config.admin_retry_policy().max_retries(), 2);
    }
}
