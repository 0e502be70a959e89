//! Service-level errors

use thiserror::Error;

use crate::config::ConfigError;
use crate::ingest::IngestError;
use crate::lifecycle::LifecycleError;
use crate::normalizer::NormalizeError;
use crate::schema::SchemaError;

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Any failure surfaced by the service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl ServiceError {
    /// Code of the underlying error
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Config(e) => e.code(),
            ServiceError::Schema(e) => e.code(),
            ServiceError::Normalize(e) => e.code(),
            ServiceError::Lifecycle(e) => e.code(),
            ServiceError::Ingest(e) => e.code(),
        }
    }
}
