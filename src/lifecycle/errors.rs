//! Index lifecycle errors

use thiserror::Error;

use super::descriptor::IndexState;

/// Result type for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Another descriptor of the same schema is Active; retire it first
    #[error("Schema '{schema}' already has active index '{active}'")]
    AlreadyActive { schema: String, active: String },

    #[error("Schema '{0}' has no active index")]
    NoActiveIndex(String),

    /// Admin call still failing after every retry
    #[error("Backend unavailable for '{index_id}' after {attempts} attempt(s): {reason}")]
    BackendUnavailable {
        index_id: String,
        attempts: u32,
        reason: String,
    },

    /// Admin call refused outright; not retried
    #[error("Backend rejected admin call for '{index_id}': {reason}")]
    BackendRejected { index_id: String, reason: String },

    #[error("Invalid transition for '{index_id}': {from} -> {to}")]
    InvalidTransition {
        index_id: String,
        from: IndexState,
        to: IndexState,
    },

    /// Deleting this Retiring index would leave the schema with nothing serving
    #[error("Index '{index_id}' is the last serving index of '{schema}' and was not deleted")]
    NoActiveReplacement { schema: String, index_id: String },

    #[error("Unknown index '{0}'")]
    UnknownIndex(String),

    #[error("Descriptor storage error at '{path}': {reason}")]
    Storage { path: String, reason: String },

    #[error("Internal lifecycle error: {0}")]
    Internal(String),
}

impl LifecycleError {
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::AlreadyActive { .. } => "LIFECYCLE_ALREADY_ACTIVE",
            LifecycleError::NoActiveIndex(_) => "LIFECYCLE_NO_ACTIVE_INDEX",
            LifecycleError::BackendUnavailable { .. } => "LIFECYCLE_BACKEND_UNAVAILABLE",
            LifecycleError::BackendRejected { .. } => "LIFECYCLE_BACKEND_REJECTED",
            LifecycleError::InvalidTransition { .. } => "LIFECYCLE_INVALID_TRANSITION",
            LifecycleError::NoActiveReplacement { .. } => "LIFECYCLE_NO_ACTIVE_REPLACEMENT",
            LifecycleError::UnknownIndex(_) => "LIFECYCLE_UNKNOWN_INDEX",
            LifecycleError::Storage { .. } => "LIFECYCLE_STORAGE",
            LifecycleError::Internal(_) => "LIFECYCLE_INTERNAL",
        }
    }

    /// Failures of the environment rather than of the caller's request.
    ///
    /// Misuse (`AlreadyActive`, `InvalidTransition`, ...) is never fatal; the
    /// caller fixes the call instead.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LifecycleError::BackendUnavailable { .. }
                | LifecycleError::BackendRejected { .. }
                | LifecycleError::Storage { .. }
                | LifecycleError::Internal(_)
        )
    }

    pub(crate) fn storage(path: impl Into<String>, reason: impl Into<String>) -> Self {
        LifecycleError::Storage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn poisoned(what: &str) -> Self {
        LifecycleError::Internal(format!("{} lock poisoned", what))
    }
}
