//! Backend call errors

use thiserror::Error;

/// Result type for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Failure of one call to the search backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Backend timed out: {0}")]
    Timeout(String),

    /// The backend understood the request and refused it
    #[error("Backend rejected request: {0}")]
    Rejected(String),
}

impl BackendError {
    pub fn code(&self) -> &'static str {
        match self {
            BackendError::Unavailable(_) => "BACKEND_UNAVAILABLE",
            BackendError::Timeout(_) => "BACKEND_TIMEOUT",
            BackendError::Rejected(_) => "BACKEND_REJECTED",
        }
    }

    /// Transient failures are worth retrying; refusals are not
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Unavailable(_) | BackendError::Timeout(_))
    }
}

/// A call that failed on its last permitted attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error} (after {attempts} attempt(s))")]
pub struct RetryExhausted {
    pub error: BackendError,
    pub attempts: u32,
}
