//! Normalization errors
//!
//! A document problem is a [`FieldViolation`]. Every violation found in one
//! pass is returned together so a caller can fix a document in one round
//! trip.

use serde::Serialize;
use thiserror::Error;

/// Result type for normalization
pub type NormalizeResult<T> = Result<T, NormalizeError>;

/// One problem with one field of a raw document
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldViolation {
    /// Field is not declared by the schema
    #[error("Unknown field '{path}'")]
    UnknownField { path: String },

    /// Scalar of the wrong kind
    #[error("Field '{path}' expected {expected}, found {actual}")]
    TypeMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Value shape cannot hold the declared field
    #[error("Field '{path}' has invalid nesting: {reason}")]
    InvalidNesting { path: String, reason: String },
}

impl FieldViolation {
    /// Path of the offending field (`[i]` marks array elements)
    pub fn path(&self) -> &str {
        match self {
            FieldViolation::UnknownField { path }
            | FieldViolation::TypeMismatch { path, .. }
            | FieldViolation::InvalidNesting { path, .. } => path,
        }
    }

    /// Stable violation code
    pub fn code(&self) -> &'static str {
        match self {
            FieldViolation::UnknownField { .. } => "UNKNOWN_FIELD",
            FieldViolation::TypeMismatch { .. } => "TYPE_MISMATCH",
            FieldViolation::InvalidNesting { .. } => "INVALID_NESTING",
        }
    }
}

/// Normalization failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("Unknown schema '{0}'")]
    UnknownSchema(String),

    #[error("Document has {} field violation(s)", .0.len())]
    Violations(Vec<FieldViolation>),

    /// Built-in enrichment pattern failed to compile
    #[error("Invalid enrichment pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl NormalizeError {
    pub fn code(&self) -> &'static str {
        match self {
            NormalizeError::UnknownSchema(_) => "NORMALIZE_UNKNOWN_SCHEMA",
            NormalizeError::Violations(_) => "NORMALIZE_VIOLATIONS",
            NormalizeError::InvalidPattern { .. } => "NORMALIZE_INVALID_PATTERN",
        }
    }

    /// Violations carried by this error; empty for every other kind
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            NormalizeError::Violations(violations) => violations,
            NormalizeError::UnknownSchema(_) | NormalizeError::InvalidPattern { .. } => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_accessors() {
        let v = FieldViolation::TypeMismatch {
            path: "control_number".into(),
            expected: "integer".into(),
            actual: "string".into(),
        };
        assert_eq!(v.path(), "control_number");
        assert_eq!(v.code(), "TYPE_MISMATCH");
        assert_eq!(v.to_string(), "Field 'control_number' expected integer, found string");
    }

    #[test]
    fn test_violation_serializes_with_kind() {
        let v = FieldViolation::UnknownField { path: "foo".into() };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "unknown_field", "path": "foo"}));
    }

    #[test]
    fn test_error_message_counts_violations() {
        let err = NormalizeError::Violations(vec![
            FieldViolation::UnknownField { path: "a".into() },
            FieldViolation::UnknownField { path: "b".into() },
        ]);
        assert_eq!(err.to_string(), "Document has 2 field violation(s)");
        assert_eq!(err.violations().len(), 2);
        assert!(NormalizeError::UnknownSchema("x".into()).violations().is_empty());
    }
}
