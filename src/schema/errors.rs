//! Schema error types
//!
//! Registration is all-or-nothing: any of these leaves the registry
//! exactly as it was.

use thiserror::Error;

/// Result type for schema operations
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Schema errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Duplicate field '{path}' in schema '{schema}'")]
    DuplicateField { schema: String, path: String },

    #[error("Invalid reference at '{path}' in schema '{schema}': target '{target}' {reason}")]
    InvalidReference {
        schema: String,
        path: String,
        target: String,
        reason: String,
    },

    #[error("Schema '{0}' is already registered")]
    DuplicateSchemaName(String),

    #[error("Schema '{0}' not found")]
    UnknownSchema(String),

    #[error("Definition is named '{found}' but was submitted as '{expected}'")]
    NameMismatch { expected: String, found: String },

    #[error("Invalid schema name '{0}': use lowercase letters, digits, '_' or '-'")]
    InvalidSchemaName(String),

    #[error("Invalid field name '{name}' under '{parent}' in schema '{schema}'")]
    InvalidFieldName {
        schema: String,
        parent: String,
        name: String,
    },

    #[error("Unsupported mapping type '{type_name}' at '{path}'")]
    UnsupportedType { path: String, type_name: String },

    #[error("Schema storage error at '{path}': {reason}")]
    Storage { path: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SchemaError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::DuplicateField { .. } => "SCHEMA_DUPLICATE_FIELD",
            SchemaError::InvalidReference { .. } => "SCHEMA_INVALID_REFERENCE",
            SchemaError::DuplicateSchemaName(_) => "SCHEMA_DUPLICATE_NAME",
            SchemaError::UnknownSchema(_) => "SCHEMA_UNKNOWN",
            SchemaError::NameMismatch { .. } => "SCHEMA_NAME_MISMATCH",
            SchemaError::InvalidSchemaName(_) => "SCHEMA_INVALID_NAME",
            SchemaError::InvalidFieldName { .. } => "SCHEMA_INVALID_FIELD_NAME",
            SchemaError::UnsupportedType { .. } => "SCHEMA_UNSUPPORTED_TYPE",
            SchemaError::Storage { .. } => "SCHEMA_STORAGE",
            SchemaError::Internal(_) => "SCHEMA_INTERNAL",
        }
    }

    pub(crate) fn storage(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SchemaError::Storage {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether the definition itself was at fault, as opposed to storage
    pub fn is_definition_error(&self) -> bool {
        !matches!(self, SchemaError::Storage { .. } | SchemaError::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            SchemaError::DuplicateSchemaName("jobs".into()).code(),
            "SCHEMA_DUPLICATE_NAME"
        );
        assert_eq!(
            SchemaError::DuplicateField {
                schema: "jobs".into(),
                path: "address.cities".into()
            }
            .code(),
            "SCHEMA_DUPLICATE_FIELD"
        );
    }

    #[test]
    fn test_display_includes_path() {
        let err = SchemaError::InvalidReference {
            schema: "jobs".into(),
            path: "experiments.record".into(),
            target: "experiments.self".into(),
            reason: "does not resolve".into(),
        };
        let display = err.to_string();
        assert!(display.contains("experiments.record"));
        assert!(display.contains("experiments.self"));
    }

    #[test]
    fn test_storage_is_not_definition_error() {
        assert!(!SchemaError::storage("/tmp", "disk full").is_definition_error());
        assert!(SchemaError::UnknownSchema("x".into()).is_definition_error());
    }
}
