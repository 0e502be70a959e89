//! Schema registry subsystem
//!
//! Schemas declare the field tree of one record category. They are
//! validated on registration, persisted one file per name, and replaced
//! wholesale, never edited in place.
//!
//! # Rules
//!
//! - Field names unique per nesting level
//! - `copy_to` and reference targets must resolve at registration time
//! - Schema names unique for the registry's lifetime
//! - No type auto-detection: every stored field is declared

pub mod builtin;
mod errors;
mod loader;
mod mapping;
mod registry;
mod types;
mod validator;

pub use errors::{SchemaError, SchemaResult};
pub use loader::SchemaStore;
pub use mapping::{fingerprint, from_admin_mapping, requires_new_index, to_admin_mapping};
pub use registry::SchemaRegistry;
pub use types::{join_path, FieldSpec, FieldType, Fields, PrimitiveKind, SchemaDefinition};
pub use validator::{validate_schema_name, SchemaValidator};

pub(crate) use mapping::json_type_name;
