//! Structural validation of schema definitions
//!
//! Checked, in walk order:
//! - schema name is a valid backend index stem
//! - field names are non-empty and contain no '.'
//! - names are unique within one nesting level
//! - `copy_to` sits on a primitive and targets a primitive of the same
//!   kind in the same schema
//! - reference targets resolve to an object or primitive field, in this
//!   schema or in another one of the candidate set
//!
//! The whole tree is known before any check runs, so forward references
//! within a schema are fine.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::errors::{SchemaError, SchemaResult};
use super::types::{join_path, FieldSpec, FieldType, Fields, SchemaDefinition};

/// Validates definitions against a candidate set of schemas: everything
/// registered plus whatever is being registered or replaced.
pub struct SchemaValidator<'a> {
    candidates: &'a HashMap<String, Arc<SchemaDefinition>>,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(candidates: &'a HashMap<String, Arc<SchemaDefinition>>) -> Self {
        Self { candidates }
    }

    /// Validates one definition.
    pub fn validate(&self, schema: &SchemaDefinition) -> SchemaResult<()> {
        validate_schema_name(&schema.name)?;
        self.validate_level(schema, &schema.fields, "")?;
        self.validate_copy_directives(schema)?;
        self.validate_references(schema)?;
        Ok(())
    }

    /// Validates every candidate, in name order so the reported error is
    /// deterministic.
    pub fn validate_all(&self) -> SchemaResult<()> {
        let mut names: Vec<&String> = self.candidates.keys().collect();
        names.sort();
        for name in names {
            self.validate(&self.candidates[name])?;
        }
        Ok(())
    }

    fn validate_level(&self, schema: &SchemaDefinition, fields: &Fields, parent: &str) -> SchemaResult<()> {
        let mut seen = HashSet::new();

        for (name, spec) in fields.iter() {
            if name.is_empty() || name.contains('.') {
                return Err(SchemaError::InvalidFieldName {
                    schema: schema.name.clone(),
                    parent: display_parent(parent),
                    name: name.to_string(),
                });
            }

            let path = join_path(parent, name);
            if !seen.insert(name) {
                return Err(SchemaError::DuplicateField {
                    schema: schema.name.clone(),
                    path,
                });
            }

            if let FieldType::Object(children) = &spec.field_type {
                self.validate_level(schema, children, &path)?;
            }
        }

        Ok(())
    }

    fn validate_copy_directives(&self, schema: &SchemaDefinition) -> SchemaResult<()> {
        for (source, target) in schema.copy_directives() {
            let invalid = |reason: &str| SchemaError::InvalidReference {
                schema: schema.name.clone(),
                path: source.clone(),
                target: target.clone(),
                reason: reason.to_string(),
            };

            let source_kind = schema
                .field_at(&source)
                .and_then(FieldSpec::primitive_kind)
                .ok_or_else(|| invalid("is declared on a non-primitive field"))?;

            if source == target {
                return Err(invalid("copies onto itself"));
            }

            let target_spec = schema
                .field_at(&target)
                .ok_or_else(|| invalid("does not exist in this schema"))?;

            match target_spec.primitive_kind() {
                Some(kind) if kind == source_kind => {}
                Some(_) => return Err(invalid("has a different primitive kind")),
                None => return Err(invalid("is not a primitive field")),
            }
        }

        Ok(())
    }

    fn validate_references(&self, schema: &SchemaDefinition) -> SchemaResult<()> {
        for (path, target) in schema.references() {
            let resolved = self.resolve(schema, &target).ok_or_else(|| {
                SchemaError::InvalidReference {
                    schema: schema.name.clone(),
                    path: path.clone(),
                    target: target.clone(),
                    reason: "does not resolve to a declared field".into(),
                }
            })?;

            if let FieldType::Reference { .. } = resolved.field_type {
                return Err(SchemaError::InvalidReference {
                    schema: schema.name.clone(),
                    path,
                    target,
                    reason: "points at another reference".into(),
                });
            }
        }

        Ok(())
    }

    /// Own schema first, then `<schema>.<path>`.
    fn resolve<'s>(&'s self, schema: &'s SchemaDefinition, target: &str) -> Option<&'s FieldSpec> {
        if let Some(spec) = schema.field_at(target) {
            return Some(spec);
        }

        let (schema_name, rest) = target.split_once('.')?;
        if schema_name == schema.name {
            return schema.field_at(rest);
        }
        self.candidates.get(schema_name)?.field_at(rest)
    }
}

/// Schema names become backend index identifiers: lowercase ASCII letters,
/// digits, '_' and '-', not starting with '_' or '-'.
pub fn validate_schema_name(name: &str) -> SchemaResult<()> {
    let valid_char = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-';
    let valid_start = name
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_lowercase() || c.is_ascii_digit());

    if !valid_start || !name.chars().all(valid_char) {
        return Err(SchemaError::InvalidSchemaName(name.to_string()));
    }
    Ok(())
}

fn display_parent(parent: &str) -> String {
    if parent.is_empty() {
        "$root".to_string()
    } else {
        parent.to_string()
    }
}
