//! Document normalizer
//!
//! Walks a raw JSON document alongside the schema's field tree.
//!
//! - Every declared field is optional; `null` counts as absent
//! - Any field may hold one value or an array of values of its shape
//! - Arrays of arrays are refused
//! - No coercion: `"42"` is not an integer
//! - Undeclared fields are refused; the schema is the only source of types
//!
//! Validation collects every violation. Only a clean document gets its
//! derived fields (`copy_to`, recids) filled in.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::schema::{join_path, json_type_name, FieldSpec, FieldType, Fields, SchemaDefinition, SchemaRegistry};

use super::document::NormalizedDocument;
use super::enrich::{apply_copy_directives, RecidExtractor};
use super::errors::{FieldViolation, NormalizeError, NormalizeResult};

/// Maps raw documents onto registered schemas.
///
/// Holds no per-document state; one normalizer can serve any number of
/// concurrent callers.
#[derive(Debug)]
pub struct DocumentNormalizer {
    registry: Arc<SchemaRegistry>,
    recids: RecidExtractor,
}

impl DocumentNormalizer {
    /// Fails with `InvalidPattern` if the recid pattern does not compile;
    /// enrichment is never silently switched off.
    pub fn new(registry: Arc<SchemaRegistry>) -> NormalizeResult<Self> {
        Ok(Self {
            registry,
            recids: RecidExtractor::new()?,
        })
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Normalizes `raw` against the current definition of `schema_name`.
    ///
    /// # Errors
    ///
    /// - `UnknownSchema` if no schema has that name
    /// - `Violations` with every problem found in the document
    pub fn normalize(&self, schema_name: &str, raw: &Value) -> NormalizeResult<NormalizedDocument> {
        let schema = self
            .registry
            .get(schema_name)
            .ok_or_else(|| NormalizeError::UnknownSchema(schema_name.to_string()))?;
        self.normalize_with(&schema, raw)
    }

    /// Normalizes against an explicit definition, e.g. the one a target
    /// index was created from.
    pub fn normalize_with(&self, schema: &SchemaDefinition, raw: &Value) -> NormalizeResult<NormalizedDocument> {
        let root = match raw {
            Value::Object(map) => map,
            other => {
                return Err(NormalizeError::Violations(vec![FieldViolation::InvalidNesting {
                    path: "$root".into(),
                    reason: format!("document must be an object, found {}", json_type_name(other)),
                }]));
            }
        };

        let mut walk = Walk::default();
        let mut body = walk.object(&schema.fields, root, "");
        if !walk.violations.is_empty() {
            return Err(NormalizeError::Violations(walk.violations));
        }

        self.recids.enrich(&schema.fields, &mut body);
        apply_copy_directives(schema, &mut body);

        Ok(NormalizedDocument::new(&schema.name, body))
    }
}

/// One validation pass; accumulates violations
#[derive(Default)]
struct Walk {
    violations: Vec<FieldViolation>,
}

impl Walk {
    fn object(&mut self, fields: &Fields, raw: &Map<String, Value>, prefix: &str) -> Map<String, Value> {
        let mut out = Map::new();
        for (name, value) in raw {
            let path = join_path(prefix, name);
            let Some(spec) = fields.get(name) else {
                self.violations.push(FieldViolation::UnknownField { path });
                continue;
            };
            if value.is_null() {
                continue;
            }
            if let Some(normalized) = self.field(spec, value, &path) {
                out.insert(name.clone(), normalized);
            }
        }
        out
    }

    fn field(&mut self, spec: &FieldSpec, value: &Value, path: &str) -> Option<Value> {
        let Value::Array(items) = value else {
            return self.single(spec, value, path);
        };

        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let item_path = format!("{}[{}]", path, i);
            match item {
                Value::Null => {}
                Value::Array(_) => self.violations.push(FieldViolation::InvalidNesting {
                    path: item_path,
                    reason: "nested arrays are not supported".into(),
                }),
                _ => out.extend(self.single(spec, item, &item_path)),
            }
        }
        Some(Value::Array(out))
    }

    fn single(&mut self, spec: &FieldSpec, value: &Value, path: &str) -> Option<Value> {
        match &spec.field_type {
            FieldType::Primitive(kind) => {
                if kind.accepts(value) {
                    Some(value.clone())
                } else {
                    self.violations.push(FieldViolation::TypeMismatch {
                        path: path.to_string(),
                        expected: kind.type_name().to_string(),
                        actual: json_type_name(value).to_string(),
                    });
                    None
                }
            }
            FieldType::Object(children) => {
                let map = self.expect_object(value, path)?;
                Some(Value::Object(self.object(children, map, path)))
            }
            FieldType::Reference { .. } => {
                let map = self.expect_object(value, path)?;
                self.reference(map, path)
            }
        }
    }

    fn expect_object<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            other => {
                self.violations.push(FieldViolation::InvalidNesting {
                    path: path.to_string(),
                    reason: format!("expected object, found {}", json_type_name(other)),
                });
                None
            }
        }
    }

    /// A reference is exactly `{"$ref": "<uri>"}`
    fn reference(&mut self, map: &Map<String, Value>, path: &str) -> Option<Value> {
        let mut uri = None;
        for (key, value) in map {
            let key_path = join_path(path, key);
            match (key.as_str(), value) {
                ("$ref", Value::String(s)) => uri = Some(s.clone()),
                ("$ref", Value::Null) => {}
                ("$ref", other) => self.violations.push(FieldViolation::TypeMismatch {
                    path: key_path,
                    expected: "string".into(),
                    actual: json_type_name(other).into(),
                }),
                _ => self.violations.push(FieldViolation::UnknownField { path: key_path }),
            }
        }

        match uri {
            Some(uri) => {
                let mut link = Map::new();
                link.insert("$ref".into(), Value::String(uri));
                Some(Value::Object(link))
            }
            None => {
                if !map.contains_key("$ref") {
                    self.violations.push(FieldViolation::InvalidNesting {
                        path: path.to_string(),
                        reason: "reference requires a '$ref' string".into(),
                    });
                }
                None
            }
        }
    }
}
