//! Derived fields filled in after a document passes validation
//!
//! - `copy_to`: a source field's values are copied into an empty target
//! - recids: a `{"$ref": ".../<n>"}` object fills its integer sibling
//!
//! Both only ever write into empty fields, so running them twice is a
//! no-op.

use regex::Regex;
use serde_json::{Map, Value};

use crate::schema::{FieldSpec, FieldType, Fields, PrimitiveKind, SchemaDefinition};

use super::document::{is_empty_value, values_at};
use super::errors::{NormalizeError, NormalizeResult};

const RECID_PATTERN: &str = r"(\d+)/?$";

/// Applies every `copy_to` directive of `schema` until nothing changes.
///
/// Directives are re-run so that chains (`a` → `b` → `c`) settle in one
/// normalization regardless of declaration order. Each write fills an
/// empty target, so the loop ends after at most one write per directive.
pub(crate) fn apply_copy_directives(schema: &SchemaDefinition, body: &mut Map<String, Value>) {
    let directives = schema.copy_directives();
    loop {
        let mut changed = false;
        for (source, target) in &directives {
            changed |= copy_values(body, source, target);
        }
        if !changed {
            break;
        }
    }
}

fn copy_values(body: &mut Map<String, Value>, source: &str, target: &str) -> bool {
    let root = Value::Object(std::mem::take(body));
    let mut values: Vec<Value> = values_at(&root, source)
        .into_iter()
        .filter(|v| !is_empty_value(Some(v)))
        .cloned()
        .collect();
    let target_empty = values_at(&root, target)
        .into_iter()
        .all(|v| is_empty_value(Some(v)));
    if let Value::Object(map) = root {
        *body = map;
    }

    if values.is_empty() || !target_empty {
        return false;
    }

    let value = match values.len() {
        1 => values.swap_remove(0),
        _ => Value::Array(values),
    };
    place(body, target, value)
}

/// Writes `value` at `path`, creating intermediate objects. Refuses to
/// overwrite a non-empty value or to descend through arrays or scalars.
fn place(root: &mut Map<String, Value>, path: &str, value: Value) -> bool {
    let mut segments: Vec<&str> = path.split('.').collect();
    let leaf = match segments.pop() {
        Some(leaf) => leaf,
        None => return false,
    };

    let mut current = root;
    for segment in segments {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return false,
        };
    }

    if !is_empty_value(current.get(leaf)) {
        return false;
    }
    current.insert(leaf.to_string(), value);
    true
}

/// Pulls record ids out of `$ref` URIs and stores them beside the link.
#[derive(Debug, Clone)]
pub(crate) struct RecidExtractor {
    pattern: Regex,
}

impl RecidExtractor {
    pub(crate) fn new() -> NormalizeResult<Self> {
        Self::with_pattern(RECID_PATTERN)
    }

    /// `pattern` must capture the record id as its first group
    pub(crate) fn with_pattern(pattern: &str) -> NormalizeResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| NormalizeError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { pattern })
    }

    /// Trailing integer of `http://host/api/experiments/1108541`
    pub(crate) fn recid(&self, uri: &str) -> Option<i64> {
        let captures = self.pattern.captures(uri)?;
        captures.get(1)?.as_str().parse().ok()
    }

    pub(crate) fn enrich(&self, fields: &Fields, object: &mut Map<String, Value>) {
        for (name, spec) in fields.iter() {
            if carries_ref(spec) {
                self.fill_sibling(fields, object, name);
            }

            if let Some(children) = spec.children() {
                match object.get_mut(name) {
                    Some(Value::Object(child)) => self.enrich(children, child),
                    Some(Value::Array(items)) => {
                        for item in items {
                            if let Value::Object(child) = item {
                                self.enrich(children, child);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn fill_sibling(&self, fields: &Fields, object: &mut Map<String, Value>, name: &str) {
        let recid = object
            .get(name)
            .and_then(|link| link.get("$ref"))
            .and_then(Value::as_str)
            .and_then(|uri| self.recid(uri));
        let Some(recid) = recid else {
            return;
        };

        let sibling = recid_field_name(name);
        let declared_integer =
            fields.get(&sibling).and_then(FieldSpec::primitive_kind) == Some(PrimitiveKind::Integer);
        if declared_integer && is_empty_value(object.get(&sibling)) {
            object.insert(sibling, Value::from(recid));
        }
    }
}

fn carries_ref(spec: &FieldSpec) -> bool {
    match &spec.field_type {
        FieldType::Reference { .. } => true,
        FieldType::Object(children) => children.contains("$ref"),
        FieldType::Primitive(_) => false,
    }
}

/// `record` → `recid`, `self` → `self_recid`, `new_record` → `new_recid`
pub(crate) fn recid_field_name(name: &str) -> String {
    let stem = name.replace("record", "");
    let stem = stem.trim_end_matches('_');
    format!("{}_recid", stem).trim_start_matches('_').to_string()
}
