//! Normalized document and dot-path access helpers

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::join_path;

/// A document that satisfies its schema's field tree.
///
/// Only produced by the normalizer. The body is always a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedDocument {
    schema_name: String,
    body: Value,
}

impl NormalizedDocument {
    pub(crate) fn new(schema_name: &str, body: Map<String, Value>) -> Self {
        Self {
            schema_name: schema_name.to_string(),
            body: Value::Object(body),
        }
    }

    /// Name of the schema this document conforms to
    pub fn schema_name(&self) -> &str {
        &self.schema_name
    }

    /// Values at a dot path, flattened through arrays
    pub fn get(&self, path: &str) -> Vec<&Value> {
        values_at(&self.body, path)
    }

    /// Every leaf value keyed by its dot path
    pub fn flatten(&self) -> BTreeMap<String, Vec<Value>> {
        let mut leaves = BTreeMap::new();
        collect_leaves(&self.body, "", &mut leaves);
        leaves
    }

    pub fn as_value(&self) -> &Value {
        &self.body
    }

    pub fn into_value(self) -> Value {
        self.body
    }
}

fn collect_leaves(value: &Value, path: &str, leaves: &mut BTreeMap<String, Vec<Value>>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect_leaves(child, &join_path(path, key), leaves);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_leaves(item, path, leaves);
            }
        }
        scalar => leaves
            .entry(path.to_string())
            .or_default()
            .push(scalar.clone()),
    }
}

/// Values reachable at `path` below `root`.
///
/// Arrays are transparent at every step, so `related_records.relation`
/// yields one entry per element of `related_records`.
pub(crate) fn values_at<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![root];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            descend(value, segment, &mut next);
        }
        current = next;
    }
    current.into_iter().flat_map(flatten_array).collect()
}

fn descend<'a>(value: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(segment) {
                if !child.is_null() {
                    out.push(child);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                descend(item, segment, out);
            }
        }
        _ => {}
    }
}

fn flatten_array(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().flat_map(flatten_array).collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

/// Absent, null, empty string and empty array all count as empty
pub(crate) fn is_empty_value(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}
