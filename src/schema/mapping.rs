//! Translation between schema definitions and the backend's structural
//! mapping format.
//!
//! ```json
//! {
//!   "date_detection": false,
//!   "numeric_detection": false,
//!   "properties": {
//!     "address": {"properties": {"cities": {"type": "string"}}},
//!     "legacy_name": {"type": "string", "copy_to": "experimentautocomplete"},
//!     "record": {"properties": {"$ref": {"type": "string"}}}
//!   }
//! }
//! ```
//!
//! Nesting, primitive kinds and `copy_to` are carried over literally.
//! References have no backend type of their own and become the object the
//! backend actually stores, `{"$ref": <string>}`.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::errors::{SchemaError, SchemaResult};
use super::types::{join_path, FieldSpec, FieldType, Fields, PrimitiveKind, SchemaDefinition};

/// Builds the index-creation mapping for `schema`.
pub fn to_admin_mapping(schema: &SchemaDefinition) -> Value {
    json!({
        "date_detection": schema.date_detection,
        "numeric_detection": schema.numeric_detection,
        "properties": properties_to_mapping(&schema.fields),
    })
}

fn properties_to_mapping(fields: &Fields) -> Value {
    let mut properties = Map::new();
    for (name, spec) in fields.iter() {
        properties.insert(name.to_string(), field_to_mapping(spec));
    }
    Value::Object(properties)
}

fn field_to_mapping(spec: &FieldSpec) -> Value {
    let mut mapping = Map::new();
    match &spec.field_type {
        FieldType::Primitive(kind) => {
            mapping.insert("type".into(), Value::String(kind.type_name().into()));
        }
        FieldType::Object(children) => {
            mapping.insert("properties".into(), properties_to_mapping(children));
        }
        FieldType::Reference { .. } => {
            mapping.insert("properties".into(), json!({"$ref": {"type": "string"}}));
        }
    }
    if let Some(target) = &spec.copy_to {
        mapping.insert("copy_to".into(), Value::String(target.clone()));
    }
    Value::Object(mapping)
}

/// Imports an existing mapping document as a schema named `name`.
///
/// Reference targets are not part of the mapping format, so `$ref`
/// objects come back as plain objects.
pub fn from_admin_mapping(name: &str, mapping: &Value) -> SchemaResult<SchemaDefinition> {
    let root = mapping.as_object().ok_or_else(|| SchemaError::UnsupportedType {
        path: "$root".into(),
        type_name: json_type_name(mapping).into(),
    })?;

    let fields = match root.get("properties") {
        Some(properties) => properties_from_mapping(properties, "")?,
        None => Fields::new(),
    };

    Ok(SchemaDefinition {
        name: name.to_string(),
        date_detection: flag(root, "date_detection"),
        numeric_detection: flag(root, "numeric_detection"),
        fields,
    })
}

fn flag(root: &Map<String, Value>, key: &str) -> bool {
    root.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn properties_from_mapping(properties: &Value, prefix: &str) -> SchemaResult<Fields> {
    let entries = properties.as_object().ok_or_else(|| SchemaError::UnsupportedType {
        path: display_path(prefix),
        type_name: json_type_name(properties).into(),
    })?;

    let mut fields = Fields::new();
    for (name, field) in entries {
        let path = join_path(prefix, name);
        fields.push(name.clone(), field_from_mapping(field, &path)?);
    }
    Ok(fields)
}

fn field_from_mapping(field: &Value, path: &str) -> SchemaResult<FieldSpec> {
    let unsupported = |type_name: &str| SchemaError::UnsupportedType {
        path: path.to_string(),
        type_name: type_name.to_string(),
    };

    let obj = field.as_object().ok_or_else(|| unsupported(json_type_name(field)))?;
    let declared_type = obj.get("type").map(|t| t.as_str().unwrap_or("<non-string>"));

    let mut spec = match (declared_type, obj.get("properties")) {
        (None, Some(properties)) | (Some("object"), Some(properties)) => {
            FieldSpec::object(properties_from_mapping(properties, path)?)
        }
        (Some("object"), None) => FieldSpec::object(Fields::new()),
        (Some(type_name), None) => PrimitiveKind::from_type_name(type_name)
            .map(FieldSpec::primitive)
            .ok_or_else(|| unsupported(type_name))?,
        (Some(type_name), Some(_)) => return Err(unsupported(type_name)),
        (None, None) => return Err(unsupported("<missing>")),
    };

    if let Some(target) = obj.get("copy_to") {
        let target = target.as_str().ok_or_else(|| unsupported("copy_to list"))?;
        spec = spec.with_copy_to(target);
    }

    Ok(spec)
}

/// SHA-256 over the canonical admin mapping.
///
/// Field order does not change the mapping, so it does not change the
/// fingerprint either.
pub fn fingerprint(schema: &SchemaDefinition) -> String {
    let canonical = to_admin_mapping(schema).to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Whether moving from `old` to `new` needs a new backend index.
///
/// Reference targets are validated by the registry but are invisible to
/// the backend, so retargeting a reference alone is not a structural
/// change.
pub fn requires_new_index(old: &SchemaDefinition, new: &SchemaDefinition) -> bool {
    fingerprint(old) != fingerprint(new)
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$root".to_string()
    } else {
        path.to_string()
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experiments() -> SchemaDefinition {
        SchemaDefinition::new(
            "experiments",
            Fields::new()
                .with("legacy_name", FieldSpec::string().with_copy_to("experimentautocomplete"))
                .with("experimentautocomplete", FieldSpec::string())
                .with("core", FieldSpec::boolean())
                .with("control_number", FieldSpec::integer())
                .with(
                    "related_records",
                    FieldSpec::object(
                        Fields::new()
                            .with("record", FieldSpec::reference("self"))
                            .with("curated_relation", FieldSpec::boolean()),
                    ),
                )
                .with(
                    "self",
                    FieldSpec::object(Fields::new().with("$ref", FieldSpec::string())),
                ),
        )
    }

    #[test]
    fn test_mapping_preserves_structure() {
        let mapping = to_admin_mapping(&experiments());

        assert_eq!(mapping["date_detection"], false);
        assert_eq!(mapping["numeric_detection"], false);
        assert_eq!(
            mapping["properties"]["legacy_name"],
            json!({"type": "string", "copy_to": "experimentautocomplete"})
        );
        assert_eq!(mapping["properties"]["core"], json!({"type": "boolean"}));
        assert_eq!(mapping["properties"]["control_number"], json!({"type": "integer"}));
        assert_eq!(
            mapping["properties"]["related_records"],
            json!({"properties": {
                "record": {"properties": {"$ref": {"type": "string"}}},
                "curated_relation": {"type": "boolean"}
            }})
        );
    }

    #[test]
    fn test_import_mapping_document() {
        let mapping = json!({
            "date_detection": false,
            "numeric_detection": false,
            "properties": {
                "address": {"properties": {"cities": {"type": "string"}}},
                "deadline_date": {"type": "string"},
                "deleted": {"type": "boolean"},
                "experiments": {"properties": {
                    "legacy_name": {"type": "string", "copy_to": "experimentautocomplete"}
                }},
                "experimentautocomplete": {"type": "string"}
            }
        });

        let schema = from_admin_mapping("jobs", &mapping).unwrap();
        assert_eq!(
            schema.field_at("address.cities").and_then(FieldSpec::primitive_kind),
            Some(PrimitiveKind::String)
        );
        assert_eq!(
            schema.field_at("experiments.legacy_name").unwrap().copy_to.as_deref(),
            Some("experimentautocomplete")
        );
        assert_eq!(to_admin_mapping(&schema), mapping);
    }

    #[test]
    fn test_import_explicit_object_type() {
        let mapping = json!({"properties": {"urls": {"type": "object", "properties": {
            "value": {"type": "string"}
        }}}});
        let schema = from_admin_mapping("jobs", &mapping).unwrap();
        assert!(schema.field_at("urls.value").is_some());
    }

    #[test]
    fn test_import_unsupported_type() {
        let mapping = json!({"properties": {"earliest_date": {"type": "date"}}});
        let err = from_admin_mapping("hep", &mapping).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnsupportedType {
                path: "earliest_date".into(),
                type_name: "date".into()
            }
        );
    }

    #[test]
    fn test_import_nested_unsupported_path() {
        let mapping = json!({"properties": {"a": {"properties": {"b": {"type": "completion"}}}}});
        let err = from_admin_mapping("hep", &mapping).unwrap_err();
        assert!(err.to_string().contains("a.b"));
    }

    #[test]
    fn test_fingerprint_ignores_field_order() {
        let a = SchemaDefinition::new(
            "jobs",
            Fields::new()
                .with("position", FieldSpec::string())
                .with("status", FieldSpec::string()),
        );
        let b = SchemaDefinition::new(
            "jobs",
            Fields::new()
                .with("status", FieldSpec::string())
                .with("position", FieldSpec::string()),
        );
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert!(!requires_new_index(&a, &b));
        assert_eq!(fingerprint(&a).len(), 64);
    }

    #[test]
    fn test_kind_change_requires_new_index() {
        let old = SchemaDefinition::new("jobs", Fields::new().with("status", FieldSpec::string()));
        let new = SchemaDefinition::new("jobs", Fields::new().with("status", FieldSpec::integer()));
        assert!(requires_new_index(&old, &new));
    }

    #[test]
    fn test_detection_flag_change_requires_new_index() {
        let old = SchemaDefinition::new("jobs", Fields::new().with("status", FieldSpec::string()));
        let mut new = old.clone();
        new.date_detection = true;
        assert!(requires_new_index(&old, &new));
    }
}
