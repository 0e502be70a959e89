//! Schema type definitions
//!
//! A schema is an ordered tree of named fields. Each field is one of:
//! - a primitive (`string`, `integer`, `boolean`)
//! - an object with its own ordered children
//! - a reference to a field declared elsewhere (stored as `{"$ref": uri}`)
//!
//! Native JSON form of a field:
//!
//! ```json
//! {"type": "string", "copy_to": "experimentautocomplete"}
//! {"type": "object", "properties": {"cities": {"type": "string"}}}
//! {"type": "reference", "target": "experiments.self"}
//! ```

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Primitive field kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// UTF-8 string
    String,
    /// 64-bit integer (signed or unsigned JSON integer, never a float)
    Integer,
    /// Boolean
    Boolean,
}

impl PrimitiveKind {
    /// Returns the type name used in schemas and admin mappings
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Boolean => "boolean",
        }
    }

    /// Parse a type name
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(PrimitiveKind::String),
            "integer" => Some(PrimitiveKind::Integer),
            "boolean" => Some(PrimitiveKind::Boolean),
            _ => None,
        }
    }

    /// Whether a JSON scalar has this kind. No coercion.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            PrimitiveKind::String => value.is_string(),
            PrimitiveKind::Integer => value.is_i64() || value.is_u64(),
            PrimitiveKind::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Shape of a declared field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Scalar value of one kind
    Primitive(PrimitiveKind),
    /// Nested object with its own declared children
    Object(Fields),
    /// Link to a record; `target_field` is a field path in this schema or
    /// `<schema>.<path>` in another registered schema
    Reference { target_field: String },
}

impl FieldType {
    /// Returns the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldType::Primitive(kind) => kind.type_name(),
            FieldType::Object(_) => "object",
            FieldType::Reference { .. } => "reference",
        }
    }
}

/// A declared field: its shape plus an optional copy target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldSpec", into = "RawFieldSpec")]
pub struct FieldSpec {
    pub field_type: FieldType,
    /// Path of a field in the same schema that also receives this value
    pub copy_to: Option<String>,
}

impl FieldSpec {
    /// Primitive field of the given kind
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self {
            field_type: FieldType::Primitive(kind),
            copy_to: None,
        }
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String)
    }

    pub fn integer() -> Self {
        Self::primitive(PrimitiveKind::Integer)
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveKind::Boolean)
    }

    /// Object field with the given children
    pub fn object(fields: Fields) -> Self {
        Self {
            field_type: FieldType::Object(fields),
            copy_to: None,
        }
    }

    /// Reference field pointing at `target_field`
    pub fn reference(target_field: impl Into<String>) -> Self {
        Self {
            field_type: FieldType::Reference {
                target_field: target_field.into(),
            },
            copy_to: None,
        }
    }

    /// Copy this field's value into `target` as well
    pub fn with_copy_to(mut self, target: impl Into<String>) -> Self {
        self.copy_to = Some(target.into());
        self
    }

    /// Primitive kind, if this is a primitive field
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.field_type {
            FieldType::Primitive(kind) => Some(kind),
            _ => None,
        }
    }

    /// Children, if this is an object field
    pub fn children(&self) -> Option<&Fields> {
        match &self.field_type {
            FieldType::Object(fields) => Some(fields),
            _ => None,
        }
    }
}

/// Serde shape of a field; converted to and from [`FieldSpec`]
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFieldSpec {
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<Fields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    copy_to: Option<String>,
}

impl TryFrom<RawFieldSpec> for FieldSpec {
    type Error = String;

    fn try_from(raw: RawFieldSpec) -> Result<Self, Self::Error> {
        let field_type = match raw.field_type.as_str() {
            "object" => {
                if raw.target.is_some() {
                    return Err("object field cannot declare 'target'".into());
                }
                FieldType::Object(raw.properties.unwrap_or_default())
            }
            "reference" => {
                if raw.properties.is_some() {
                    return Err("reference field cannot declare 'properties'".into());
                }
                let target_field = raw
                    .target
                    .ok_or_else(|| "reference field requires 'target'".to_string())?;
                FieldType::Reference { target_field }
            }
            other => {
                let kind = PrimitiveKind::from_type_name(other)
                    .ok_or_else(|| format!("unknown field type '{}'", other))?;
                if raw.properties.is_some() || raw.target.is_some() {
                    return Err(format!("{} field cannot declare 'properties' or 'target'", other));
                }
                FieldType::Primitive(kind)
            }
        };

        Ok(Self {
            field_type,
            copy_to: raw.copy_to,
        })
    }
}

impl From<FieldSpec> for RawFieldSpec {
    fn from(spec: FieldSpec) -> Self {
        let field_type = spec.field_type.type_name().to_string();
        let (properties, target) = match spec.field_type {
            FieldType::Primitive(_) => (None, None),
            FieldType::Object(fields) => (Some(fields), None),
            FieldType::Reference { target_field } => (None, Some(target_field)),
        };
        Self {
            field_type,
            properties,
            target,
            copy_to: spec.copy_to,
        }
    }
}

/// Ordered field declarations at one nesting level.
///
/// Serialized as a JSON object. Deserialization keeps repeated keys so the
/// validator can report them instead of silently keeping the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(String, FieldSpec)>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append
    pub fn with(mut self, name: impl Into<String>, spec: FieldSpec) -> Self {
        self.push(name, spec);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, spec: FieldSpec) {
        self.0.push((name.into(), spec));
    }

    /// First declaration with this name
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.0.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve a dot-separated path below this level
    pub fn field_at(&self, path: &str) -> Option<&FieldSpec> {
        let mut segments = path.split('.');
        let mut spec = self.get(segments.next()?)?;
        for segment in segments {
            spec = spec.children()?.get(segment)?;
        }
        Some(spec)
    }

    /// Visit every field depth-first in declaration order
    pub fn walk<'a, F>(&'a self, prefix: &str, visit: &mut F)
    where
        F: FnMut(&str, &'a FieldSpec),
    {
        for (name, spec) in self.iter() {
            let path = join_path(prefix, name);
            visit(&path, spec);
            if let Some(children) = spec.children() {
                children.walk(&path, visit);
            }
        }
    }
}

impl FromIterator<(String, FieldSpec)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, FieldSpec)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, spec) in &self.0 {
            map.serialize_entry(name, spec)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Fields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FieldsVisitor;

        impl<'de> Visitor<'de> for FieldsVisitor {
            type Value = Fields;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field name to field definition")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Fields, A::Error> {
                let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, spec)) = access.next_entry::<String, FieldSpec>()? {
                    fields.push((name, spec));
                }
                Ok(Fields(fields))
            }
        }

        deserializer.deserialize_map(FieldsVisitor)
    }
}

/// Complete schema definition. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    /// Unique schema name, also the stem of backend index identifiers
    pub name: String,
    /// Backend date detection for unmapped strings (always off by default)
    #[serde(default)]
    pub date_detection: bool,
    /// Backend numeric detection for unmapped strings (always off by default)
    #[serde(default)]
    pub numeric_detection: bool,
    /// Top-level field declarations
    pub fields: Fields,
}

impl SchemaDefinition {
    /// Create a schema with detection disabled
    pub fn new(name: impl Into<String>, fields: Fields) -> Self {
        Self {
            name: name.into(),
            date_detection: false,
            numeric_detection: false,
            fields,
        }
    }

    /// Resolve a dot-separated field path
    pub fn field_at(&self, path: &str) -> Option<&FieldSpec> {
        self.fields.field_at(path)
    }

    /// `(source path, target path)` for every `copy_to` declaration
    pub fn copy_directives(&self) -> Vec<(String, String)> {
        let mut directives = Vec::new();
        self.fields.walk("", &mut |path, spec| {
            if let Some(target) = &spec.copy_to {
                directives.push((path.to_string(), target.clone()));
            }
        });
        directives
    }

    /// `(field path, target)` for every reference field
    pub fn references(&self) -> Vec<(String, String)> {
        let mut references = Vec::new();
        self.fields.walk("", &mut |path, spec| {
            if let FieldType::Reference { target_field } = &spec.field_type {
                references.push((path.to_string(), target_field.clone()));
            }
        });
        references
    }
}

/// Creates a field path from prefix and field name.
pub fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_schema() -> SchemaDefinition {
        SchemaDefinition::new(
            "jobs",
            Fields::new()
                .with("position", FieldSpec::string())
                .with("control_number", FieldSpec::integer())
                .with(
                    "address",
                    FieldSpec::object(Fields::new().with("cities", FieldSpec::string())),
                ),
        )
    }

    #[test]
    fn test_field_at_nested() {
        let schema = sample_schema();
        assert_eq!(
            schema.field_at("address.cities").and_then(|s| s.primitive_kind()),
            Some(PrimitiveKind::String)
        );
        assert!(schema.field_at("address.country").is_none());
        assert!(schema.field_at("position.cities").is_none());
    }

    #[test]
    fn test_serde_native_form() {
        let schema = sample_schema();
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            value["fields"]["address"],
            json!({"type": "object", "properties": {"cities": {"type": "string"}}})
        );
        assert_eq!(value["date_detection"], false);

        let back: SchemaDefinition = serde_json::from_value(value).unwrap();
        assert_eq!(back, schema);
    }

    #[test]
    fn test_serde_preserves_order() {
        let text = r#"{"name":"x","fields":{"b":{"type":"string"},"a":{"type":"boolean"}}}"#;
        let schema: SchemaDefinition = serde_json::from_str(text).unwrap();
        let names: Vec<_> = schema.fields.names().collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_deserialize_keeps_duplicate_keys() {
        let text = r#"{"name":"x","fields":{"a":{"type":"string"},"a":{"type":"integer"}}}"#;
        let schema: SchemaDefinition = serde_json::from_str(text).unwrap();
        assert_eq!(schema.fields.len(), 2);
    }

    #[test]
    fn test_reference_requires_target() {
        let result: Result<FieldSpec, _> = serde_json::from_value(json!({"type": "reference"}));
        assert!(result.is_err());

        let spec: FieldSpec =
            serde_json::from_value(json!({"type": "reference", "target": "experiments.self"}))
                .unwrap();
        assert_eq!(
            spec.field_type,
            FieldType::Reference {
                target_field: "experiments.self".into()
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        let result: Result<FieldSpec, _> = serde_json::from_value(json!({"type": "float"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result: Result<FieldSpec, _> =
            serde_json::from_value(json!({"type": "string", "analyzer": "standard"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_primitive_accepts_without_coercion() {
        assert!(PrimitiveKind::Integer.accepts(&json!(42)));
        assert!(!PrimitiveKind::Integer.accepts(&json!("42")));
        assert!(!PrimitiveKind::Integer.accepts(&json!(4.2)));
        assert!(PrimitiveKind::Boolean.accepts(&json!(false)));
        assert!(!PrimitiveKind::String.accepts(&json!(true)));
    }

    #[test]
    fn test_copy_directives_and_references() {
        let schema = SchemaDefinition::new(
            "experiments",
            Fields::new()
                .with("legacy_name", FieldSpec::string().with_copy_to("experimentautocomplete"))
                .with("experimentautocomplete", FieldSpec::string())
                .with(
                    "related_records",
                    FieldSpec::object(Fields::new().with("record", FieldSpec::reference("self"))),
                )
                .with(
                    "self",
                    FieldSpec::object(Fields::new().with("$ref", FieldSpec::string())),
                ),
        );

        assert_eq!(
            schema.copy_directives(),
            vec![("legacy_name".to_string(), "experimentautocomplete".to_string())]
        );
        assert_eq!(
            schema.references(),
            vec![("related_records.record".to_string(), "self".to_string())]
        );
    }
}
