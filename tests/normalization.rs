//! Normalization Tests
//!
//! Document shaping against registered schemas:
//! - Undeclared fields are reported, one violation each
//! - No type coercion
//! - Normalizing a normalized document changes nothing
//! - Copy and recid enrichment follow the registered definition

use std::sync::Arc;

use searchmap::backend::InMemoryBackend;
use searchmap::normalizer::{FieldViolation, NormalizeError};
use searchmap::schema::SchemaDefinition;
use searchmap::{IndexService, IndexerConfig, ServiceError};
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open(tmp: &TempDir, backend: &Arc<InMemoryBackend>) -> IndexService {
    IndexService::open(
        IndexerConfig::new(tmp.path().to_string_lossy()),
        backend.clone(),
        backend.clone(),
    )
    .unwrap()
}

fn seminars() -> SchemaDefinition {
    serde_json::from_value(json!({
        "name": "seminars",
        "fields": {
            "title": {"type": "string", "copy_to": "title_suggest"},
            "title_suggest": {"type": "string"},
            "speaker": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "record": {"type": "reference", "target": "self"},
                    "recid": {"type": "integer"}
                }
            },
            "self": {"type": "object", "properties": {"$ref": {"type": "string"}}},
            "self_recid": {"type": "integer"},
            "public": {"type": "boolean"}
        }
    }))
    .unwrap()
}

fn violations(result: Result<impl std::fmt::Debug, ServiceError>) -> Vec<FieldViolation> {
    match result {
        Err(ServiceError::Normalize(NormalizeError::Violations(v))) => v,
        other => panic!("expected violations, got {:?}", other),
    }
}

// =============================================================================
// Strictness
// =============================================================================

/// Each undeclared field yields exactly one violation naming it.
#[tokio::test]
async fn test_one_violation_per_unknown_field() {
    let tmp = TempDir::new().unwrap();
    let service = open(&tmp, &Arc::new(InMemoryBackend::new()));
    service.register_schema(seminars()).await.unwrap();

    let v = violations(service.normalize(
        "seminars",
        &json!({"title": "Dark matter", "room": "4-3-006", "speaker": {"name": "A", "email": "a@b"}}),
    ));

    assert_eq!(
        v,
        vec![
            FieldViolation::UnknownField {
                path: "room".into()
            },
            FieldViolation::UnknownField {
                path: "speaker.email".into()
            },
        ]
    );
}

/// "true" is not a boolean.
#[tokio::test]
async fn test_no_coercion() {
    let tmp = TempDir::new().unwrap();
    let service = open(&tmp, &Arc::new(InMemoryBackend::new()));
    service.register_schema(seminars()).await.unwrap();

    let v = violations(service.normalize("seminars", &json!({"public": "true"})));
    assert_eq!(v.len(), 1);
    assert_eq!(v[0].code(), "TYPE_MISMATCH");
    assert_eq!(v[0].path(), "public");
}

// =============================================================================
// Enrichment
// =============================================================================

/// copy_to and recid enrichment applied from the registered definition.
#[tokio::test]
async fn test_enrichment() {
    let tmp = TempDir::new().unwrap();
    let service = open(&tmp, &Arc::new(InMemoryBackend::new()));
    service.register_schema(seminars()).await.unwrap();

    let doc = service
        .normalize(
            "seminars",
            &json!({
                "title": "LHC Run 2",
                "self": {"$ref": "https://labs.example.org/api/seminars/77"},
                "speaker": {"name": "A", "record": {"$ref": "https://labs.example.org/api/seminars/12/"}}
            }),
        )
        .unwrap();

    assert_eq!(doc.get("title_suggest"), vec![&json!("LHC Run 2")]);
    assert_eq!(doc.get("self_recid"), vec![&json!(77)]);
    assert_eq!(doc.get("speaker.recid"), vec![&json!(12)]);
}

/// Normalization is idempotent for every registered schema.
#[tokio::test]
async fn test_idempotent() {
    let tmp = TempDir::new().unwrap();
    let service = open(&tmp, &Arc::new(InMemoryBackend::new()));
    service.register_builtin_schemas().await.unwrap();
    service.register_schema(seminars()).await.unwrap();

    let samples: Vec<(&str, Value)> = vec![
        (
            "seminars",
            json!({"title": "Dark matter", "self": {"$ref": "http://x/api/seminars/5"}, "public": true}),
        ),
        (
            "experiments",
            json!({"legacy_name": "LHC Run 2", "related_records": [{"record": {"$ref": "http://x/api/experiments/3"}}]}),
        ),
        (
            "jobs",
            json!({"position": "Postdoc", "experiments": [{"record": {"$ref": "http://x/api/experiments/1"}}]}),
        ),
    ];

    for (schema, raw) in samples {
        let once = service.normalize(schema, &raw).unwrap();
        let twice = service.normalize(schema, once.as_value()).unwrap();
        assert_eq!(once, twice, "schema {}", schema);
    }
}

/// A reopened service normalizes with the persisted definitions.
#[tokio::test]
async fn test_persisted_schema_used_after_reopen() {
    let tmp = TempDir::new().unwrap();
    let backend = Arc::new(InMemoryBackend::new());
    open(&tmp, &backend).register_schema(seminars()).await.unwrap();

    let reopened = open(&tmp, &backend);
    assert_eq!(*reopened.registry().get("seminars").unwrap(), seminars());

    let doc = reopened
        .normalize("seminars", &json!({"title": "Neutrinos"}))
        .unwrap();
    assert_eq!(doc.as_value()["title_suggest"], json!("Neutrinos"));
}

/// Normalizing against an unknown schema is an error, not a violation.
#[tokio::test]
async fn test_unknown_schema() {
    let tmp = TempDir::new().unwrap();
    let service = open(&tmp, &Arc::new(InMemoryBackend::new()));

    let err = service.normalize("seminars", &json!({})).unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Normalize(NormalizeError::UnknownSchema(_))
    ));
}
