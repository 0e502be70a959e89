//! Bundled record schemas
//!
//! `jobs` references `experiments.self`, so register experiments first;
//! [`all`] returns them in that order.

use super::errors::{SchemaError, SchemaResult};
use super::types::SchemaDefinition;

const EXPERIMENTS: &str = include_str!("../../schemas/experiments.json");
const JOBS: &str = include_str!("../../schemas/jobs.json");

/// The `experiments` record schema
pub fn experiments() -> SchemaResult<SchemaDefinition> {
    parse("schemas/experiments.json", EXPERIMENTS)
}

/// The `jobs` record schema
pub fn jobs() -> SchemaResult<SchemaDefinition> {
    parse("schemas/jobs.json", JOBS)
}

/// Every bundled schema, in registration order
pub fn all() -> SchemaResult<Vec<SchemaDefinition>> {
    Ok(vec![experiments()?, jobs()?])
}

fn parse(origin: &str, content: &str) -> SchemaResult<SchemaDefinition> {
    serde_json::from_str(content)
        .map_err(|e| SchemaError::storage(origin, format!("Invalid bundled schema: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{FieldType, PrimitiveKind};
    use crate::schema::validator::SchemaValidator;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_bundled_schemas_parse() {
        let schemas = all().unwrap();
        let names: Vec<_> = schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["experiments", "jobs"]);
    }

    #[test]
    fn test_bundled_schemas_validate_together() {
        let set: HashMap<_, _> = all()
            .unwrap()
            .into_iter()
            .map(|s| (s.name.clone(), Arc::new(s)))
            .collect();
        SchemaValidator::new(&set).validate_all().unwrap();
    }

    #[test]
    fn test_experiments_autocomplete_copy() {
        let experiments = experiments().unwrap();
        assert_eq!(
            experiments.field_at("legacy_name").unwrap().copy_to.as_deref(),
            Some("experimentautocomplete")
        );
        assert!(!experiments.date_detection);
        assert!(!experiments.numeric_detection);
    }

    #[test]
    fn test_jobs_shape() {
        let jobs = jobs().unwrap();
        assert_eq!(
            jobs.field_at("address.cities").and_then(|s| s.primitive_kind()),
            Some(PrimitiveKind::String)
        );
        assert_eq!(
            jobs.field_at("experiments.record").map(|s| &s.field_type),
            Some(&FieldType::Reference {
                target_field: "experiments.self".into()
            })
        );
        assert!(jobs.field_at("experiments.curated_relation").is_some());
    }
}
