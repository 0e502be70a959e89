//! Index descriptors and their state machine
//!
//! ```text
//! Building ──> Active ──> Retiring ──> Deleted
//!    │                                    ^
//!    └────────────────────────────────────┘  (discard, never activated)
//! ```
//!
//! Strictly forward. An Active index always drains through Retiring.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{fingerprint, SchemaDefinition};

/// Lifecycle state of one backend index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    /// Created, being filled, not yet serving
    Building,
    /// Target of the schema's alias
    Active,
    /// Replaced; kept for in-flight reads until deleted
    Retiring,
    /// Removed from the backend
    Deleted,
}

impl IndexState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexState::Building => "building",
            IndexState::Active => "active",
            IndexState::Retiring => "retiring",
            IndexState::Deleted => "deleted",
        }
    }

    pub fn can_transition_to(&self, next: IndexState) -> bool {
        matches!(
            (self, next),
            (IndexState::Building, IndexState::Active)
                | (IndexState::Building, IndexState::Deleted)
                | (IndexState::Active, IndexState::Retiring)
                | (IndexState::Retiring, IndexState::Deleted)
        )
    }

    /// Whether the backend index still exists
    pub fn is_live(&self) -> bool {
        !matches!(self, IndexState::Deleted)
    }
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One versioned backend index of a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub schema_name: String,
    /// Backend identifier, `<prefix><schema>-v<version>`
    pub index_id: String,
    /// Starts at 1, never reused for a schema name
    pub version: u32,
    pub state: IndexState,
    /// Fingerprint of the mapping the index was created with
    pub fingerprint: String,
    /// Definition the mapping was generated from. Documents written to
    /// this index are normalized against it, not against whatever the
    /// registry holds now.
    pub definition: SchemaDefinition,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IndexDescriptor {
    pub(crate) fn building(schema: &SchemaDefinition, index_prefix: &str, version: u32) -> Self {
        let now = Utc::now();
        Self {
            schema_name: schema.name.clone(),
            index_id: index_id(index_prefix, &schema.name, version),
            version,
            state: IndexState::Building,
            fingerprint: fingerprint(schema),
            definition: schema.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == IndexState::Active
    }
}

/// Backend identifier of version `version` of `schema_name`
pub fn index_id(index_prefix: &str, schema_name: &str, version: u32) -> String {
    format!("{}{}-v{}", index_prefix, schema_name, version)
}

/// Alias that always names the active index of `schema_name`
pub fn alias_name(index_prefix: &str, schema_name: &str) -> String {
    format!("{}{}", index_prefix, schema_name)
}
