//! Entity schema snapshots
//!
//! The compiler never inspects live ORM metadata. The embedding system hands
//! it an immutable `EntitySchema` per entity kind through `SchemaProvider`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::DataError;

/// Prefix of filter keys that address a taxonomy (`term:tag`)
pub const TAXONOMY_KEY_PREFIX: &str = "term:";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RelationInfo {
    /// Holds the foreign key, so it can be filtered as a column
    pub is_owning_side: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Capabilities {
    pub uses_metadata: bool,
    pub uses_taxonomies: bool,
    pub uses_owner_agent: bool,
    pub uses_types: bool,
}

/// Read-only description of one entity kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EntitySchema {
    /// Short kind used by callers and reference tokens (`agent`)
    pub kind: String,
    /// Entity name used in the FROM clause
    pub class_name: String,
    /// Entity holding key/value metadata rows, when the kind uses metadata
    pub metadata_class_name: Option<String>,
    pub properties: BTreeSet<String>,
    pub relations: BTreeMap<String, RelationInfo>,
    pub metadata_keys: BTreeSet<String>,
    /// Taxonomy slug to taxonomy id
    pub taxonomies: BTreeMap<String, u64>,
    pub capabilities: Capabilities,
}

impl EntitySchema {
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains(name)
    }

    pub fn has_relation(&self, name: &str) -> bool {
        self.relations.contains_key(name)
    }

    pub fn is_owning_relation(&self, name: &str) -> bool {
        self.relations
            .get(name)
            .is_some_and(|relation| relation.is_owning_side)
    }

    /// Registered metadata key, only when the kind uses metadata
    pub fn has_metadata_key(&self, key: &str) -> bool {
        self.capabilities.uses_metadata && self.metadata_keys.contains(key)
    }

    /// Taxonomy id addressed by a `term:<slug>` key
    pub fn taxonomy_for_key(&self, key: &str) -> Option<u64> {
        if !self.capabilities.uses_taxonomies {
            return None;
        }
        key.strip_prefix(TAXONOMY_KEY_PREFIX)
            .and_then(|slug| self.taxonomies.get(slug).copied())
    }
}

/// Schema collaborator consumed once per plan build
pub trait SchemaProvider {
    fn schema(&self, kind: &str) -> Option<EntitySchema>;
}

/// In-memory schema set, typically loaded from a JSON file
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, EntitySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: EntitySchema) -> Result<(), DataError> {
        if self.schemas.contains_key(&schema.kind) {
            return Err(DataError::DuplicateKind(schema.kind));
        }
        tracing::trace!(kind = %schema.kind, "Registered entity schema");
        self.schemas.insert(schema.kind.clone(), schema);
        Ok(())
    }

    /// Parse a JSON array of schemas
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        let schemas: Vec<EntitySchema> = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(schema)?;
        }
        Ok(registry)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, DataError> {
        tracing::debug!(path = %path.display(), "Loading schema file");
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }
}

impl SchemaProvider for SchemaRegistry {
    fn schema(&self, kind: &str) -> Option<EntitySchema> {
        self.schemas.get(kind).cloned()
    }
}
