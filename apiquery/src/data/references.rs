//! Reference-token collaborator
//!
//! Resolves `@me`, `@me.<prop>`, `@profile` and `@<kind>:<id>` against the
//! request's principal and entity repositories. Every lookup is optional:
//! a miss becomes a null parameter, never an error.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::DataError;

/// Identity of a persisted entity bound as a parameter
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EntityRef {
    pub kind: String,
    pub id: u64,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, id: u64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

pub trait ReferenceResolver {
    /// Authenticated principal, `None` for a guest
    fn current_user(&self) -> Option<EntityRef>;

    /// Property read off the principal
    fn current_user_property(&self, name: &str) -> Option<serde_json::Value>;

    /// Profile entity of the principal
    fn current_user_profile(&self) -> Option<EntityRef>;

    /// Entity of `kind` with `id`, `None` for an unknown kind or missing id
    fn find(&self, kind: &str, id: u64) -> Option<EntityRef>;
}

/// Resolver for unauthenticated requests without repository access
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl ReferenceResolver for Anonymous {
    fn current_user(&self) -> Option<EntityRef> {
        None
    }

    fn current_user_property(&self, _name: &str) -> Option<serde_json::Value> {
        None
    }

    fn current_user_profile(&self) -> Option<EntityRef> {
        None
    }

    fn find(&self, _kind: &str, _id: u64) -> Option<EntityRef> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Principal {
    pub id: u64,
    pub profile: Option<EntityRef>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// Fixed principal and entity set, loaded from JSON for the CLI and tests
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticReferences {
    pub user: Option<Principal>,
    /// Entity kind to existing ids
    pub entities: BTreeMap<String, BTreeSet<u64>>,
}

/// Entity kind bound for `@me`
pub const USER_KIND: &str = "user";

impl StaticReferences {
    pub fn from_json(json: &str) -> Result<Self, DataError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, DataError> {
        tracing::debug!(path = %path.display(), "Loading references file");
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

impl ReferenceResolver for StaticReferences {
    fn current_user(&self) -> Option<EntityRef> {
        self.user.as_ref().map(|u| EntityRef::new(USER_KIND, u.id))
    }

    fn current_user_property(&self, name: &str) -> Option<serde_json::Value> {
        let user = self.user.as_ref()?;
        if name == "id" {
            return Some(serde_json::Value::from(user.id));
        }
        user.properties.get(name).cloned()
    }

    fn current_user_profile(&self) -> Option<EntityRef> {
        self.user.as_ref().and_then(|u| u.profile.clone())
    }

    fn find(&self, kind: &str, id: u64) -> Option<EntityRef> {
        self.entities
            .get(kind)
            .filter(|ids| ids.contains(&id))
            .map(|_| EntityRef::new(kind, id))
    }
}
