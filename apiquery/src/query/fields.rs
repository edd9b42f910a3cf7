//! Filter key classification
//!
//! Decides what a filter key addresses on the entity and which join, if
//! any, is needed to reach it. Names can collide across categories, so the
//! checks run in a fixed order:
//!
//! 1. `user` shortcut through the owner agent
//! 2. owning-side relation
//! 3. plain property
//! 4. `type` shortcut
//! 5. taxonomy (`term:<slug>`)
//! 6. registered metadata key
//! 7. ignored bookkeeping keys (`_*`, `callback`)

use crate::data::EntitySchema;

use super::error::{QueryError, QueryResult};
use super::names::{NameGenerator, OWNER_AGENT_ALIAS};
use super::plan::{ColumnRef, JoinCondition, JoinFragment};

/// Shortcut key filtering on the owner agent's user
pub const USER_KEY: &str = "user";
/// Shortcut key filtering on the entity type
pub const TYPE_KEY: &str = "type";
const CALLBACK_KEY: &str = "callback";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    Property(ColumnRef),
    OwnerAgentShortcut {
        column: ColumnRef,
        join: JoinFragment,
    },
    OwningRelation(ColumnRef),
    MetadataKey {
        column: ColumnRef,
        join: JoinFragment,
    },
    TaxonomyTerm {
        column: ColumnRef,
        joins: [JoinFragment; 2],
    },
    TypeShortcut(ColumnRef),
    /// Client-side bookkeeping key, contributes nothing
    Ignored,
}

impl FieldTarget {
    /// Column the predicate compares against, none for ignored keys
    pub fn column(&self) -> Option<&ColumnRef> {
        match self {
            Self::Property(column)
            | Self::OwningRelation(column)
            | Self::TypeShortcut(column)
            | Self::OwnerAgentShortcut { column, .. }
            | Self::MetadataKey { column, .. }
            | Self::TaxonomyTerm { column, .. } => Some(column),
            Self::Ignored => None,
        }
    }

    /// Joins the column needs, in render order
    pub fn into_joins(self) -> Vec<JoinFragment> {
        match self {
            Self::OwnerAgentShortcut { join, .. } | Self::MetadataKey { join, .. } => vec![join],
            Self::TaxonomyTerm { joins, .. } => joins.into(),
            _ => Vec::new(),
        }
    }
}

pub struct FieldResolver<'s> {
    schema: &'s EntitySchema,
}

impl<'s> FieldResolver<'s> {
    pub fn new(schema: &'s EntitySchema) -> Self {
        Self { schema }
    }

    /// Classify `key`. Every metadata or taxonomy hit gets fresh aliases,
    /// so repeating a key joins again.
    pub fn resolve(&self, key: &str, names: &mut NameGenerator) -> QueryResult<FieldTarget> {
        let schema = self.schema;

        let target = if key == USER_KEY && schema.capabilities.uses_owner_agent {
            FieldTarget::OwnerAgentShortcut {
                column: ColumnRef::aliased(OWNER_AGENT_ALIAS, USER_KEY),
                join: JoinFragment {
                    alias: OWNER_AGENT_ALIAS.to_string(),
                    source: ColumnRef::root("owner"),
                    condition: None,
                },
            }
        } else if schema.is_owning_relation(key) {
            FieldTarget::OwningRelation(ColumnRef::root(key))
        } else if schema.has_property(key) {
            FieldTarget::Property(ColumnRef::root(key))
        } else if key == TYPE_KEY && schema.capabilities.uses_types {
            FieldTarget::TypeShortcut(ColumnRef::root("_type"))
        } else if let Some(taxonomy) = schema.taxonomy_for_key(key) {
            let n = names.alias_index();
            let relation = format!("tr{}", n);
            let term = format!("t{}", n);
            FieldTarget::TaxonomyTerm {
                column: ColumnRef::aliased(term.clone(), "term"),
                joins: [
                    JoinFragment {
                        alias: relation.clone(),
                        source: ColumnRef::root("__termRelations"),
                        condition: None,
                    },
                    JoinFragment {
                        alias: term,
                        source: ColumnRef::aliased(relation, "term"),
                        condition: Some(JoinCondition::Taxonomy(taxonomy)),
                    },
                ],
            }
        } else if schema.has_metadata_key(key) {
            let alias = format!("m{}", names.alias_index());
            FieldTarget::MetadataKey {
                column: ColumnRef::aliased(alias.clone(), "value"),
                join: JoinFragment {
                    alias,
                    source: ColumnRef::root("__metadata"),
                    condition: Some(JoinCondition::MetadataKey(key.to_string())),
                },
            }
        } else if key.starts_with('_') || key == CALLBACK_KEY {
            FieldTarget::Ignored
        } else {
            return Err(QueryError::unknown_field(key));
        };

        tracing::trace!(key, target = ?target, "Classified filter key");
        Ok(target)
    }
}
