//! Bound parameters
//!
//! Every operand becomes a named parameter, never inline text. Reference
//! tokens are resolved through the `ReferenceResolver`; anything that cannot
//! be resolved binds null instead of failing.

use serde::Serialize;

use crate::data::{EntityRef, ReferenceResolver};

use super::parser::Literal;

/// Resolved value of a bound parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Null,
    Scalar(String),
    /// Property read off the principal
    Json(serde_json::Value),
    Entity(EntityRef),
}

impl ParamValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundParameter {
    pub name: String,
    pub value: ParamValue,
}

/// Parameters of one plan, in binding order
///
/// Names are `v0`, `v1`, ... in binding order and never repeat.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParamTable {
    entries: Vec<BoundParameter>,
}

impl ParamTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under a fresh name and return the name
    pub fn bind(&mut self, value: ParamValue) -> String {
        let name = format!("v{}", self.entries.len());
        self.entries.push(BoundParameter {
            name: name.clone(),
            value,
        });
        name
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BoundParameter> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turns literals into bound parameters
pub struct ValueResolver<'a> {
    references: &'a dyn ReferenceResolver,
}

impl<'a> ValueResolver<'a> {
    pub fn new(references: &'a dyn ReferenceResolver) -> Self {
        Self { references }
    }

    pub fn resolve(&self, literal: &Literal) -> ParamValue {
        let resolved = match literal {
            Literal::Scalar(value) => return ParamValue::Scalar(value.clone()),
            Literal::CurrentUser => self.references.current_user().map(ParamValue::Entity),
            Literal::CurrentUserProperty(prop) => self
                .references
                .current_user_property(prop)
                .map(ParamValue::Json),
            Literal::CurrentUserProfile => self
                .references
                .current_user_profile()
                .map(ParamValue::Entity),
            Literal::Lookup { kind, id } => {
                self.references.find(kind, *id).map(ParamValue::Entity)
            }
            Literal::Unresolvable(_) => None,
        };

        resolved.unwrap_or_else(|| {
            tracing::trace!(literal = ?literal, "Reference resolved to null");
            ParamValue::Null
        })
    }

    /// Resolve `literal`, bind it in `params` and return the parameter name.
    /// Identical literals are bound once per occurrence.
    pub fn bind(&self, params: &mut ParamTable, literal: &Literal) -> String {
        params.bind(self.resolve(literal))
    }
}
