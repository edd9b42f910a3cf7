//! `@select` compilation
//!
//! ```text
//! select := item ("," item)*
//! item   := NAME | NAME "." NAME | NAME ".{" NAME ("," NAME)* "}"
//! ```
//!
//! Whitespace is ignored. Dotted items walk a relation and become sub-select
//! placeholders, resolved later by one correlated query each.

use crate::data::EntitySchema;

use super::error::{QueryError, QueryResult};
use super::names::NameGenerator;
use super::plan::{SubSelect, is_identifier};

const SELECT_KEY: &str = "@select";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectPlan {
    pub properties: Vec<String>,
    pub metadata: Vec<String>,
    pub sub_selects: Vec<SubSelect>,
}

impl SelectPlan {
    fn add_property(&mut self, name: &str) {
        if !self.properties.iter().any(|p| p == name) {
            self.properties.push(name.to_string());
        }
    }

    fn add_metadata(&mut self, key: &str) {
        if !self.metadata.iter().any(|m| m == key) {
            self.metadata.push(key.to_string());
        }
    }
}

pub fn parse_select(
    raw: &str,
    schema: &EntitySchema,
    names: &mut NameGenerator,
) -> QueryResult<SelectPlan> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let mut plan = SelectPlan::default();

    for item in split_items(&compact) {
        if let Some((path, member)) = item.split_once('.') {
            if !schema.has_relation(path) {
                return Err(QueryError::unknown_field(path));
            }
            for member in expand_members(member) {
                if !is_identifier(member) {
                    return Err(QueryError::invalid_argument(
                        SELECT_KEY,
                        format!("invalid sub-select member '{}' in '{}'", member, item),
                    ));
                }
                plan.sub_selects
                    .push(SubSelect::new(names.sub_select_index(), path, member));
            }
        } else if schema.has_property(item) {
            plan.add_property(item);
        } else if schema.has_metadata_key(item) {
            plan.add_metadata(item);
        } else if schema.has_relation(item) {
            plan.sub_selects
                .push(SubSelect::new(names.sub_select_index(), item, "id"));
        } else {
            tracing::debug!(field = item, "Ignoring unknown select field");
        }
    }

    Ok(plan)
}

/// `{a,b}` to `[a, b]`, anything else to itself
fn expand_members(member: &str) -> Vec<&str> {
    match member
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
    {
        Some(inner) => inner.split(',').filter(|m| !m.is_empty()).collect(),
        None => vec![member],
    }
}

/// Split on commas outside braces, dropping empty items
fn split_items(s: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&s[start..]);
    items.retain(|item| !item.is_empty());
    items
}
