//! `@order` parsing
//!
//! Accepts `property`, `property ASC` or `property DESC`, comma separated.
//! Only schema properties can be ordered on.

use serde::Serialize;

use crate::data::EntitySchema;

use super::error::{QueryError, QueryResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub column: String,
    pub direction: OrderDirection,
}

impl OrderBy {
    pub fn parse_list(key: &str, s: &str, schema: &EntitySchema) -> QueryResult<Vec<Self>> {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| Self::parse(key, item, schema))
            .collect()
    }

    fn parse(key: &str, item: &str, schema: &EntitySchema) -> QueryResult<Self> {
        let parts: Vec<&str> = item.split_whitespace().collect();
        let (column, direction) = match parts.as_slice() {
            [col] => (*col, OrderDirection::Asc),
            [col, dir] if dir.eq_ignore_ascii_case("asc") => (*col, OrderDirection::Asc),
            [col, dir] if dir.eq_ignore_ascii_case("desc") => (*col, OrderDirection::Desc),
            _ => {
                return Err(QueryError::invalid_argument(
                    key,
                    format!(
                        "Invalid order '{}'. Use 'property', 'property ASC' or 'property DESC'",
                        item
                    ),
                ));
            }
        };
        if !schema.has_property(column) {
            return Err(QueryError::unknown_field(column));
        }
        Ok(Self {
            column: column.to_string(),
            direction,
        })
    }

    pub fn to_dql(&self, root: &str) -> String {
        format!("{}.{} {}", root, self.column, self.direction.as_str())
    }
}
