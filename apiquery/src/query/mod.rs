//! Filter-expression compiler
//!
//! Turns raw request parameters such as `id=GT(10)` or `@select=id,name`
//! into a `QueryPlan`, rendered as DQL text plus a parameter table.
//!
//! Pipeline, leaves first:
//! - `splitter` - top-level comma splitting
//! - `values` - literal resolution and parameter binding
//! - `parser` - `!?OP(args)` expressions into `FilterNode`
//! - `fields` - filter key classification and joins
//! - `select` - the `@select` mini-language
//! - `predicate` - operator semantics
//! - `builder` - assembly into a `QueryPlan`

pub mod builder;
pub mod error;
pub mod fields;
pub mod names;
pub mod order;
pub mod parser;
pub mod plan;
pub mod predicate;
pub mod select;
pub mod splitter;
pub mod values;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::{ApiQuery, RawQuery};
pub use error::{QueryError, QueryResult};
pub use fields::{FieldResolver, FieldTarget};
pub use order::{OrderBy, OrderDirection};
pub use parser::{FilterNode, Literal, LogicalOp, OpKind, parse_expression};
pub use plan::{
    Alias, ColumnRef, CompareOp, JoinCondition, JoinFragment, Predicate, QueryPlan,
    RenderedQuery, SubSelect,
};
pub use select::{SelectPlan, parse_select};
pub use splitter::split;
pub use values::{BoundParameter, ParamTable, ParamValue, ValueResolver};
