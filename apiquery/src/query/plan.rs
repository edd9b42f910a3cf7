//! Query plan and DQL rendering
//!
//! Columns, joins and predicates stay structured until rendering, and are
//! rendered against a root alias. The correlated sub-query re-renders the
//! same plan against a fresh alias instead of rewriting text.

use serde::Serialize;

use super::error::{QueryError, QueryResult};
use super::names::ROOT_ALIAS;
use super::order::OrderBy;
use super::parser::LogicalOp;
use super::values::ParamTable;

/// Alias a column is read through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alias {
    Root,
    Named(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub alias: Alias,
    pub column: String,
}

impl ColumnRef {
    pub fn root(column: impl Into<String>) -> Self {
        Self {
            alias: Alias::Root,
            column: column.into(),
        }
    }

    pub fn aliased(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: Alias::Named(alias.into()),
            column: column.into(),
        }
    }

    pub fn render(&self, root: &str) -> String {
        match &self.alias {
            Alias::Root => format!("{}.{}", root, self.column),
            Alias::Named(alias) => format!("{}.{}", alias, self.column),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinCondition {
    /// `WITH <alias>.key = '<key>'`
    MetadataKey(String),
    /// `WITH <alias>.taxonomy = <id>`
    Taxonomy(u64),
}

/// One `LEFT JOIN <source> <alias> [WITH ...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinFragment {
    pub alias: String,
    pub source: ColumnRef,
    pub condition: Option<JoinCondition>,
}

impl JoinFragment {
    pub fn render(&self, root: &str) -> String {
        let mut dql = format!("LEFT JOIN {} {}", self.source.render(root), self.alias);
        match &self.condition {
            Some(JoinCondition::MetadataKey(key)) => {
                dql.push_str(&format!(" WITH {}.key = {}", self.alias, quote_literal(key)));
            }
            Some(JoinCondition::Taxonomy(id)) => {
                dql.push_str(&format!(" WITH {}.taxonomy = {}", self.alias, id));
            }
            None => {}
        }
        dql
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
        }
    }

    /// Logical complement: `>` becomes `<=`, `=` becomes `<>`
    pub fn negate(&self) -> Self {
        match self {
            Self::Eq => Self::Ne,
            Self::Ne => Self::Eq,
            Self::Gt => Self::Lte,
            Self::Gte => Self::Lt,
            Self::Lt => Self::Gte,
            Self::Lte => Self::Gt,
        }
    }
}

/// Compiled predicate; parameters are referenced by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Compare {
        column: ColumnRef,
        op: CompareOp,
        param: String,
    },
    In {
        column: ColumnRef,
        negated: bool,
        params: Vec<String>,
    },
    Between {
        column: ColumnRef,
        negated: bool,
        low: String,
        high: String,
    },
    Like {
        column: ColumnRef,
        negated: bool,
        case_insensitive: bool,
        param: String,
    },
    Null {
        column: ColumnRef,
        negated: bool,
    },
    GeoNear {
        column: ColumnRef,
        negated: bool,
        longitude: String,
        latitude: String,
        radius: String,
    },
    Group {
        op: LogicalOp,
        children: Vec<Predicate>,
    },
}

impl Predicate {
    pub fn render(&self, root: &str) -> String {
        match self {
            Self::Compare { column, op, param } => {
                format!("{} {} :{}", column.render(root), op.symbol(), param)
            }
            Self::In {
                column,
                negated,
                params,
            } => {
                let list: Vec<String> = params.iter().map(|p| format!(":{}", p)).collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", column.render(root), op, list.join(", "))
            }
            Self::Between {
                column,
                negated,
                low,
                high,
            } => {
                let op = if *negated { "NOT BETWEEN" } else { "BETWEEN" };
                format!("{} {} :{} AND :{}", column.render(root), op, low, high)
            }
            Self::Like {
                column,
                negated,
                case_insensitive,
                param,
            } => {
                let op = if *negated { "NOT LIKE" } else { "LIKE" };
                if *case_insensitive {
                    format!(
                        "unaccent(lower({})) {} unaccent(lower(:{}))",
                        column.render(root),
                        op,
                        param
                    )
                } else {
                    format!("unaccent({}) {} unaccent(:{})", column.render(root), op, param)
                }
            }
            Self::Null { column, negated } => {
                let op = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("({} {})", column.render(root), op)
            }
            Self::GeoNear {
                column,
                negated,
                longitude,
                latitude,
                radius,
            } => {
                let op = if *negated { "<>" } else { "=" };
                format!(
                    "ST_DWithin({}, ST_MakePoint(:{},:{}), :{}) {} TRUE",
                    column.render(root),
                    longitude,
                    latitude,
                    radius,
                    op
                )
            }
            Self::Group { op, children } => {
                let parts: Vec<String> = children.iter().map(|c| c.render(root)).collect();
                format!("({})", parts.join(format!(" {} ", op.as_str()).as_str()))
            }
        }
    }

    /// Names of every parameter referenced, in render order
    pub fn param_names(&self) -> Vec<&str> {
        match self {
            Self::Compare { param, .. } | Self::Like { param, .. } => vec![param.as_str()],
            Self::In { params, .. } => params.iter().map(String::as_str).collect(),
            Self::Between { low, high, .. } => vec![low.as_str(), high.as_str()],
            Self::Null { .. } => Vec::new(),
            Self::GeoNear {
                longitude,
                latitude,
                radius,
                ..
            } => vec![longitude.as_str(), latitude.as_str(), radius.as_str()],
            Self::Group { children, .. } => children.iter().flat_map(|c| c.param_names()).collect(),
        }
    }
}

/// Correlated sub-selection behind a `#sq:<n>` placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubSelect {
    pub token: String,
    pub alias: String,
    /// Relation walked from the root entity
    pub path: String,
    /// Property selected on the related entity
    pub member: String,
}

impl SubSelect {
    pub fn new(index: usize, path: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            token: format!("#sq:{}", index),
            alias: format!("sq{}", index),
            path: path.into(),
            member: member.into(),
        }
    }
}

/// Rendered text plus everything the execution layer needs to run it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedQuery {
    pub dql: String,
    pub params: ParamTable,
    pub offset: u64,
    pub limit: Option<u64>,
}

/// Compiled query, immutable once built
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub(crate) entity_class: String,
    pub(crate) metadata_class: Option<String>,
    pub(crate) select_properties: Vec<String>,
    pub(crate) select_metadata: Vec<String>,
    pub(crate) sub_selects: Vec<SubSelect>,
    pub(crate) joins: Vec<JoinFragment>,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) combinator: LogicalOp,
    pub(crate) order: Vec<OrderBy>,
    pub(crate) offset: Option<u64>,
    pub(crate) page: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) keyword: Option<String>,
    pub(crate) permissions: Vec<String>,
    pub(crate) seals: Vec<u64>,
    pub(crate) params: ParamTable,
    pub(crate) subquery_root: String,
}

impl QueryPlan {
    pub fn entity_class(&self) -> &str {
        &self.entity_class
    }

    pub fn select_properties(&self) -> &[String] {
        &self.select_properties
    }

    pub fn select_metadata(&self) -> &[String] {
        &self.select_metadata
    }

    pub fn sub_selects(&self) -> &[SubSelect] {
        &self.sub_selects
    }

    pub fn joins(&self) -> &[JoinFragment] {
        &self.joins
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Operator combining the top-level filter predicates
    pub fn combinator(&self) -> LogicalOp {
        self.combinator
    }

    pub fn order(&self) -> &[OrderBy] {
        &self.order
    }

    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref()
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn seals(&self) -> &[u64] {
        &self.seals
    }

    pub fn params(&self) -> &ParamTable {
        &self.params
    }

    pub fn page(&self) -> Option<u64> {
        self.page
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Explicit offset wins, else `limit * (page - 1)` for page > 1, else 0
    pub fn offset(&self) -> u64 {
        if let Some(offset) = self.offset {
            return offset;
        }
        match (self.page, self.limit) {
            (Some(page), Some(limit)) if page > 1 => limit.saturating_mul(page - 1),
            _ => 0,
        }
    }

    pub fn find_dql(&self) -> String {
        let columns: Vec<String> = self
            .select_properties
            .iter()
            .map(|p| format!("{}.{}", ROOT_ALIAS, p))
            .collect();

        let mut dql = format!(
            "SELECT\n\t{}\n{}",
            columns.join(", "),
            self.render_body(ROOT_ALIAS)
        );
        if !self.order.is_empty() {
            let order: Vec<String> = self.order.iter().map(|o| o.to_dql(ROOT_ALIAS)).collect();
            dql.push_str(&format!("\nORDER BY {}", order.join(", ")));
        }
        dql
    }

    pub fn count_dql(&self) -> String {
        format!(
            "SELECT\n\tCOUNT({}.id)\n{}",
            ROOT_ALIAS,
            self.render_body(ROOT_ALIAS)
        )
    }

    /// Same filter selecting `prop`, re-rooted on the plan's fresh alias.
    /// Used as a nested list of values matching this plan.
    pub fn subquery_dql(&self, prop: &str) -> QueryResult<String> {
        if !is_identifier(prop) {
            return Err(QueryError::invalid_argument(
                prop,
                "sub-query property must be an identifier",
            ));
        }
        Ok(self.render_subquery(prop))
    }

    /// Correlated query resolving one sub-select placeholder.
    /// Rows are `(parent, value)` pairs for every entity matching the plan.
    pub fn sub_select_dql(&self, token: &str) -> Option<String> {
        let sub = self.sub_selects.iter().find(|s| s.token == token)?;
        Some(format!(
            "SELECT\n\t{root}.id AS parent, {alias}.{member} AS value\nFROM {class} {root}\n\tJOIN {root}.{path} {alias}\nWHERE\n\t{root}.id IN ({ids})",
            root = ROOT_ALIAS,
            alias = sub.alias,
            member = sub.member,
            class = self.entity_class,
            path = sub.path,
            ids = self.render_subquery("id"),
        ))
    }

    /// Query fetching the selected metadata of every matching entity
    pub fn metadata_dql(&self) -> Option<String> {
        let class = self.metadata_class.as_ref()?;
        if self.select_metadata.is_empty() {
            return None;
        }
        let keys: Vec<String> = self.select_metadata.iter().map(|k| quote_literal(k)).collect();
        Some(format!(
            "SELECT\n\tIDENTITY(m.owner) AS id, m.key, m.value\nFROM {} m\nWHERE\n\tm.key IN ({}) AND\n\tm.owner IN ({})",
            class,
            keys.join(", "),
            self.render_subquery("id"),
        ))
    }

    pub fn find(&self) -> RenderedQuery {
        RenderedQuery {
            dql: self.find_dql(),
            params: self.params.clone(),
            offset: self.offset(),
            limit: self.limit,
        }
    }

    pub fn count(&self) -> RenderedQuery {
        RenderedQuery {
            dql: self.count_dql(),
            params: self.params.clone(),
            offset: 0,
            limit: None,
        }
    }

    /// Find query for a single row
    pub fn find_one(&self) -> RenderedQuery {
        RenderedQuery {
            dql: self.find_dql(),
            params: self.params.clone(),
            offset: 0,
            limit: Some(1),
        }
    }

    fn render_subquery(&self, prop: &str) -> String {
        let root = self.subquery_root.as_str();
        format!("SELECT\n\t{}.{}\n{}", root, prop, self.render_body(root))
    }

    /// `FROM`, joins and `WHERE`, rendered against `root`
    fn render_body(&self, root: &str) -> String {
        let mut dql = format!("FROM {} {}", self.entity_class, root);
        for join in &self.joins {
            dql.push_str("\n\t");
            dql.push_str(&join.render(root));
        }
        if let Some(filter) = self.render_where(root) {
            dql.push_str("\nWHERE\n\t");
            dql.push_str(&filter);
        }
        dql
    }

    fn render_where(&self, root: &str) -> Option<String> {
        if self.predicates.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.predicates.iter().map(|p| p.render(root)).collect();
        Some(parts.join(format!(" {}\n\t", self.combinator.as_str()).as_str()))
    }
}

/// DQL string literal with embedded quotes doubled
fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
