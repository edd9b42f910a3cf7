//! Filter expression parsing
//!
//! Parses the right-hand side of one `key=EXPR` pair into a `FilterNode`.
//!
//! ```text
//! expr := "!"? NAME "(" args ")"
//! ```
//!
//! `NAME` is case-insensitive. Text after the closing parenthesis is ignored.

use std::sync::OnceLock;

use regex::Regex;

use super::error::{QueryError, QueryResult};
use super::splitter::{matching_close, split};

/// Comparison operators of the filter language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    In,
    Bet,
    Null,
    GeoNear,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Gt => "GT",
            Self::Gte => "GTE",
            Self::Lt => "LT",
            Self::Lte => "LTE",
            Self::Like => "LIKE",
            Self::Ilike => "ILIKE",
            Self::In => "IN",
            Self::Bet => "BET",
            Self::Null => "NULL",
            Self::GeoNear => "GEONEAR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

enum Operator {
    Comparison(OpKind),
    Logical(LogicalOp),
}

impl Operator {
    fn from_name(name: &str) -> Option<Self> {
        let op = match name.to_ascii_uppercase().as_str() {
            "AND" => Self::Logical(LogicalOp::And),
            "OR" => Self::Logical(LogicalOp::Or),
            "EQ" => Self::Comparison(OpKind::Eq),
            "GT" => Self::Comparison(OpKind::Gt),
            "GTE" => Self::Comparison(OpKind::Gte),
            "LT" => Self::Comparison(OpKind::Lt),
            "LTE" => Self::Comparison(OpKind::Lte),
            "LIKE" => Self::Comparison(OpKind::Like),
            "ILIKE" => Self::Comparison(OpKind::Ilike),
            "IN" => Self::Comparison(OpKind::In),
            "BET" => Self::Comparison(OpKind::Bet),
            "NULL" => Self::Comparison(OpKind::Null),
            "GEONEAR" => Self::Comparison(OpKind::GeoNear),
            _ => return None,
        };
        Some(op)
    }
}

/// Operand of a comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Used verbatim
    Scalar(String),
    /// `@me`
    CurrentUser,
    /// `@me.<prop>`
    CurrentUserProperty(String),
    /// `@profile`
    CurrentUserProfile,
    /// `@<kind>:<id>`
    Lookup { kind: String, id: u64 },
    /// Any other `@` directive; binds null
    Unresolvable(String),
}

impl Literal {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if trimmed == "@me" {
            return Self::CurrentUser;
        }
        if let Some(prop) = trimmed.strip_prefix("@me.") {
            return Self::CurrentUserProperty(prop.to_string());
        }
        if trimmed == "@profile" {
            return Self::CurrentUserProfile;
        }
        if let Some(caps) = lookup_regex().captures(trimmed) {
            return match caps[2].parse::<u64>() {
                Ok(id) => Self::Lookup {
                    kind: caps[1].to_string(),
                    id,
                },
                Err(_) => Self::Unresolvable(trimmed.to_string()),
            };
        }
        if trimmed.starts_with('@') {
            return Self::Unresolvable(trimmed.to_string());
        }

        Self::Scalar(raw.to_string())
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self, Self::Scalar(_))
    }
}

/// Parsed filter expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterNode {
    Comparison {
        op: OpKind,
        negated: bool,
        args: Vec<Literal>,
    },
    /// Negation of a group is recorded but has no effect when compiled
    Logical {
        op: LogicalOp,
        negated: bool,
        children: Vec<FilterNode>,
    },
}

/// Longest accepted right-hand side, checked before parsing
pub const MAX_EXPRESSION_SIZE: usize = 64 * 1024;

/// Deepest accepted nesting of `AND`/`OR` groups
pub const MAX_EXPRESSION_DEPTH: usize = 32;

fn head_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^ *(!)?([A-Za-z]+) *\(").expect("Invalid regex"))
}

fn lookup_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^@(\w+) *: *(\d+)$").expect("Invalid regex"))
}

/// Parse `expr`, reporting failures against filter `key`
pub fn parse_expression(key: &str, expr: &str) -> QueryResult<FilterNode> {
    if expr.len() > MAX_EXPRESSION_SIZE {
        return Err(QueryError::invalid_argument(
            key,
            format!(
                "expression exceeds maximum size of {} bytes",
                MAX_EXPRESSION_SIZE
            ),
        ));
    }
    parse_nested(key, expr, 1)
}

fn parse_nested(key: &str, expr: &str, depth: usize) -> QueryResult<FilterNode> {
    let invalid = || QueryError::invalid_expression(key, expr);

    let caps = head_regex().captures(expr).ok_or_else(invalid)?;
    let negated = caps.get(1).is_some();
    let name = &caps[2];
    let open = caps.get(0).ok_or_else(invalid)?.end() - 1;
    let close = matching_close(expr, open).ok_or_else(invalid)?;
    let inner = &expr[open + 1..close];

    let op = Operator::from_name(name).ok_or_else(invalid)?;

    match op {
        Operator::Logical(op) => {
            if depth >= MAX_EXPRESSION_DEPTH {
                return Err(QueryError::invalid_argument(
                    key,
                    format!(
                        "expression nesting exceeds {} levels",
                        MAX_EXPRESSION_DEPTH
                    ),
                ));
            }
            let children = split(inner)
                .iter()
                .map(|sub| parse_nested(key, sub, depth + 1))
                .collect::<QueryResult<Vec<_>>>()?;
            if children.is_empty() {
                return Err(QueryError::invalid_argument(
                    key,
                    format!("expression {} expects at least one expression", op.as_str()),
                ));
            }
            Ok(FilterNode::Logical {
                op,
                negated,
                children,
            })
        }
        Operator::Comparison(op) => {
            let args = parse_args(key, op, inner)?;
            Ok(FilterNode::Comparison { op, negated, args })
        }
    }
}

fn parse_args(key: &str, op: OpKind, inner: &str) -> QueryResult<Vec<Literal>> {
    let args = match op {
        OpKind::Eq | OpKind::Gt | OpKind::Gte | OpKind::Lt | OpKind::Lte => {
            vec![Literal::parse(inner)]
        }
        OpKind::Like | OpKind::Ilike => vec![Literal::parse(&inner.replace('*', "%"))],
        OpKind::Null => Vec::new(),
        OpKind::In => {
            let values = split(inner);
            if values.is_empty() {
                return Err(QueryError::invalid_argument(
                    key,
                    "expression IN expects at least one value",
                ));
            }
            values.iter().map(|v| Literal::parse(v)).collect()
        }
        OpKind::Bet => {
            let values = split(inner);
            if values.len() != 2 {
                return Err(QueryError::invalid_argument(
                    key,
                    "expression BET expects 2 arguments",
                ));
            }
            if values.iter().any(|v| v.starts_with('@')) {
                return Err(QueryError::invalid_argument(
                    key,
                    "expression BET expects 2 string or integer arguments",
                ));
            }
            values.iter().map(|v| Literal::Scalar(v.clone())).collect()
        }
        OpKind::GeoNear => {
            let values = split(inner);
            if values.len() != 3 {
                return Err(QueryError::invalid_argument(
                    key,
                    "expression GEONEAR expects 3 arguments: longitude, latitude and radius in meters",
                ));
            }
            values.iter().map(|v| Literal::parse(v)).collect()
        }
    };
    Ok(args)
}
