//! Predicate compilation
//!
//! Walks a parsed `FilterNode` against one resolved column and binds every
//! operand as a parameter. Logical groups recurse against the same column.

use super::parser::{FilterNode, Literal, OpKind};
use super::plan::{ColumnRef, CompareOp, Predicate};
use super::values::{ParamTable, ValueResolver};

pub struct PredicateCompiler<'a, 'p> {
    values: &'a ValueResolver<'a>,
    params: &'p mut ParamTable,
}

impl<'a, 'p> PredicateCompiler<'a, 'p> {
    pub fn new(values: &'a ValueResolver<'a>, params: &'p mut ParamTable) -> Self {
        Self { values, params }
    }

    pub fn compile(&mut self, column: &ColumnRef, node: &FilterNode) -> Predicate {
        match node {
            // group negation has no effect
            FilterNode::Logical { op, children, .. } => Predicate::Group {
                op: *op,
                children: children
                    .iter()
                    .map(|child| self.compile(column, child))
                    .collect(),
            },
            FilterNode::Comparison { op, negated, args } => {
                self.compile_comparison(column, *op, *negated, args)
            }
        }
    }

    fn compile_comparison(
        &mut self,
        column: &ColumnRef,
        op: OpKind,
        negated: bool,
        args: &[Literal],
    ) -> Predicate {
        let column = column.clone();
        match op {
            OpKind::Eq | OpKind::Gt | OpKind::Gte | OpKind::Lt | OpKind::Lte => {
                let base = match op {
                    OpKind::Gt => CompareOp::Gt,
                    OpKind::Gte => CompareOp::Gte,
                    OpKind::Lt => CompareOp::Lt,
                    OpKind::Lte => CompareOp::Lte,
                    _ => CompareOp::Eq,
                };
                Predicate::Compare {
                    column,
                    op: if negated { base.negate() } else { base },
                    param: self.bind_first(args),
                }
            }
            OpKind::Like | OpKind::Ilike => Predicate::Like {
                column,
                negated,
                case_insensitive: op == OpKind::Ilike,
                param: self.bind_first(args),
            },
            OpKind::In => Predicate::In {
                column,
                negated,
                params: self.bind_all(args),
            },
            OpKind::Bet => {
                let mut bound = self.bind_all(args).into_iter();
                let low = bound.next().unwrap_or_default();
                let high = bound.next().unwrap_or_default();
                Predicate::Between {
                    column,
                    negated,
                    low,
                    high,
                }
            }
            OpKind::Null => Predicate::Null { column, negated },
            OpKind::GeoNear => {
                let mut bound = self.bind_all(args).into_iter();
                let longitude = bound.next().unwrap_or_default();
                let latitude = bound.next().unwrap_or_default();
                let radius = bound.next().unwrap_or_default();
                Predicate::GeoNear {
                    column,
                    negated,
                    longitude,
                    latitude,
                    radius,
                }
            }
        }
    }

    /// Each element is resolved on its own
    fn bind_all(&mut self, args: &[Literal]) -> Vec<String> {
        args.iter()
            .map(|arg| self.values.bind(self.params, arg))
            .collect()
    }

    fn bind_first(&mut self, args: &[Literal]) -> String {
        match args.first() {
            Some(arg) => self.values.bind(self.params, arg),
            None => self
                .values
                .bind(self.params, &Literal::Scalar(String::new())),
        }
    }
}
