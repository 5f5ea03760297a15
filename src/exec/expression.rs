//! # Expression Trees
//!
//! Arena-allocated expression nodes: column references, constants,
//! comparisons, and boolean connectives. Nodes are `Copy` and reference
//! children through `&'a` arena pointers, so whole trees share one
//! `bumpalo::Bump` with the plan that owns them and no node needs a
//! destructor.
//!
//! Evaluation follows SQL three-valued logic: comparisons against NULL
//! yield NULL, `AND`/`OR` propagate UNKNOWN, and predicates treat
//! anything other than `true` as a non-match.

use bumpalo::Bump;
use eyre::{ensure, Result};

use crate::table::Tuple;
use crate::types::{Schema, TypeId, Value};

/// Plan-time constant. Text borrows from the plan arena so the node
/// stays `Copy` and drop-free.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(&'a str),
}

impl ConstValue<'_> {
    pub fn to_value(self) -> Value {
        match self {
            ConstValue::Null => Value::Null,
            ConstValue::Bool(b) => Value::Bool(b),
            ConstValue::Int(i) => Value::Int(i),
            ConstValue::Float(f) => Value::Float(f),
            ConstValue::Text(s) => Value::Text(s.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy)]
pub enum Expression<'a> {
    /// Column `col_idx` of tuple `tuple_idx` (0 = left/only input,
    /// 1 = right input of a join).
    ColumnValue {
        tuple_idx: usize,
        col_idx: usize,
        type_id: TypeId,
    },
    Constant(ConstValue<'a>),
    Comparison {
        op: ComparisonOp,
        left: &'a Expression<'a>,
        right: &'a Expression<'a>,
    },
    Logic {
        op: LogicOp,
        left: &'a Expression<'a>,
        right: &'a Expression<'a>,
    },
}

impl<'a> Expression<'a> {
    pub fn column(
        arena: &'a Bump,
        tuple_idx: usize,
        col_idx: usize,
        type_id: TypeId,
    ) -> &'a Expression<'a> {
        arena.alloc(Expression::ColumnValue {
            tuple_idx,
            col_idx,
            type_id,
        })
    }

    pub fn constant(arena: &'a Bump, value: ConstValue<'a>) -> &'a Expression<'a> {
        arena.alloc(Expression::Constant(value))
    }

    pub fn comparison(
        arena: &'a Bump,
        op: ComparisonOp,
        left: &'a Expression<'a>,
        right: &'a Expression<'a>,
    ) -> &'a Expression<'a> {
        arena.alloc(Expression::Comparison { op, left, right })
    }

    pub fn logic(
        arena: &'a Bump,
        op: LogicOp,
        left: &'a Expression<'a>,
        right: &'a Expression<'a>,
    ) -> &'a Expression<'a> {
        arena.alloc(Expression::Logic { op, left, right })
    }

    /// Evaluates against a single input row.
    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> Result<Value> {
        match self {
            Expression::ColumnValue {
                tuple_idx, col_idx, ..
            } => {
                ensure!(
                    *tuple_idx == 0,
                    "column references tuple {} in a single-input context",
                    tuple_idx
                );
                tuple.value_at(schema, *col_idx)
            }
            Expression::Constant(c) => Ok(c.to_value()),
            Expression::Comparison { op, left, right } => {
                let l = left.evaluate(tuple, schema)?;
                let r = right.evaluate(tuple, schema)?;
                Ok(compare(*op, &l, &r))
            }
            Expression::Logic { op, left, right } => {
                let l = left.evaluate(tuple, schema)?;
                let r = right.evaluate(tuple, schema)?;
                Ok(connect(*op, &l, &r))
            }
        }
    }

    /// Evaluates against a pair of join inputs.
    pub fn evaluate_join(
        &self,
        left_tuple: &Tuple,
        left_schema: &Schema,
        right_tuple: &Tuple,
        right_schema: &Schema,
    ) -> Result<Value> {
        match self {
            Expression::ColumnValue {
                tuple_idx, col_idx, ..
            } => match tuple_idx {
                0 => left_tuple.value_at(left_schema, *col_idx),
                1 => right_tuple.value_at(right_schema, *col_idx),
                other => eyre::bail!("join column references tuple {}", other),
            },
            Expression::Constant(c) => Ok(c.to_value()),
            Expression::Comparison { op, left, right } => {
                let l = left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema)?;
                let r = right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema)?;
                Ok(compare(*op, &l, &r))
            }
            Expression::Logic { op, left, right } => {
                let l = left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema)?;
                let r = right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema)?;
                Ok(connect(*op, &l, &r))
            }
        }
    }

    /// True only when the value is exactly `true`; `false` and NULL both
    /// reject.
    pub fn is_true(value: &Value) -> bool {
        matches!(value, Value::Bool(true))
    }
}

fn compare(op: ComparisonOp, l: &Value, r: &Value) -> Value {
    let Some(ord) = l.sql_cmp(r) else {
        return Value::Null;
    };
    use std::cmp::Ordering::*;
    let result = match op {
        ComparisonOp::Equal => ord == Equal,
        ComparisonOp::NotEqual => ord != Equal,
        ComparisonOp::LessThan => ord == Less,
        ComparisonOp::LessThanOrEqual => ord != Greater,
        ComparisonOp::GreaterThan => ord == Greater,
        ComparisonOp::GreaterThanOrEqual => ord != Less,
    };
    Value::Bool(result)
}

/// Three-valued AND/OR.
fn connect(op: LogicOp, l: &Value, r: &Value) -> Value {
    let l = l.as_bool();
    let r = r.as_bool();
    match op {
        LogicOp::And => match (l, r) {
            (Some(false), _) | (_, Some(false)) => Value::Bool(false),
            (Some(true), Some(true)) => Value::Bool(true),
            _ => Value::Null,
        },
        LogicOp::Or => match (l, r) {
            (Some(true), _) | (_, Some(true)) => Value::Bool(true),
            (Some(false), Some(false)) => Value::Bool(false),
            _ => Value::Null,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("a", TypeId::Int),
            Column::new("b", TypeId::Int),
        ])
    }

    fn row(a: i64, b: i64) -> Tuple {
        Tuple::from_values(&[Value::Int(a), Value::Int(b)], &schema()).unwrap()
    }

    #[test]
    fn comparison_evaluates_against_row() {
        let arena = Bump::new();
        let pred = Expression::comparison(
            &arena,
            ComparisonOp::Equal,
            Expression::column(&arena, 0, 0, TypeId::Int),
            Expression::constant(&arena, ConstValue::Int(5)),
        );
        assert_eq!(
            pred.evaluate(&row(5, 0), &schema()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            pred.evaluate(&row(6, 0), &schema()).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn null_comparison_is_unknown() {
        let arena = Bump::new();
        let pred = Expression::comparison(
            &arena,
            ComparisonOp::LessThan,
            Expression::column(&arena, 0, 0, TypeId::Int),
            Expression::constant(&arena, ConstValue::Null),
        );
        let out = pred.evaluate(&row(1, 2), &schema()).unwrap();
        assert!(out.is_null());
        assert!(!Expression::is_true(&out));
    }

    #[test]
    fn three_valued_logic() {
        let arena = Bump::new();
        let t = Expression::constant(&arena, ConstValue::Bool(true));
        let f = Expression::constant(&arena, ConstValue::Bool(false));
        let n = Expression::constant(&arena, ConstValue::Null);
        let s = schema();
        let r = row(0, 0);

        let and_fn = Expression::logic(&arena, LogicOp::And, f, n);
        assert_eq!(and_fn.evaluate(&r, &s).unwrap(), Value::Bool(false));

        let and_tn = Expression::logic(&arena, LogicOp::And, t, n);
        assert!(and_tn.evaluate(&r, &s).unwrap().is_null());

        let or_tn = Expression::logic(&arena, LogicOp::Or, t, n);
        assert_eq!(or_tn.evaluate(&r, &s).unwrap(), Value::Bool(true));

        let or_fn = Expression::logic(&arena, LogicOp::Or, f, n);
        assert!(or_fn.evaluate(&r, &s).unwrap().is_null());
    }

    #[test]
    fn join_evaluation_routes_by_tuple_index() {
        let arena = Bump::new();
        let pred = Expression::comparison(
            &arena,
            ComparisonOp::Equal,
            Expression::column(&arena, 0, 1, TypeId::Int),
            Expression::column(&arena, 1, 0, TypeId::Int),
        );
        let s = schema();
        let out = pred
            .evaluate_join(&row(1, 7), &s, &row(7, 9), &s)
            .unwrap();
        assert_eq!(out, Value::Bool(true));
    }
}
