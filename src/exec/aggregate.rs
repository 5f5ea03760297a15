//! # Aggregation Executor
//!
//! Hash aggregation: `init` drains the child into a map keyed by the
//! encoded group-by values; `next` emits one row per group, group-by
//! columns first.
//!
//! Accumulator identities and null handling:
//!
//! | aggregate | identity | null inputs        |
//! |-----------|----------|--------------------|
//! | COUNT(*)  | 0        | counted            |
//! | COUNT     | NULL     | skipped            |
//! | SUM       | NULL     | skipped            |
//! | MIN/MAX   | NULL     | skipped            |
//!
//! With no input rows and no group-by keys, exactly one row is emitted
//! holding the identities (COUNT(*) → 0, the rest → NULL). With
//! group-by keys, empty input emits nothing.
//!
//! `init` clears prior state: a correlated subquery re-initializes this
//! operator once per outer row.

use eyre::{ensure, Result};
use hashbrown::HashMap;

use crate::exec::executor::{synthetic_rid, Executor};
use crate::exec::plan::{AggregationPlan, AggregationType};
use crate::table::{Rid, Tuple};
use crate::types::{Schema, Value};

/// Per-group accumulators, one slot per aggregate expression.
fn initial_accumulators(plan: &AggregationPlan<'_>) -> Vec<Value> {
    plan.aggregates
        .iter()
        .map(|agg| match agg.kind {
            AggregationType::CountStar => Value::Int(0),
            _ => Value::Null,
        })
        .collect()
}

fn combine(kind: AggregationType, acc: &mut Value, input: Value) {
    match kind {
        AggregationType::CountStar => {
            if let Value::Int(n) = acc {
                *n += 1;
            }
        }
        AggregationType::Count => {
            if !input.is_null() {
                match acc {
                    Value::Int(n) => *n += 1,
                    _ => *acc = Value::Int(1),
                }
            }
        }
        AggregationType::Sum => {
            if !input.is_null() {
                *acc = match (&*acc, &input) {
                    (Value::Null, _) => input,
                    (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
                    (Value::Float(a), Value::Float(b)) => Value::Float(a + b),
                    (Value::Int(a), Value::Float(b)) => Value::Float(*a as f64 + b),
                    (Value::Float(a), Value::Int(b)) => Value::Float(a + *b as f64),
                    _ => acc.clone(),
                };
            }
        }
        AggregationType::Min => {
            if !input.is_null()
                && (acc.is_null() || input.compare(acc) == std::cmp::Ordering::Less)
            {
                *acc = input;
            }
        }
        AggregationType::Max => {
            if !input.is_null()
                && (acc.is_null() || input.compare(acc) == std::cmp::Ordering::Greater)
            {
                *acc = input;
            }
        }
    }
}

pub struct AggregationExecutor<'a> {
    plan: &'a AggregationPlan<'a>,
    child: Box<dyn Executor<'a> + 'a>,
    groups: HashMap<Vec<u8>, (Vec<Value>, Vec<Value>)>,
    results: Option<std::vec::IntoIter<(Vec<Value>, Vec<Value>)>>,
    had_groups: bool,
    emitted_identity_row: bool,
}

impl<'a> AggregationExecutor<'a> {
    pub fn new(plan: &'a AggregationPlan<'a>, child: Box<dyn Executor<'a> + 'a>) -> Self {
        Self {
            plan,
            child,
            groups: HashMap::new(),
            results: None,
            had_groups: false,
            emitted_identity_row: false,
        }
    }
}

impl<'a> Executor<'a> for AggregationExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.groups.clear();
        self.results = None;
        self.emitted_identity_row = false;
        self.child.init()?;

        let child_schema = self.child.output_schema();
        while let Some((tuple, _)) = self.child.next()? {
            let mut key_values = Vec::with_capacity(self.plan.group_bys.len());
            let mut key = Vec::new();
            for expr in self.plan.group_bys {
                let v = expr.evaluate(&tuple, child_schema)?;
                v.encode_into(&mut key);
                key_values.push(v);
            }

            let entry = self
                .groups
                .entry(key)
                .or_insert_with(|| (key_values, initial_accumulators(self.plan)));
            for (slot, agg) in self.plan.aggregates.iter().enumerate() {
                let input = agg.expr.evaluate(&tuple, child_schema)?;
                combine(agg.kind, &mut entry.1[slot], input);
            }
        }

        let rows: Vec<_> = self.groups.drain().map(|(_, v)| v).collect();
        self.had_groups = !rows.is_empty();
        self.results = Some(rows.into_iter());
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let results = self.results.as_mut().expect("init before next");
        if let Some((group_values, accumulators)) = results.next() {
            ensure!(
                group_values.len() + accumulators.len() == self.plan.schema.column_count(),
                "aggregation output arity mismatch"
            );
            let mut values = group_values;
            values.extend(accumulators);
            return Ok(Some((
                Tuple::from_values(&values, self.plan.schema)?,
                synthetic_rid(),
            )));
        }

        // No groups at all: a grand aggregate over empty input emits one
        // identity row; a grouped aggregate emits nothing.
        if self.plan.group_bys.is_empty() && !self.had_groups && !self.emitted_identity_row {
            self.emitted_identity_row = true;
            let values = initial_accumulators(self.plan);
            if !values.is_empty() {
                return Ok(Some((
                    Tuple::from_values(&values, self.plan.schema)?,
                    synthetic_rid(),
                )));
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}
