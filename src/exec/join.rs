//! # Join Executors
//!
//! Nested-loop join (the fallback for arbitrary predicates) and hash
//! join (equi-joins, produced by the optimizer). Both support INNER and
//! LEFT joins only; LEFT pads unmatched left rows with NULLs for every
//! right column.
//!
//! ## Nested loop
//!
//! One left row at a time; the right child restarts (`init`) for each.
//! State is `(left_eof, current_left, left_matched)`, with transitions
//! on right-child exhaustion.
//!
//! ## Hash join
//!
//! `init` drains the right (build) side into a map keyed by the encoded
//! join-key values; `next` probes with each left row, so output is
//! left-driven. A key containing NULL matches nothing, per SQL equality.

use eyre::Result;
use hashbrown::HashMap;

use crate::exec::executor::{synthetic_rid, Executor};
use crate::exec::expression::Expression;
use crate::exec::plan::{HashJoinPlan, JoinType, NestedLoopJoinPlan};
use crate::table::{Rid, Tuple};
use crate::types::{Schema, Value};

fn join_row<'a>(
    left_values: &[Value],
    right_values: &[Value],
    schema: &'a Schema,
) -> Result<(Tuple, Rid)> {
    let mut values = Vec::with_capacity(left_values.len() + right_values.len());
    values.extend_from_slice(left_values);
    values.extend_from_slice(right_values);
    Ok((Tuple::from_values(&values, schema)?, synthetic_rid()))
}

fn null_padded<'a>(
    left_values: &[Value],
    right_arity: usize,
    schema: &'a Schema,
) -> Result<(Tuple, Rid)> {
    let nulls = vec![Value::Null; right_arity];
    join_row(left_values, &nulls, schema)
}

pub struct NestedLoopJoinExecutor<'a> {
    plan: &'a NestedLoopJoinPlan<'a>,
    left: Box<dyn Executor<'a> + 'a>,
    right: Box<dyn Executor<'a> + 'a>,
    left_tuple: Option<Tuple>,
    left_matched: bool,
    left_eof: bool,
}

impl<'a> NestedLoopJoinExecutor<'a> {
    pub fn new(
        plan: &'a NestedLoopJoinPlan<'a>,
        left: Box<dyn Executor<'a> + 'a>,
        right: Box<dyn Executor<'a> + 'a>,
    ) -> Self {
        Self {
            plan,
            left,
            right,
            left_tuple: None,
            left_matched: false,
            left_eof: false,
        }
    }
}

impl<'a> Executor<'a> for NestedLoopJoinExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.right.init()?;
        self.left_matched = false;
        self.left_eof = false;
        self.left_tuple = match self.left.next()? {
            Some((t, _)) => Some(t),
            None => {
                self.left_eof = true;
                None
            }
        };
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        loop {
            if self.left_eof {
                return Ok(None);
            }
            match self.right.next()? {
                Some((right_tuple, _)) => {
                    let left_tuple = self.left_tuple.as_ref().expect("left row while not eof");
                    let keep = self.plan.predicate.evaluate_join(
                        left_tuple,
                        self.left.output_schema(),
                        &right_tuple,
                        self.right.output_schema(),
                    )?;
                    if !Expression::is_true(&keep) {
                        continue;
                    }
                    self.left_matched = true;
                    let lv = left_tuple.values(self.left.output_schema())?;
                    let rv = right_tuple.values(self.right.output_schema())?;
                    return Ok(Some(join_row(&lv, &rv, self.plan.schema)?));
                }
                None => {
                    // Right side exhausted for the current left row.
                    let old_matched = self.left_matched;
                    let old_left = self.left_tuple.take();

                    match self.left.next()? {
                        Some((t, _)) => {
                            self.left_tuple = Some(t);
                            self.left_matched = false;
                            self.right.init()?;
                        }
                        None => self.left_eof = true,
                    }

                    if self.plan.join_type == JoinType::Left && !old_matched {
                        if let Some(left_tuple) = old_left {
                            let lv = left_tuple.values(self.left.output_schema())?;
                            let right_arity = self.right.output_schema().column_count();
                            return Ok(Some(null_padded(&lv, right_arity, self.plan.schema)?));
                        }
                    }
                }
            }
        }
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}

pub struct HashJoinExecutor<'a> {
    plan: &'a HashJoinPlan<'a>,
    left: Box<dyn Executor<'a> + 'a>,
    right: Box<dyn Executor<'a> + 'a>,
    /// Build side: encoded key → right-row values.
    build: HashMap<Vec<u8>, Vec<Vec<Value>>>,
    /// Matches still to emit for the current probe row.
    pending: Vec<Vec<Value>>,
    pending_pos: usize,
    current_left: Option<Vec<Value>>,
}

impl<'a> HashJoinExecutor<'a> {
    pub fn new(
        plan: &'a HashJoinPlan<'a>,
        left: Box<dyn Executor<'a> + 'a>,
        right: Box<dyn Executor<'a> + 'a>,
    ) -> Self {
        Self {
            plan,
            left,
            right,
            build: HashMap::new(),
            pending: Vec::new(),
            pending_pos: 0,
            current_left: None,
        }
    }

    /// Encodes the join key for one row; `None` when any key part is
    /// NULL (NULL joins nothing).
    fn encode_key(
        tuple: &Tuple,
        schema: &Schema,
        exprs: &[&Expression<'_>],
    ) -> Result<Option<Vec<u8>>> {
        let mut key = Vec::new();
        for expr in exprs {
            let v = expr.evaluate(tuple, schema)?;
            if v.is_null() {
                return Ok(None);
            }
            v.encode_into(&mut key);
        }
        Ok(Some(key))
    }
}

impl<'a> Executor<'a> for HashJoinExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.left.init()?;
        self.right.init()?;
        self.build.clear();
        self.pending.clear();
        self.pending_pos = 0;
        self.current_left = None;

        let right_schema = self.right.output_schema();
        while let Some((tuple, _)) = self.right.next()? {
            if let Some(key) = Self::encode_key(&tuple, right_schema, self.plan.right_keys)? {
                let values = tuple.values(right_schema)?;
                self.build.entry(key).or_default().push(values);
            }
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        loop {
            if self.pending_pos < self.pending.len() {
                let rv = &self.pending[self.pending_pos];
                self.pending_pos += 1;
                let lv = self.current_left.as_ref().expect("probe row while pending");
                return Ok(Some(join_row(lv, rv, self.plan.schema)?));
            }

            let Some((tuple, _)) = self.left.next()? else {
                return Ok(None);
            };
            let left_schema = self.left.output_schema();
            let lv = tuple.values(left_schema)?;
            let key = Self::encode_key(&tuple, left_schema, self.plan.left_keys)?;

            let matches = key.and_then(|k| self.build.get(&k));
            match matches {
                Some(rows) if !rows.is_empty() => {
                    self.pending = rows.clone();
                    self.pending_pos = 0;
                    self.current_left = Some(lv);
                }
                _ => {
                    if self.plan.join_type == JoinType::Left {
                        let right_arity = self.right.output_schema().column_count();
                        return Ok(Some(null_padded(&lv, right_arity, self.plan.schema)?));
                    }
                }
            }
        }
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}
