//! # Query Optimizer
//!
//! Rule-based plan rewrites. Each rule recursively rewrites a plan's
//! children first, then attempts one local pattern match; the driver
//! applies every rule in order until a full pass changes nothing (or the
//! iteration cap is hit).
//!
//! Rules never change observable semantics — they replace an operator
//! with a cheaper equivalent:
//!
//! | rule | match | rewrite |
//! |------|-------|---------|
//! | seq-scan→index-scan | `SeqScan(filter = col == const)` with a matching single-column index | `IndexScan` |
//! | nlj→hash-join | nested-loop join over equi-conjuncts | `HashJoin` |
//! | sort+limit→top-n | `Limit(Sort(child))` | `TopN` |
//!
//! Plans are arena-allocated; rewritten nodes go into the same arena and
//! replaced nodes simply become unreachable.

pub mod rules;

use bumpalo::Bump;
use eyre::Result;
use tracing::debug;

use crate::exec::plan::PlanNode;

pub trait OptimizationRule {
    fn name(&self) -> &'static str;

    /// Returns the rewritten plan, or `None` when nothing matched.
    fn apply<'a>(
        &self,
        plan: &'a PlanNode<'a>,
        arena: &'a Bump,
    ) -> Result<Option<&'a PlanNode<'a>>>;
}

pub struct Optimizer {
    rules: Vec<Box<dyn OptimizationRule + Send + Sync>>,
    max_iterations: usize,
}

impl Optimizer {
    /// The standard rule set. The catalog feeds index selection.
    pub fn new(catalog: std::sync::Arc<crate::catalog::Catalog>) -> Self {
        Self::with_rules(vec![
            Box::new(rules::SeqScanAsIndexScanRule::new(catalog)),
            Box::new(rules::NljAsHashJoinRule),
            Box::new(rules::SortLimitAsTopNRule),
        ])
    }

    pub fn with_rules(rules: Vec<Box<dyn OptimizationRule + Send + Sync>>) -> Self {
        Self {
            rules,
            max_iterations: 10,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn optimize<'a>(
        &self,
        plan: &'a PlanNode<'a>,
        arena: &'a Bump,
    ) -> Result<&'a PlanNode<'a>> {
        let mut current = plan;
        for _ in 0..self.max_iterations {
            let mut changed = false;
            for rule in &self.rules {
                if let Some(rewritten) = rule.apply(current, arena)? {
                    debug!(rule = rule.name(), "optimizer rule applied");
                    current = rewritten;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        Ok(current)
    }

    pub fn add_rule(&mut self, rule: Box<dyn OptimizationRule + Send + Sync>) {
        self.rules.push(rule);
    }
}

/// Copies `plan` with each child passed through `rewrite`; the flag
/// reports whether any child actually changed. Shared by every rule's
/// children-first recursion.
pub(crate) fn rewrite_children<'a>(
    plan: &'a PlanNode<'a>,
    arena: &'a Bump,
    rewrite: &mut dyn FnMut(&'a PlanNode<'a>, &'a Bump) -> Result<Option<&'a PlanNode<'a>>>,
) -> Result<(PlanNode<'a>, bool)> {
    let mut child = |c: &'a PlanNode<'a>, changed: &mut bool| -> Result<&'a PlanNode<'a>> {
        match rewrite(c, arena)? {
            Some(new_child) => {
                *changed = true;
                Ok(new_child)
            }
            None => Ok(c),
        }
    };

    let mut changed = false;
    let node = match *plan {
        PlanNode::SeqScan(p) => PlanNode::SeqScan(p),
        PlanNode::IndexScan(p) => PlanNode::IndexScan(p),
        PlanNode::Values(p) => PlanNode::Values(p),
        PlanNode::Filter(mut p) => {
            p.child = child(p.child, &mut changed)?;
            PlanNode::Filter(p)
        }
        PlanNode::Projection(mut p) => {
            p.child = child(p.child, &mut changed)?;
            PlanNode::Projection(p)
        }
        PlanNode::Limit(mut p) => {
            p.child = child(p.child, &mut changed)?;
            PlanNode::Limit(p)
        }
        PlanNode::Aggregation(mut p) => {
            p.child = child(p.child, &mut changed)?;
            PlanNode::Aggregation(p)
        }
        PlanNode::Sort(mut p) => {
            p.child = child(p.child, &mut changed)?;
            PlanNode::Sort(p)
        }
        PlanNode::TopN(mut p) => {
            p.child = child(p.child, &mut changed)?;
            PlanNode::TopN(p)
        }
        PlanNode::Insert(mut p) => {
            p.child = child(p.child, &mut changed)?;
            PlanNode::Insert(p)
        }
        PlanNode::Update(mut p) => {
            p.child = child(p.child, &mut changed)?;
            PlanNode::Update(p)
        }
        PlanNode::Delete(mut p) => {
            p.child = child(p.child, &mut changed)?;
            PlanNode::Delete(p)
        }
        PlanNode::NestedLoopJoin(mut p) => {
            p.left = child(p.left, &mut changed)?;
            p.right = child(p.right, &mut changed)?;
            PlanNode::NestedLoopJoin(p)
        }
        PlanNode::HashJoin(mut p) => {
            p.left = child(p.left, &mut changed)?;
            p.right = child(p.right, &mut changed)?;
            PlanNode::HashJoin(p)
        }
    };
    Ok((node, changed))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoOpRule;

    impl OptimizationRule for NoOpRule {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn apply<'a>(
            &self,
            _plan: &'a PlanNode<'a>,
            _arena: &'a Bump,
        ) -> Result<Option<&'a PlanNode<'a>>> {
            Ok(None)
        }
    }

    #[test]
    fn noop_rules_leave_the_plan_alone() {
        use crate::exec::plan::SeqScanPlan;
        use crate::types::{Column, Schema, TypeId};

        let arena = Bump::new();
        let schema = Schema::new(vec![Column::new("x", TypeId::Int)]);
        let plan_ref = arena.alloc(PlanNode::SeqScan(SeqScanPlan {
            table_oid: 0,
            schema: &schema,
            filter: None,
        }));

        let optimizer = Optimizer::with_rules(vec![Box::new(NoOpRule)]);
        let out = optimizer.optimize(plan_ref, &arena).unwrap();
        assert!(std::ptr::eq(out, plan_ref as &PlanNode));
    }
}
