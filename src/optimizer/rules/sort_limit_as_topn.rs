//! # Sort + Limit → Top-N
//!
//! Matches `Limit(Sort(child))` and fuses the pair into a `TopN` node,
//! which keeps only `limit` rows in memory instead of materializing and
//! sorting the full input.

use bumpalo::Bump;
use eyre::Result;

use crate::exec::plan::{PlanNode, TopNPlan};
use crate::optimizer::{rewrite_children, OptimizationRule};

pub struct SortLimitAsTopNRule;

impl OptimizationRule for SortLimitAsTopNRule {
    fn name(&self) -> &'static str {
        "sort_limit_as_topn"
    }

    fn apply<'a>(
        &self,
        plan: &'a PlanNode<'a>,
        arena: &'a Bump,
    ) -> Result<Option<&'a PlanNode<'a>>> {
        let (node, child_changed) =
            rewrite_children(plan, arena, &mut |p, a| self.apply(p, a))?;

        if let PlanNode::Limit(limit) = node {
            if let PlanNode::Sort(sort) = limit.child {
                return Ok(Some(arena.alloc(PlanNode::TopN(TopNPlan {
                    child: sort.child,
                    order_bys: sort.order_bys,
                    n: limit.limit,
                    schema: limit.schema,
                }))));
            }
        }

        if child_changed {
            return Ok(Some(arena.alloc(node)));
        }
        Ok(None)
    }
}
