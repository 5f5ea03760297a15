//! # NLJ → Hash-Join
//!
//! Matches a nested-loop join whose predicate is a single column
//! equality between the two sides, or an AND-tree of such equalities.
//! Collects the per-side key expressions with their pairing preserved
//! across conjuncts; operands written right-side-first
//! (`B.y = A.x`) are swapped into place. Any non-equality comparison,
//! non-column operand, or same-side equality aborts the rewrite.
//!
//! The emitted key expressions are re-based to tuple index 0: each side
//! of a hash join evaluates its keys against its own input.

use bumpalo::Bump;
use eyre::Result;

use crate::exec::expression::{ComparisonOp, Expression, LogicOp};
use crate::exec::plan::{HashJoinPlan, PlanNode};
use crate::optimizer::{rewrite_children, OptimizationRule};

pub struct NljAsHashJoinRule;

/// Walks an AND-tree of equi-conditions, pushing paired key
/// expressions. Returns false as soon as any conjunct disqualifies.
fn collect_equi_conjuncts<'a>(
    expr: &'a Expression<'a>,
    arena: &'a Bump,
    left_keys: &mut Vec<&'a Expression<'a>>,
    right_keys: &mut Vec<&'a Expression<'a>>,
) -> bool {
    match expr {
        Expression::Logic {
            op: LogicOp::And,
            left,
            right,
        } => {
            collect_equi_conjuncts(left, arena, left_keys, right_keys)
                && collect_equi_conjuncts(right, arena, left_keys, right_keys)
        }
        Expression::Comparison {
            op: ComparisonOp::Equal,
            left:
                Expression::ColumnValue {
                    tuple_idx: lt,
                    col_idx: lc,
                    type_id: lty,
                },
            right:
                Expression::ColumnValue {
                    tuple_idx: rt,
                    col_idx: rc,
                    type_id: rty,
                },
        } => match (lt, rt) {
            (0, 1) => {
                left_keys.push(Expression::column(arena, 0, *lc, *lty));
                right_keys.push(Expression::column(arena, 0, *rc, *rty));
                true
            }
            (1, 0) => {
                left_keys.push(Expression::column(arena, 0, *rc, *rty));
                right_keys.push(Expression::column(arena, 0, *lc, *lty));
                true
            }
            _ => false,
        },
        _ => false,
    }
}

impl OptimizationRule for NljAsHashJoinRule {
    fn name(&self) -> &'static str {
        "nlj_as_hash_join"
    }

    fn apply<'a>(
        &self,
        plan: &'a PlanNode<'a>,
        arena: &'a Bump,
    ) -> Result<Option<&'a PlanNode<'a>>> {
        let (node, child_changed) =
            rewrite_children(plan, arena, &mut |p, a| self.apply(p, a))?;

        if let PlanNode::NestedLoopJoin(nlj) = node {
            let mut left_keys = Vec::new();
            let mut right_keys = Vec::new();
            if collect_equi_conjuncts(nlj.predicate, arena, &mut left_keys, &mut right_keys)
                && !left_keys.is_empty()
            {
                return Ok(Some(arena.alloc(PlanNode::HashJoin(HashJoinPlan {
                    left: nlj.left,
                    right: nlj.right,
                    left_keys: arena.alloc_slice_copy(&left_keys),
                    right_keys: arena.alloc_slice_copy(&right_keys),
                    join_type: nlj.join_type,
                    schema: nlj.schema,
                }))));
            }
        }

        if child_changed {
            return Ok(Some(arena.alloc(node)));
        }
        Ok(None)
    }
}
