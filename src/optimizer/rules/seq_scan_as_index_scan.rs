//! # Seq-Scan → Index-Scan
//!
//! Matches a sequential scan whose filter is a single
//! `column == constant` equality, where the target table has an index
//! whose one key column is exactly that column. Anything else — other
//! comparison operators, constant-on-the-left, conjunctions, multi-column
//! indexes — falls through unchanged.

use std::sync::Arc;

use bumpalo::Bump;
use eyre::Result;

use crate::catalog::Catalog;
use crate::exec::expression::{ComparisonOp, Expression};
use crate::exec::plan::{IndexScanPlan, PlanNode};
use crate::optimizer::{rewrite_children, OptimizationRule};

pub struct SeqScanAsIndexScanRule {
    catalog: Arc<Catalog>,
}

impl SeqScanAsIndexScanRule {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

impl OptimizationRule for SeqScanAsIndexScanRule {
    fn name(&self) -> &'static str {
        "seq_scan_as_index_scan"
    }

    fn apply<'a>(
        &self,
        plan: &'a PlanNode<'a>,
        arena: &'a Bump,
    ) -> Result<Option<&'a PlanNode<'a>>> {
        let (node, child_changed) =
            rewrite_children(plan, arena, &mut |p, a| self.apply(p, a))?;

        if let PlanNode::SeqScan(scan) = node {
            if let Some(Expression::Comparison {
                op: ComparisonOp::Equal,
                left: Expression::ColumnValue {
                    tuple_idx: 0,
                    col_idx,
                    ..
                },
                right: Expression::Constant(probe),
            }) = scan.filter
            {
                if let Some(table) = self.catalog.get_table(scan.table_oid) {
                    for index in self.catalog.get_table_indexes(&table.name) {
                        let attrs = index.index.key_attrs();
                        if attrs.len() == 1 && attrs[0] == *col_idx {
                            return Ok(Some(arena.alloc(PlanNode::IndexScan(IndexScanPlan {
                                table_oid: scan.table_oid,
                                index_oid: index.oid,
                                schema: scan.schema,
                                probe: *probe,
                                filter: scan.filter,
                            }))));
                        }
                    }
                }
            }
        }

        if child_changed {
            return Ok(Some(arena.alloc(node)));
        }
        Ok(None)
    }
}
