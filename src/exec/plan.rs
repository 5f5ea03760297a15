//! # Plan Trees
//!
//! Physical plan nodes as the executors and optimizer see them. Plans
//! arrive already built (there is no SQL front end); tests and the
//! optimizer construct them directly in a `bumpalo` arena, the same way
//! expressions are built.
//!
//! Every node exposes its output schema; schemas are owned outside the
//! arena and borrowed for the plan's lifetime.

use crate::catalog::{IndexOid, TableOid};
use crate::exec::expression::{ConstValue, Expression};
use crate::types::Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

/// Sort direction of one order-by key. `Default` and `Invalid` sort
/// descending, matching the engine this design descends from; see the
/// comparator in the sort executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByType {
    Invalid,
    Default,
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

#[derive(Clone, Copy)]
pub struct OrderBy<'a> {
    pub order_type: OrderByType,
    pub expr: &'a Expression<'a>,
}

#[derive(Clone, Copy)]
pub struct AggregateExpr<'a> {
    pub kind: AggregationType,
    pub expr: &'a Expression<'a>,
}

#[derive(Clone, Copy)]
pub struct SeqScanPlan<'a> {
    pub table_oid: TableOid,
    pub schema: &'a Schema,
    pub filter: Option<&'a Expression<'a>>,
}

#[derive(Clone, Copy)]
pub struct IndexScanPlan<'a> {
    pub table_oid: TableOid,
    pub index_oid: IndexOid,
    pub schema: &'a Schema,
    /// The single equality probe value.
    pub probe: ConstValue<'a>,
    /// The original filter, kept for re-checking.
    pub filter: Option<&'a Expression<'a>>,
}

#[derive(Clone, Copy)]
pub struct FilterPlan<'a> {
    pub child: &'a PlanNode<'a>,
    pub predicate: &'a Expression<'a>,
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct ProjectionPlan<'a> {
    pub child: &'a PlanNode<'a>,
    pub exprs: &'a [&'a Expression<'a>],
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct LimitPlan<'a> {
    pub child: &'a PlanNode<'a>,
    pub limit: usize,
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct AggregationPlan<'a> {
    pub child: &'a PlanNode<'a>,
    pub group_bys: &'a [&'a Expression<'a>],
    pub aggregates: &'a [AggregateExpr<'a>],
    /// Group-by columns first, one column per aggregate after.
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct NestedLoopJoinPlan<'a> {
    pub left: &'a PlanNode<'a>,
    pub right: &'a PlanNode<'a>,
    pub predicate: &'a Expression<'a>,
    pub join_type: JoinType,
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct HashJoinPlan<'a> {
    pub left: &'a PlanNode<'a>,
    pub right: &'a PlanNode<'a>,
    /// Key expressions over the left input, paired positionally with
    /// `right_keys`.
    pub left_keys: &'a [&'a Expression<'a>],
    pub right_keys: &'a [&'a Expression<'a>],
    pub join_type: JoinType,
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct SortPlan<'a> {
    pub child: &'a PlanNode<'a>,
    pub order_bys: &'a [OrderBy<'a>],
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct TopNPlan<'a> {
    pub child: &'a PlanNode<'a>,
    pub order_bys: &'a [OrderBy<'a>],
    pub n: usize,
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct ValuesPlan<'a> {
    pub rows: &'a [&'a [ConstValue<'a>]],
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct InsertPlan<'a> {
    pub child: &'a PlanNode<'a>,
    pub table_oid: TableOid,
    /// Single integer column: rows inserted.
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct UpdatePlan<'a> {
    pub child: &'a PlanNode<'a>,
    pub table_oid: TableOid,
    /// One expression per table column, evaluated against the old row.
    pub target_exprs: &'a [&'a Expression<'a>],
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub struct DeletePlan<'a> {
    pub child: &'a PlanNode<'a>,
    pub table_oid: TableOid,
    pub schema: &'a Schema,
}

#[derive(Clone, Copy)]
pub enum PlanNode<'a> {
    SeqScan(SeqScanPlan<'a>),
    IndexScan(IndexScanPlan<'a>),
    Filter(FilterPlan<'a>),
    Projection(ProjectionPlan<'a>),
    Limit(LimitPlan<'a>),
    Aggregation(AggregationPlan<'a>),
    NestedLoopJoin(NestedLoopJoinPlan<'a>),
    HashJoin(HashJoinPlan<'a>),
    Sort(SortPlan<'a>),
    TopN(TopNPlan<'a>),
    Values(ValuesPlan<'a>),
    Insert(InsertPlan<'a>),
    Update(UpdatePlan<'a>),
    Delete(DeletePlan<'a>),
}

impl<'a> PlanNode<'a> {
    pub fn output_schema(&self) -> &'a Schema {
        match self {
            PlanNode::SeqScan(p) => p.schema,
            PlanNode::IndexScan(p) => p.schema,
            PlanNode::Filter(p) => p.schema,
            PlanNode::Projection(p) => p.schema,
            PlanNode::Limit(p) => p.schema,
            PlanNode::Aggregation(p) => p.schema,
            PlanNode::NestedLoopJoin(p) => p.schema,
            PlanNode::HashJoin(p) => p.schema,
            PlanNode::Sort(p) => p.schema,
            PlanNode::TopN(p) => p.schema,
            PlanNode::Values(p) => p.schema,
            PlanNode::Insert(p) => p.schema,
            PlanNode::Update(p) => p.schema,
            PlanNode::Delete(p) => p.schema,
        }
    }
}
