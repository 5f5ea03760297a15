//! # Executor Trait & Simple Operators
//!
//! The pull (Volcano) interface every operator implements, the builder
//! that turns a plan tree into an executor tree, and the operators thin
//! enough not to earn their own file: filter, projection, limit, values.
//!
//! `init` prepares or *re*-prepares state: parents re-initialize
//! children (a nested-loop join restarts its right side once per left
//! row), so every operator must tolerate repeated `init` calls.

use eyre::Result;

use crate::config::INVALID_PAGE_ID;
use crate::exec::aggregate::AggregationExecutor;
use crate::exec::context::ExecutorContext;
use crate::exec::dml::{DeleteExecutor, InsertExecutor, UpdateExecutor};
use crate::exec::expression::Expression;
use crate::exec::join::{HashJoinExecutor, NestedLoopJoinExecutor};
use crate::exec::plan::{FilterPlan, LimitPlan, PlanNode, ProjectionPlan, ValuesPlan};
use crate::exec::scan::{IndexScanExecutor, SeqScanExecutor};
use crate::exec::sort::{SortExecutor, TopNExecutor};
use crate::table::{Rid, Tuple};
use crate::types::Schema;

pub trait Executor<'a> {
    /// Prepares (or resets) operator state. Must be callable repeatedly.
    fn init(&mut self) -> Result<()>;

    /// Produces the next row, or `None` at exhaustion.
    fn next(&mut self) -> Result<Option<(Tuple, Rid)>>;

    fn output_schema(&self) -> &'a Schema;
}

/// Rid for rows that have no storage location (projections, joins,
/// aggregates, constant rows).
pub fn synthetic_rid() -> Rid {
    Rid::new(INVALID_PAGE_ID, 0)
}

/// Recursively builds the executor tree for `plan`.
pub fn build_executor<'a>(
    plan: &'a PlanNode<'a>,
    ctx: &'a ExecutorContext,
) -> Result<Box<dyn Executor<'a> + 'a>> {
    Ok(match plan {
        PlanNode::SeqScan(p) => Box::new(SeqScanExecutor::new(p, ctx)?),
        PlanNode::IndexScan(p) => Box::new(IndexScanExecutor::new(p, ctx)?),
        PlanNode::Filter(p) => Box::new(FilterExecutor {
            plan: p,
            child: build_executor(p.child, ctx)?,
        }),
        PlanNode::Projection(p) => Box::new(ProjectionExecutor {
            plan: p,
            child: build_executor(p.child, ctx)?,
        }),
        PlanNode::Limit(p) => Box::new(LimitExecutor {
            plan: p,
            child: build_executor(p.child, ctx)?,
            yielded: 0,
        }),
        PlanNode::Aggregation(p) => Box::new(AggregationExecutor::new(
            p,
            build_executor(p.child, ctx)?,
        )),
        PlanNode::NestedLoopJoin(p) => Box::new(NestedLoopJoinExecutor::new(
            p,
            build_executor(p.left, ctx)?,
            build_executor(p.right, ctx)?,
        )),
        PlanNode::HashJoin(p) => Box::new(HashJoinExecutor::new(
            p,
            build_executor(p.left, ctx)?,
            build_executor(p.right, ctx)?,
        )),
        PlanNode::Sort(p) => Box::new(SortExecutor::new(p, build_executor(p.child, ctx)?)),
        PlanNode::TopN(p) => Box::new(TopNExecutor::new(p, build_executor(p.child, ctx)?)),
        PlanNode::Values(p) => Box::new(ValuesExecutor { plan: p, cursor: 0 }),
        PlanNode::Insert(p) => {
            Box::new(InsertExecutor::new(p, ctx, build_executor(p.child, ctx)?)?)
        }
        PlanNode::Update(p) => {
            Box::new(UpdateExecutor::new(p, ctx, build_executor(p.child, ctx)?)?)
        }
        PlanNode::Delete(p) => {
            Box::new(DeleteExecutor::new(p, ctx, build_executor(p.child, ctx)?)?)
        }
    })
}

/// Drives an executor to exhaustion and collects its output. Test and
/// tooling convenience.
pub fn collect<'a>(executor: &mut dyn Executor<'a>) -> Result<Vec<(Tuple, Rid)>> {
    executor.init()?;
    let mut rows = Vec::new();
    while let Some(row) = executor.next()? {
        rows.push(row);
    }
    Ok(rows)
}

pub struct FilterExecutor<'a> {
    plan: &'a FilterPlan<'a>,
    child: Box<dyn Executor<'a> + 'a>,
}

impl<'a> Executor<'a> for FilterExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        while let Some((tuple, rid)) = self.child.next()? {
            let keep = self
                .plan
                .predicate
                .evaluate(&tuple, self.child.output_schema())?;
            if Expression::is_true(&keep) {
                return Ok(Some((tuple, rid)));
            }
        }
        Ok(None)
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}

pub struct ProjectionExecutor<'a> {
    plan: &'a ProjectionPlan<'a>,
    child: Box<dyn Executor<'a> + 'a>,
}

impl<'a> Executor<'a> for ProjectionExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some((tuple, rid)) = self.child.next()? else {
            return Ok(None);
        };
        let schema = self.child.output_schema();
        let values = self
            .plan
            .exprs
            .iter()
            .map(|e| e.evaluate(&tuple, schema))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some((Tuple::from_values(&values, self.plan.schema)?, rid)))
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}

pub struct LimitExecutor<'a> {
    plan: &'a LimitPlan<'a>,
    child: Box<dyn Executor<'a> + 'a>,
    yielded: usize,
}

impl<'a> Executor<'a> for LimitExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.yielded = 0;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.yielded >= self.plan.limit {
            return Ok(None);
        }
        match self.child.next()? {
            Some(row) => {
                self.yielded += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}

pub struct ValuesExecutor<'a> {
    plan: &'a ValuesPlan<'a>,
    cursor: usize,
}

impl<'a> Executor<'a> for ValuesExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some(row) = self.plan.rows.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let values: Vec<_> = row.iter().map(|c| c.to_value()).collect();
        Ok(Some((
            Tuple::from_values(&values, self.plan.schema)?,
            synthetic_rid(),
        )))
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}
