//! # Execution Engine
//!
//! Pull-based (Volcano) query execution. A plan tree is lowered to an
//! executor tree; each parent drives its children through repeated
//! `next` calls, so rows stream through the pipeline one at a time
//! except where an operator must materialize (sort, aggregation, hash
//! join build side, top-n's bounded heap).
//!
//! ```text
//! build_executor(plan, ctx)
//!     └── Limit
//!           └── Sort            (materializes)
//!                 └── Filter
//!                       └── SeqScan ── table heap + undo chains
//! ```
//!
//! Plans and expressions live in a `bumpalo` arena (see [`plan`] and
//! [`expression`]); executors borrow them for the query's lifetime.

mod aggregate;
mod context;
mod dml;
mod executor;
pub mod expression;
mod join;
pub mod plan;
mod scan;
mod sort;

pub use aggregate::AggregationExecutor;
pub use context::ExecutorContext;
pub use dml::{DeleteExecutor, InsertExecutor, UpdateExecutor};
pub use executor::{build_executor, collect, synthetic_rid, Executor};
pub use expression::{ComparisonOp, ConstValue, Expression, LogicOp};
pub use join::{HashJoinExecutor, NestedLoopJoinExecutor};
pub use plan::{
    AggregateExpr, AggregationPlan, AggregationType, DeletePlan, FilterPlan, HashJoinPlan,
    IndexScanPlan, InsertPlan, JoinType, LimitPlan, NestedLoopJoinPlan, OrderBy, OrderByType,
    PlanNode, ProjectionPlan, SeqScanPlan, SortPlan, TopNPlan, UpdatePlan, ValuesPlan,
};
pub use scan::{IndexScanExecutor, SeqScanExecutor};
pub use sort::{SortExecutor, TopNExecutor};
