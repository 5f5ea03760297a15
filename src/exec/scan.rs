//! # Scan Executors
//!
//! Sequential scan with the MVCC read path, and the single-probe index
//! scan.
//!
//! ## Sequential scan visibility
//!
//! For each heap row, in order:
//!
//! 1. `ts <= read_ts`: the version committed before our snapshot — yield
//!    it (unless deleted).
//! 2. `ts` tagged with bit 63 and naming *us*: our own uncommitted write
//!    — yield it (unless we deleted it).
//! 3. Otherwise the heap version is too new: walk the undo chain,
//!    accumulating logs until one restores a version with
//!    `ts <= read_ts`, then reconstruct. Chain timestamps decrease
//!    monotonically, so the walk is bounded; running out of chain means
//!    the row did not exist for us — skip it.
//!
//! ## Index scan
//!
//! Probes one key, fetches base tuples by rid, and skips deleted rows.
//! It reads the latest committed location only — no version
//! reconstruction on this path.

use std::collections::VecDeque;
use std::sync::Arc;

use eyre::Result;
use smallvec::SmallVec;

use crate::catalog::TableInfo;
use crate::exec::context::ExecutorContext;
use crate::exec::executor::Executor;
use crate::exec::expression::Expression;
use crate::exec::plan::{IndexScanPlan, SeqScanPlan};
use crate::index::HashIndex;
use crate::mvcc::{reconstruct_tuple, UndoLog};
use crate::table::{Rid, TableIter, Tuple};
use crate::types::Schema;

pub struct SeqScanExecutor<'a> {
    plan: &'a SeqScanPlan<'a>,
    ctx: &'a ExecutorContext,
    table: Arc<TableInfo>,
    iter: Option<TableIter>,
}

impl<'a> SeqScanExecutor<'a> {
    pub fn new(plan: &'a SeqScanPlan<'a>, ctx: &'a ExecutorContext) -> Result<Self> {
        let table = ctx
            .catalog
            .get_table(plan.table_oid)
            .ok_or_else(|| eyre::eyre!("table oid {} not in catalog", plan.table_oid))?;
        Ok(Self {
            plan,
            ctx,
            table,
            iter: None,
        })
    }

    /// Resolves the version of a heap row visible to this transaction.
    fn visible_version(
        &self,
        rid: Rid,
        meta: crate::table::TupleMeta,
        tuple: Tuple,
    ) -> Result<Option<Tuple>> {
        let read_ts = self.ctx.txn.read_ts();

        if meta.ts <= read_ts || (meta.is_uncommitted() && meta.ts == self.ctx.txn.id()) {
            if meta.is_deleted {
                return Ok(None);
            }
            return Ok(Some(tuple));
        }

        // Too new for our snapshot: collect undo logs down to read_ts.
        let mut logs: SmallVec<[UndoLog; 4]> = SmallVec::new();
        let mut link = self.ctx.txn_mgr.get_undo_link(rid);
        let mut reached_snapshot = false;
        while let Some(l) = link {
            let log = self.ctx.txn_mgr.get_undo_log(l)?;
            link = log.prev_version;
            let log_ts = log.ts;
            logs.push(log);
            if log_ts <= read_ts {
                reached_snapshot = true;
                break;
            }
        }
        if !reached_snapshot {
            // The chain ended above our snapshot: the row did not exist
            // yet as far as we are concerned.
            return Ok(None);
        }
        reconstruct_tuple(&self.table.schema, &tuple, meta, &logs)
    }
}

impl<'a> Executor<'a> for SeqScanExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.iter = Some(self.table.heap.iter());
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        loop {
            // Re-borrow per iteration: the visibility walk below needs
            // shared access to the executor.
            let row = self
                .iter
                .as_mut()
                .expect("init before next")
                .next_row()?;
            let Some((rid, meta, tuple)) = row else {
                return Ok(None);
            };
            let Some(visible) = self.visible_version(rid, meta, tuple)? else {
                continue;
            };
            if let Some(filter) = self.plan.filter {
                let keep = filter.evaluate(&visible, &self.table.schema)?;
                if !Expression::is_true(&keep) {
                    continue;
                }
            }
            return Ok(Some((visible, rid)));
        }
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}

pub struct IndexScanExecutor<'a> {
    plan: &'a IndexScanPlan<'a>,
    table: Arc<TableInfo>,
    index: Arc<HashIndex>,
    rids: VecDeque<Rid>,
}

impl<'a> IndexScanExecutor<'a> {
    pub fn new(plan: &'a IndexScanPlan<'a>, ctx: &'a ExecutorContext) -> Result<Self> {
        let table = ctx
            .catalog
            .get_table(plan.table_oid)
            .ok_or_else(|| eyre::eyre!("table oid {} not in catalog", plan.table_oid))?;
        let index = ctx
            .catalog
            .get_index(plan.index_oid)
            .ok_or_else(|| eyre::eyre!("index oid {} not in catalog", plan.index_oid))?;
        Ok(Self {
            plan,
            table,
            index: Arc::clone(&index.index),
            rids: VecDeque::new(),
        })
    }
}

impl<'a> Executor<'a> for IndexScanExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        let key = self.plan.probe.to_value();
        self.rids = self.index.scan_key(&key)?.into();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        while let Some(rid) = self.rids.pop_front() {
            let (meta, tuple) = self.table.heap.get_tuple(rid)?;
            if meta.is_deleted {
                continue;
            }
            if let Some(filter) = self.plan.filter {
                let keep = filter.evaluate(&tuple, &self.table.schema)?;
                if !Expression::is_true(&keep) {
                    continue;
                }
            }
            return Ok(Some((tuple, rid)));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}
