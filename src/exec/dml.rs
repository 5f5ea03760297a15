//! # Write Executors
//!
//! Insert, update, and delete. Each drains its child, applies the
//! mutation row by row, maintains every secondary index of the target
//! table, and then emits a single row holding the affected-row count —
//! or nothing at all when the count is zero.
//!
//! ## MVCC bookkeeping
//!
//! Mutations stamp rows with the running transaction's tagged id; commit
//! later replaces the stamp with a real commit timestamp. Deletes and
//! updates first push an undo log restoring the prior version and hook
//! it into the rid's chain, so concurrent readers at older snapshots
//! keep seeing the row they started with.
//!
//! Index maintenance failures (a duplicate key on insert) are fatal to
//! the query; partial side effects remain — there is no rollback here.

use std::sync::Arc;

use eyre::{ensure, Result};

use crate::catalog::{IndexInfo, TableInfo};
use crate::exec::context::ExecutorContext;
use crate::exec::executor::{synthetic_rid, Executor};
use crate::exec::plan::{DeletePlan, InsertPlan, UpdatePlan};
use crate::mvcc::UndoLog;
use crate::table::{Rid, Tuple, TupleMeta};
use crate::types::{Schema, Value};

fn emit_count<'a>(count: usize, schema: &'a Schema) -> Result<Option<(Tuple, Rid)>> {
    if count == 0 {
        return Ok(None);
    }
    let tuple = Tuple::from_values(&[Value::Int(count as i64)], schema)?;
    Ok(Some((tuple, synthetic_rid())))
}

fn resolve_table(
    ctx: &ExecutorContext,
    table_oid: u32,
) -> Result<(Arc<TableInfo>, Vec<Arc<IndexInfo>>)> {
    let table = ctx
        .catalog
        .get_table(table_oid)
        .ok_or_else(|| eyre::eyre!("table oid {} not in catalog", table_oid))?;
    let indexes = ctx.catalog.get_table_indexes(&table.name);
    Ok((table, indexes))
}

pub struct InsertExecutor<'a> {
    plan: &'a InsertPlan<'a>,
    ctx: &'a ExecutorContext,
    child: Box<dyn Executor<'a> + 'a>,
    table: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    done: bool,
}

impl<'a> InsertExecutor<'a> {
    pub fn new(
        plan: &'a InsertPlan<'a>,
        ctx: &'a ExecutorContext,
        child: Box<dyn Executor<'a> + 'a>,
    ) -> Result<Self> {
        let (table, indexes) = resolve_table(ctx, plan.table_oid)?;
        Ok(Self {
            plan,
            ctx,
            child,
            table,
            indexes,
            done: false,
        })
    }
}

impl<'a> Executor<'a> for InsertExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.done = false;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut count = 0usize;
        while let Some((tuple, _)) = self.child.next()? {
            let values = tuple.values(&self.table.schema)?;
            let meta = TupleMeta::new(self.ctx.txn.id(), false);
            let rid = self.table.heap.insert_tuple(meta, tuple);
            self.ctx.txn.record_write(&self.table.heap, rid);

            for index in &self.indexes {
                let key = &values[index.index.key_attrs()[0]];
                ensure!(
                    index.index.insert_entry(key, rid)?,
                    "duplicate key {} for index {}",
                    key,
                    index.name
                );
            }
            count += 1;
        }
        emit_count(count, self.plan.schema)
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}

pub struct DeleteExecutor<'a> {
    plan: &'a DeletePlan<'a>,
    ctx: &'a ExecutorContext,
    child: Box<dyn Executor<'a> + 'a>,
    table: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    done: bool,
}

impl<'a> DeleteExecutor<'a> {
    pub fn new(
        plan: &'a DeletePlan<'a>,
        ctx: &'a ExecutorContext,
        child: Box<dyn Executor<'a> + 'a>,
    ) -> Result<Self> {
        let (table, indexes) = resolve_table(ctx, plan.table_oid)?;
        Ok(Self {
            plan,
            ctx,
            child,
            table,
            indexes,
            done: false,
        })
    }
}

impl<'a> Executor<'a> for DeleteExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.done = false;
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let schema = &self.table.schema;
        let mut count = 0usize;
        while let Some((tuple, rid)) = self.child.next()? {
            let old_meta = self.table.heap.get_tuple_meta(rid)?;
            let old_values = tuple.values(schema)?;

            // Preserve the prior version for older snapshots, unless the
            // row is already this transaction's own uncommitted write.
            if old_meta.ts != self.ctx.txn.id() {
                let log = UndoLog::full(
                    schema,
                    &old_values,
                    old_meta.ts,
                    old_meta.is_deleted,
                    self.ctx.txn_mgr.get_undo_link(rid),
                )?;
                let link = self.ctx.txn.append_undo_log(log);
                self.ctx.txn_mgr.set_undo_link(rid, link);
                self.ctx.txn.record_write(&self.table.heap, rid);
            }

            self.table
                .heap
                .update_tuple_meta(TupleMeta::new(self.ctx.txn.id(), true), rid)?;

            for index in &self.indexes {
                let key = &old_values[index.index.key_attrs()[0]];
                index.index.delete_entry(key, rid)?;
            }
            count += 1;
        }
        emit_count(count, self.plan.schema)
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}

pub struct UpdateExecutor<'a> {
    plan: &'a UpdatePlan<'a>,
    ctx: &'a ExecutorContext,
    child: Box<dyn Executor<'a> + 'a>,
    table: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    done: bool,
}

impl<'a> UpdateExecutor<'a> {
    pub fn new(
        plan: &'a UpdatePlan<'a>,
        ctx: &'a ExecutorContext,
        child: Box<dyn Executor<'a> + 'a>,
    ) -> Result<Self> {
        let (table, indexes) = resolve_table(ctx, plan.table_oid)?;
        ensure!(
            plan.target_exprs.len() == table.schema.column_count(),
            "update target arity {} does not match table arity {}",
            plan.target_exprs.len(),
            table.schema.column_count()
        );
        Ok(Self {
            plan,
            ctx,
            child,
            table,
            indexes,
            done: false,
        })
    }
}

impl<'a> Executor<'a> for UpdateExecutor<'a> {
    fn init(&mut self) -> Result<()> {
        self.done = false;
        self.child.init()
    }

    /// A logical delete of the old row followed by an insert of the
    /// recomputed one; this operator owns the index ordering (old key
    /// out, new key in, per row).
    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let schema = &self.table.schema;
        let mut count = 0usize;
        while let Some((tuple, rid)) = self.child.next()? {
            let old_meta = self.table.heap.get_tuple_meta(rid)?;
            let old_values = tuple.values(schema)?;
            let new_values = self
                .plan
                .target_exprs
                .iter()
                .map(|e| e.evaluate(&tuple, schema))
                .collect::<Result<Vec<_>>>()?;

            if old_meta.ts != self.ctx.txn.id() {
                let log = UndoLog::full(
                    schema,
                    &old_values,
                    old_meta.ts,
                    old_meta.is_deleted,
                    self.ctx.txn_mgr.get_undo_link(rid),
                )?;
                let link = self.ctx.txn.append_undo_log(log);
                self.ctx.txn_mgr.set_undo_link(rid, link);
                self.ctx.txn.record_write(&self.table.heap, rid);
            }

            // Logical delete of the old image.
            self.table
                .heap
                .update_tuple_meta(TupleMeta::new(self.ctx.txn.id(), true), rid)?;

            // Insert of the recomputed row.
            let new_tuple = Tuple::from_values(&new_values, schema)?;
            let new_rid = self
                .table
                .heap
                .insert_tuple(TupleMeta::new(self.ctx.txn.id(), false), new_tuple);
            self.ctx.txn.record_write(&self.table.heap, new_rid);

            for index in &self.indexes {
                let attr = index.index.key_attrs()[0];
                index.index.delete_entry(&old_values[attr], rid)?;
                ensure!(
                    index.index.insert_entry(&new_values[attr], new_rid)?,
                    "duplicate key {} for index {}",
                    new_values[attr],
                    index.name
                );
            }
            count += 1;
        }
        emit_count(count, self.plan.schema)
    }

    fn output_schema(&self) -> &'a Schema {
        self.plan.schema
    }
}
