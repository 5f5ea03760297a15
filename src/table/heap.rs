//! # Table Heap
//!
//! Slot-addressed row storage: appends assign monotonically increasing
//! slots, deletes flip the tuple's metadata, updates rewrite in place.
//! Rows never move, so a rid stays valid for the table's lifetime.
//!
//! Readers and writers share a `parking_lot::RwLock`; iteration snapshots
//! the row count at creation so a scan is stable against concurrent
//! appends (it will simply not see them).

use std::sync::Arc;

use eyre::Result;
use parking_lot::RwLock;

use crate::table::{Rid, Tuple, TupleMeta};

pub struct TableHeap {
    rows: RwLock<Vec<(TupleMeta, Tuple)>>,
}

impl Default for TableHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl TableHeap {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Appends a row and returns its rid.
    pub fn insert_tuple(&self, meta: TupleMeta, tuple: Tuple) -> Rid {
        let mut rows = self.rows.write();
        let slot = rows.len() as u32;
        rows.push((meta, tuple));
        Rid::new(0, slot)
    }

    pub fn get_tuple(&self, rid: Rid) -> Result<(TupleMeta, Tuple)> {
        let rows = self.rows.read();
        let (meta, tuple) = rows
            .get(rid.slot as usize)
            .ok_or_else(|| eyre::eyre!("rid {} not in table", rid))?;
        Ok((*meta, Tuple::from_bytes(tuple.data().to_vec())))
    }

    pub fn get_tuple_meta(&self, rid: Rid) -> Result<TupleMeta> {
        let rows = self.rows.read();
        rows.get(rid.slot as usize)
            .map(|(meta, _)| *meta)
            .ok_or_else(|| eyre::eyre!("rid {} not in table", rid))
    }

    pub fn update_tuple_meta(&self, meta: TupleMeta, rid: Rid) -> Result<()> {
        let mut rows = self.rows.write();
        let row = rows
            .get_mut(rid.slot as usize)
            .ok_or_else(|| eyre::eyre!("rid {} not in table", rid))?;
        row.0 = meta;
        Ok(())
    }

    /// Rewrites a row in place, metadata and bytes together.
    pub fn update_tuple_in_place(&self, meta: TupleMeta, tuple: Tuple, rid: Rid) -> Result<()> {
        let mut rows = self.rows.write();
        let row = rows
            .get_mut(rid.slot as usize)
            .ok_or_else(|| eyre::eyre!("rid {} not in table", rid))?;
        *row = (meta, tuple);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterator over the rows present when it was created.
    pub fn iter(self: &Arc<Self>) -> TableIter {
        TableIter {
            heap: Arc::clone(self),
            next_slot: 0,
            stop: self.len() as u32,
        }
    }
}

pub struct TableIter {
    heap: Arc<TableHeap>,
    next_slot: u32,
    stop: u32,
}

impl TableIter {
    /// Yields the next row, deleted or not; filtering is the scan
    /// executor's job.
    pub fn next_row(&mut self) -> Result<Option<(Rid, TupleMeta, Tuple)>> {
        if self.next_slot >= self.stop {
            return Ok(None);
        }
        let rid = Rid::new(0, self.next_slot);
        self.next_slot += 1;
        let (meta, tuple) = self.heap.get_tuple(rid)?;
        Ok(Some((rid, meta, tuple)))
    }
}
