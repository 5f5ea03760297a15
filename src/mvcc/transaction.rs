//! # Transaction Manager
//!
//! Allocates timestamps, hands out read snapshots, stores undo logs, and
//! maintains the rid → newest-undo-link table the scan executors walk.
//!
//! ## Timestamps
//!
//! Commit timestamps are small integers from a monotone counter. A
//! transaction's *id* is `TXN_START_ID | n`: bit 63 distinguishes "this
//! tuple is being written by transaction n" from "this tuple committed at
//! ts". Commit replaces the id stamp on every touched tuple with the
//! real commit timestamp.
//!
//! ## Locking
//!
//! The manager's tables sit behind their own mutexes; the watermark has
//! its own, per the coarse-grained locking of the rest of the core.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use eyre::{ensure, Result};
use parking_lot::Mutex;

use crate::config::{Timestamp, TXN_START_ID};
use crate::mvcc::{UndoLink, UndoLog, Watermark};
use crate::table::{Rid, TableHeap};

pub struct Transaction {
    id: Timestamp,
    read_ts: Timestamp,
    undo_logs: Mutex<Vec<UndoLog>>,
    /// Heap rows stamped with this transaction's id, re-stamped at commit.
    write_set: Mutex<Vec<(Arc<TableHeap>, Rid)>>,
}

impl Transaction {
    /// Transaction id, bit 63 set.
    pub fn id(&self) -> Timestamp {
        self.id
    }

    /// Id without the tag bit, for display.
    pub fn id_human(&self) -> Timestamp {
        self.id & !TXN_START_ID
    }

    pub fn read_ts(&self) -> Timestamp {
        self.read_ts
    }

    /// Stores an undo log and returns its link.
    pub fn append_undo_log(&self, log: UndoLog) -> UndoLink {
        let mut logs = self.undo_logs.lock();
        let idx = logs.len();
        logs.push(log);
        UndoLink {
            prev_txn: self.id,
            prev_log_idx: idx,
        }
    }

    pub fn record_write(&self, heap: &Arc<TableHeap>, rid: Rid) {
        self.write_set.lock().push((Arc::clone(heap), rid));
    }
}

pub struct TransactionManager {
    next_txn_id: AtomicU64,
    last_commit_ts: AtomicU64,
    /// Serializes commits so timestamp allocation and tuple stamping are
    /// atomic with respect to each other.
    commit_lock: Mutex<()>,
    txn_map: Mutex<HashMap<Timestamp, Arc<Transaction>>>,
    /// rid → newest undo link.
    version_info: Mutex<HashMap<Rid, UndoLink>>,
    watermark: Mutex<Watermark>,
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionManager {
    pub fn new() -> Self {
        Self {
            next_txn_id: AtomicU64::new(1),
            last_commit_ts: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
            txn_map: Mutex::new(HashMap::new()),
            version_info: Mutex::new(HashMap::new()),
            watermark: Mutex::new(Watermark::new(0)),
        }
    }

    /// Starts a transaction reading at the latest commit timestamp.
    pub fn begin(&self) -> Result<Arc<Transaction>> {
        // Taking the commit lock pins last_commit_ts while the snapshot
        // registers, so the watermark baseline cannot move underneath.
        let _serialized = self.commit_lock.lock();
        let id = TXN_START_ID | self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let read_ts = self.last_commit_ts.load(Ordering::SeqCst);
        let txn = Arc::new(Transaction {
            id,
            read_ts,
            undo_logs: Mutex::new(Vec::new()),
            write_set: Mutex::new(Vec::new()),
        });
        self.watermark.lock().add_txn(read_ts)?;
        self.txn_map.lock().insert(id, Arc::clone(&txn));
        Ok(txn)
    }

    /// Commits: stamps every written tuple with the new commit timestamp
    /// and retires the read snapshot.
    pub fn commit(&self, txn: &Arc<Transaction>) -> Result<Timestamp> {
        let _serialized = self.commit_lock.lock();
        let commit_ts = self.last_commit_ts.load(Ordering::SeqCst) + 1;

        for (heap, rid) in txn.write_set.lock().iter() {
            let mut meta = heap.get_tuple_meta(*rid)?;
            ensure!(
                meta.ts == txn.id(),
                "tuple {} not stamped by committing transaction",
                rid
            );
            meta.ts = commit_ts;
            heap.update_tuple_meta(meta, *rid)?;
        }

        self.last_commit_ts.store(commit_ts, Ordering::SeqCst);
        let mut watermark = self.watermark.lock();
        watermark.update_commit_ts(commit_ts);
        watermark.remove_txn(txn.read_ts())?;
        Ok(commit_ts)
    }

    pub fn last_commit_ts(&self) -> Timestamp {
        self.last_commit_ts.load(Ordering::SeqCst)
    }

    /// Minimum read timestamp still in flight.
    pub fn watermark(&self) -> Timestamp {
        self.watermark.lock().watermark()
    }

    pub fn get_undo_link(&self, rid: Rid) -> Option<UndoLink> {
        self.version_info.lock().get(&rid).copied()
    }

    pub fn set_undo_link(&self, rid: Rid, link: UndoLink) {
        self.version_info.lock().insert(rid, link);
    }

    /// Resolves a link to a snapshot of its log. The undo payload is
    /// rebuilt from the stored bytes so callers never borrow into the
    /// owning transaction.
    pub fn get_undo_log(&self, link: UndoLink) -> Result<UndoLog> {
        let txn_map = self.txn_map.lock();
        let txn = txn_map
            .get(&link.prev_txn)
            .ok_or_else(|| eyre::eyre!("undo link names unknown transaction"))?;
        let logs = txn.undo_logs.lock();
        let log = logs
            .get(link.prev_log_idx)
            .ok_or_else(|| eyre::eyre!("undo link index {} out of range", link.prev_log_idx))?;
        Ok(UndoLog {
            is_deleted: log.is_deleted,
            modified_fields: log.modified_fields.clone(),
            tuple: crate::table::Tuple::from_bytes(log.tuple.data().to_vec()),
            ts: log.ts,
            prev_version: log.prev_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Tuple, TupleMeta};
    use crate::types::{Column, Schema, TypeId, Value};

    fn schema() -> Schema {
        Schema::new(vec![Column::new("v", TypeId::Int)])
    }

    #[test]
    fn begin_assigns_tagged_ids_and_snapshots() {
        let mgr = TransactionManager::new();
        let t1 = mgr.begin().unwrap();
        let t2 = mgr.begin().unwrap();
        assert!(t1.id() & TXN_START_ID != 0);
        assert_ne!(t1.id(), t2.id());
        assert_eq!(t1.read_ts(), 0);
        assert_eq!(mgr.watermark(), 0);
    }

    #[test]
    fn commit_stamps_written_tuples() {
        let mgr = TransactionManager::new();
        let heap = Arc::new(TableHeap::new());
        let txn = mgr.begin().unwrap();

        let tuple = Tuple::from_values(&[Value::Int(1)], &schema()).unwrap();
        let rid = heap.insert_tuple(TupleMeta::new(txn.id(), false), tuple);
        txn.record_write(&heap, rid);

        let commit_ts = mgr.commit(&txn).unwrap();
        assert_eq!(commit_ts, 1);
        assert_eq!(heap.get_tuple_meta(rid).unwrap().ts, 1);
        assert_eq!(mgr.last_commit_ts(), 1);
    }

    #[test]
    fn watermark_follows_oldest_snapshot() {
        let mgr = TransactionManager::new();
        let t1 = mgr.begin().unwrap(); // read_ts 0
        mgr.commit(&t1).unwrap(); // commit_ts 1

        let t2 = mgr.begin().unwrap(); // read_ts 1
        let t3 = mgr.begin().unwrap(); // read_ts 1
        assert_eq!(mgr.watermark(), 1);
        mgr.commit(&t2).unwrap();
        assert_eq!(mgr.watermark(), 1); // t3 still reading at 1
        mgr.commit(&t3).unwrap();
        assert_eq!(mgr.watermark(), mgr.last_commit_ts());
    }

    #[test]
    fn undo_links_resolve_to_logs() {
        let mgr = TransactionManager::new();
        let txn = mgr.begin().unwrap();
        let s = schema();

        let log = UndoLog::full(&s, &[Value::Int(9)], 0, false, None).unwrap();
        let link = txn.append_undo_log(log);
        let rid = Rid::new(0, 0);
        mgr.set_undo_link(rid, link);

        let found = mgr.get_undo_link(rid).unwrap();
        let log = mgr.get_undo_log(found).unwrap();
        assert_eq!(log.ts, 0);
        assert_eq!(log.tuple.value_at(&s, 0).unwrap(), Value::Int(9));

        assert!(mgr.get_undo_link(Rid::new(0, 1)).is_none());
    }
}
