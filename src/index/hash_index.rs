//! # Catalog Hash Index
//!
//! Binds the disk extendible hash table to a table column. Keys are
//! single-column integers hashed identically, so bucket placement follows
//! the key's own bit pattern; values are rids.
//!
//! The index stores the *latest committed* location of a key. Lookups do
//! not reconstruct historical versions; the sequential-scan path owns
//! version-chain walks.

use std::sync::Arc;

use eyre::{ensure, Result};

use crate::buffer::BufferPool;
use crate::config::{HASH_DIRECTORY_MAX_DEPTH, HASH_HEADER_MAX_DEPTH};
use crate::index::{bucket_capacity_for, DiskExtendibleHashTable, IdentityKeyHasher};
use crate::table::Rid;
use crate::types::Value;

pub struct HashIndex {
    table: DiskExtendibleHashTable<i64, Rid, IdentityKeyHasher>,
    key_attrs: Vec<usize>,
}

impl HashIndex {
    /// Creates an index over one integer key column.
    pub fn new(name: impl Into<String>, bpm: Arc<BufferPool>, key_attr: usize) -> Result<Self> {
        let bucket_size = bucket_capacity_for::<i64, Rid>() as u32;
        let table = DiskExtendibleHashTable::new(
            name,
            bpm,
            HASH_HEADER_MAX_DEPTH,
            HASH_DIRECTORY_MAX_DEPTH,
            bucket_size,
            IdentityKeyHasher,
        )?;
        Ok(Self {
            table,
            key_attrs: vec![key_attr],
        })
    }

    pub fn name(&self) -> &str {
        self.table.name()
    }

    /// Offsets of the key columns in the base table schema.
    pub fn key_attrs(&self) -> &[usize] {
        &self.key_attrs
    }

    fn key_of(value: &Value) -> Result<i64> {
        ensure!(!value.is_null(), "cannot index a NULL key");
        value
            .as_int()
            .ok_or_else(|| eyre::eyre!("hash index keys must be integers, got {}", value))
    }

    /// Inserts a key → rid entry. `Ok(false)` on duplicate key.
    pub fn insert_entry(&self, key: &Value, rid: Rid) -> Result<bool> {
        self.table.insert(Self::key_of(key)?, rid)
    }

    /// Removes the entry for `key` if it still points at `rid`.
    pub fn delete_entry(&self, key: &Value, rid: Rid) -> Result<bool> {
        let key = Self::key_of(key)?;
        match self.table.get_value(&key)? {
            Some(existing) if existing == rid => self.table.remove(&key),
            _ => Ok(false),
        }
    }

    /// Collects the rids for `key` (zero or one; keys are unique).
    pub fn scan_key(&self, key: &Value) -> Result<Vec<Rid>> {
        let key = Self::key_of(key)?;
        Ok(self.table.get_value(&key)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDiskManager;

    fn index() -> HashIndex {
        let bpm = Arc::new(BufferPool::new(64, Arc::new(MemoryDiskManager::new()), 2));
        HashIndex::new("idx_test", bpm, 0).unwrap()
    }

    #[test]
    fn insert_scan_delete_round_trip() {
        let idx = index();
        let rid = Rid::new(0, 7);
        assert!(idx.insert_entry(&Value::Int(42), rid).unwrap());
        assert_eq!(idx.scan_key(&Value::Int(42)).unwrap(), vec![rid]);

        assert!(idx.delete_entry(&Value::Int(42), rid).unwrap());
        assert!(idx.scan_key(&Value::Int(42)).unwrap().is_empty());
    }

    #[test]
    fn duplicate_key_rejected() {
        let idx = index();
        assert!(idx.insert_entry(&Value::Int(1), Rid::new(0, 0)).unwrap());
        assert!(!idx.insert_entry(&Value::Int(1), Rid::new(0, 1)).unwrap());
    }

    #[test]
    fn delete_ignores_stale_rid() {
        let idx = index();
        idx.insert_entry(&Value::Int(1), Rid::new(0, 0)).unwrap();
        assert!(!idx.delete_entry(&Value::Int(1), Rid::new(0, 9)).unwrap());
        assert_eq!(idx.scan_key(&Value::Int(1)).unwrap().len(), 1);
    }

    #[test]
    fn non_integer_keys_are_rejected() {
        let idx = index();
        assert!(idx
            .insert_entry(&Value::Text("no".into()), Rid::new(0, 0))
            .is_err());
        assert!(idx.insert_entry(&Value::Null, Rid::new(0, 0)).is_err());
    }
}
