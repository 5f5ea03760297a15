//! # Catalog
//!
//! Registry of tables and their secondary indexes. Plans reference
//! tables and indexes by oid; executors resolve them here.
//!
//! Schema persistence and DDL beyond create are out of scope; the
//! catalog exists to serve the execution engine and tests.

use std::collections::HashMap;
use std::sync::Arc;

use eyre::{ensure, Result};
use parking_lot::RwLock;

use crate::buffer::BufferPool;
use crate::index::HashIndex;
use crate::table::TableHeap;
use crate::types::Schema;

pub type TableOid = u32;
pub type IndexOid = u32;

pub struct TableInfo {
    pub oid: TableOid,
    pub name: String,
    pub schema: Schema,
    pub heap: Arc<TableHeap>,
}

pub struct IndexInfo {
    pub oid: IndexOid,
    pub name: String,
    pub table_name: String,
    pub index: Arc<HashIndex>,
}

#[derive(Default)]
struct CatalogInner {
    tables: HashMap<TableOid, Arc<TableInfo>>,
    table_names: HashMap<String, TableOid>,
    indexes: HashMap<IndexOid, Arc<IndexInfo>>,
    index_names: HashMap<String, IndexOid>,
    next_table_oid: TableOid,
    next_index_oid: IndexOid,
}

#[derive(Default)]
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, name: impl Into<String>, schema: Schema) -> Result<Arc<TableInfo>> {
        let name = name.into();
        let mut inner = self.inner.write();
        ensure!(
            !inner.table_names.contains_key(&name),
            "table {} already exists",
            name
        );
        let oid = inner.next_table_oid;
        inner.next_table_oid += 1;
        let info = Arc::new(TableInfo {
            oid,
            name: name.clone(),
            schema,
            heap: Arc::new(TableHeap::new()),
        });
        inner.tables.insert(oid, Arc::clone(&info));
        inner.table_names.insert(name, oid);
        Ok(info)
    }

    pub fn get_table(&self, oid: TableOid) -> Option<Arc<TableInfo>> {
        self.inner.read().tables.get(&oid).cloned()
    }

    pub fn get_table_by_name(&self, name: &str) -> Option<Arc<TableInfo>> {
        let inner = self.inner.read();
        let oid = inner.table_names.get(name)?;
        inner.tables.get(oid).cloned()
    }

    /// Creates a hash index over one column of an existing table and
    /// backfills it from the current heap contents.
    pub fn create_index(
        &self,
        name: impl Into<String>,
        table_name: &str,
        key_attr: usize,
        bpm: Arc<BufferPool>,
    ) -> Result<Arc<IndexInfo>> {
        let name = name.into();
        let table = self
            .get_table_by_name(table_name)
            .ok_or_else(|| eyre::eyre!("table {} does not exist", table_name))?;
        ensure!(
            key_attr < table.schema.column_count(),
            "key column {} out of range for table {}",
            key_attr,
            table_name
        );

        let index = Arc::new(HashIndex::new(name.clone(), bpm, key_attr)?);

        let mut iter = table.heap.iter();
        while let Some((rid, meta, tuple)) = iter.next_row()? {
            if meta.is_deleted {
                continue;
            }
            let key = tuple.value_at(&table.schema, key_attr)?;
            ensure!(
                index.insert_entry(&key, rid)?,
                "duplicate key {} while building index {}",
                key,
                name
            );
        }

        let mut inner = self.inner.write();
        ensure!(
            !inner.index_names.contains_key(&name),
            "index {} already exists",
            name
        );
        let oid = inner.next_index_oid;
        inner.next_index_oid += 1;
        let info = Arc::new(IndexInfo {
            oid,
            name: name.clone(),
            table_name: table_name.to_string(),
            index,
        });
        inner.indexes.insert(oid, Arc::clone(&info));
        inner.index_names.insert(name, oid);
        Ok(info)
    }

    pub fn get_index(&self, oid: IndexOid) -> Option<Arc<IndexInfo>> {
        self.inner.read().indexes.get(&oid).cloned()
    }

    pub fn get_index_by_name(&self, name: &str) -> Option<Arc<IndexInfo>> {
        let inner = self.inner.read();
        let oid = inner.index_names.get(name)?;
        inner.indexes.get(oid).cloned()
    }

    /// Every index declared on `table_name`.
    pub fn get_table_indexes(&self, table_name: &str) -> Vec<Arc<IndexInfo>> {
        self.inner
            .read()
            .indexes
            .values()
            .filter(|info| info.table_name == table_name)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDiskManager;
    use crate::table::TupleMeta;
    use crate::types::{Column, TypeId, Value};

    fn bpm() -> Arc<BufferPool> {
        Arc::new(BufferPool::new(64, Arc::new(MemoryDiskManager::new()), 2))
    }

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", TypeId::Int),
            Column::new("name", TypeId::Text),
        ])
    }

    #[test]
    fn create_and_resolve_table() {
        let catalog = Catalog::new();
        let t = catalog.create_table("users", schema()).unwrap();
        assert_eq!(catalog.get_table(t.oid).unwrap().name, "users");
        assert_eq!(catalog.get_table_by_name("users").unwrap().oid, t.oid);
        assert!(catalog.get_table_by_name("ghosts").is_none());
        assert!(catalog.create_table("users", schema()).is_err());
    }

    #[test]
    fn create_index_backfills_existing_rows() {
        let catalog = Catalog::new();
        let t = catalog.create_table("users", schema()).unwrap();
        for id in [10i64, 20, 30] {
            let tuple = crate::table::Tuple::from_values(
                &[Value::Int(id), Value::Text(format!("u{}", id))],
                &t.schema,
            )
            .unwrap();
            t.heap.insert_tuple(TupleMeta::new(1, false), tuple);
        }

        let idx = catalog.create_index("users_id", "users", 0, bpm()).unwrap();
        assert_eq!(idx.index.scan_key(&Value::Int(20)).unwrap().len(), 1);
        assert!(idx.index.scan_key(&Value::Int(99)).unwrap().is_empty());

        let found = catalog.get_table_indexes("users");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "users_id");
        assert!(catalog.get_table_indexes("other").is_empty());
    }
}
