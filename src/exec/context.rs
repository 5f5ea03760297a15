//! # Executor Context
//!
//! Everything a query's executors share: the catalog, the running
//! transaction, and the transaction manager for undo-chain access.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::mvcc::{Transaction, TransactionManager};

pub struct ExecutorContext {
    pub catalog: Arc<Catalog>,
    pub txn: Arc<Transaction>,
    pub txn_mgr: Arc<TransactionManager>,
}

impl ExecutorContext {
    pub fn new(
        catalog: Arc<Catalog>,
        txn: Arc<Transaction>,
        txn_mgr: Arc<TransactionManager>,
    ) -> Self {
        Self {
            catalog,
            txn,
            txn_mgr,
        }
    }
}
