//! # OpalDB - Relational Storage & Execution Core
//!
//! OpalDB is a teaching-grade relational database core. It implements the
//! hard parts of a storage engine end to end and keeps the outer layers
//! (SQL front end, recovery, networking) out of scope:
//!
//! - **Buffer pool**: fixed-size page frames, an LRU-K replacer, and an
//!   asynchronous single-worker disk scheduler
//! - **Page guards**: scoped pin + reader/writer latch holders
//! - **Extendible hash index**: header/directory/bucket pages persisted
//!   through the buffer pool
//! - **Execution engine**: pull-based (Volcano) operators over a plan tree,
//!   rewrite-rule optimizer, and an MVCC read path that reconstructs past
//!   tuple versions through undo chains
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │   Optimizer (plan-tree rewrites)      │
//! ├───────────────────────────────────────┤
//! │   Executors (seq/index scan, joins,   │
//! │   aggregate, sort, top-n, DML)        │
//! ├──────────────────┬────────────────────┤
//! │  Table heap      │  Extendible hash   │
//! │  + MVCC undo     │  index (paged)     │
//! ├──────────────────┴────────────────────┤
//! │   Buffer pool (frames, LRU-K, guards) │
//! ├───────────────────────────────────────┤
//! │   Disk scheduler → disk manager       │
//! └───────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: disk manager and the asynchronous disk scheduler
//! - [`buffer`]: LRU-K replacer, frames, buffer pool, page guards
//! - [`index`]: disk-backed extendible hash table and the catalog index
//! - [`mvcc`]: watermark, undo logs, transaction manager
//! - [`table`]: tuples, tuple metadata, slot-addressed table heap
//! - [`catalog`]: table and index registry
//! - [`exec`]: plan/expression trees and volcano executors
//! - [`optimizer`]: rewrite rules (seq→index scan, NLJ→hash join, sort+limit→top-n)
//! - [`trie`]: copy-on-write trie with a concurrent store

#[macro_use]
mod macros;

pub mod buffer;
pub mod catalog;
pub mod config;
pub mod exec;
pub mod index;
pub mod mvcc;
pub mod optimizer;
pub mod storage;
pub mod table;
pub mod trie;
pub mod types;

pub use buffer::{BufferPool, LruKReplacer, PageGuard, ReadPageGuard, WritePageGuard};
pub use catalog::Catalog;
pub use storage::{DiskManager, DiskScheduler, FileDiskManager, MemoryDiskManager};
