//! # Multi-Version Concurrency Substrate
//!
//! The read-path machinery of snapshot isolation:
//!
//! - [`Watermark`]: the minimum read timestamp among in-flight
//!   transactions, bounding which historical versions are still needed
//! - [`UndoLog`] / [`UndoLink`]: per-tuple deltas chained newest-first,
//!   sufficient to reconstruct earlier versions
//! - [`TransactionManager`] / [`Transaction`]: timestamp allocation, read
//!   snapshots, the rid → undo-link table, and commit stamping
//!
//! ## Version chains
//!
//! The newest version of a tuple lives in the table heap; its metadata
//! timestamp is either a commit timestamp or (bit 63 set) the id of the
//! uncommitted writer. Older versions hang off the transaction manager's
//! undo-link table:
//!
//! ```text
//!  heap tuple (ts=7)
//!      │ undo link
//!      ▼
//!  UndoLog { ts=5, delta } ──prev──▶ UndoLog { ts=3, delta } ──▶ ∅
//! ```
//!
//! Timestamps along a chain are strictly decreasing, which is what caps a
//! reader's walk: it stops at the first log with `ts <= read_ts`.
//!
//! Write-write conflict detection and aborts are out of scope; the
//! manager implements exactly the contract the scan executors consume.

mod transaction;
mod undo;
mod watermark;

pub use transaction::{Transaction, TransactionManager};
pub use undo::{reconstruct_tuple, UndoLink, UndoLog};
pub use watermark::Watermark;
