//! # Table Module
//!
//! Tuples, tuple metadata, record ids, and the slot-addressed table heap
//! the executors read and mutate. Heap pages have no on-disk format here;
//! persistence concerns stop at the index and buffer layers.

mod heap;
mod tuple;

pub use heap::{TableHeap, TableIter};
pub use tuple::{Rid, Tuple, TupleMeta};
