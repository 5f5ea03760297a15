//! # Buffer Module
//!
//! In-memory page cache over the disk scheduler:
//!
//! - [`LruKReplacer`]: picks eviction victims among unpinned frames by
//!   K-distance (∞-class first, then largest K-distance)
//! - [`Frame`]: one pool slot — a latch-protected page buffer plus atomic
//!   pin count, dirty flag, and resident page id
//! - [`BufferPool`]: maps page ids to frames, pins, flushes, allocates
//! - page guards: scoped pin + latch holders ([`PageGuard`],
//!   [`ReadPageGuard`], [`WritePageGuard`])
//!
//! ## Locking
//!
//! One coarse mutex serializes the page table, free list, and replacer.
//! Page *content* is protected per-frame by a reader-writer latch that
//! guards hold for their lifetime. The pool mutex is never held across a
//! blocking disk wait: a victim frame is reserved (pinned, non-evictable,
//! mapped) and its content latch taken before the mutex is released, so
//! concurrent fetchers of the same page block on the latch, not the pool.

mod buffer_pool;
mod frame;
mod lru_k_replacer;
mod page_guard;

pub use buffer_pool::BufferPool;
pub use frame::Frame;
pub use lru_k_replacer::LruKReplacer;
pub use page_guard::{PageGuard, ReadPageGuard, WritePageGuard};
