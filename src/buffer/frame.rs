//! # Frame
//!
//! One slot of the buffer pool. The page buffer sits behind a per-frame
//! reader-writer latch; pin count, dirty flag, and resident page id are
//! atomics so guards can pin/unpin and mark dirty without the pool mutex.
//!
//! The latch lives in its own `Arc` so guards can hold an owned
//! (`arc_lock`) read/write guard while the frame itself stays shared.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

pub type PageBuf = Box<[u8; PAGE_SIZE]>;

pub struct Frame {
    id: FrameId,
    /// Content latch. Readers may share; a writer is exclusive.
    pub(crate) data: Arc<RwLock<PageBuf>>,
    page_id: AtomicI32,
    pin_count: AtomicU32,
    is_dirty: AtomicBool,
}

impl Frame {
    pub(crate) fn new(id: FrameId) -> Self {
        Self {
            id,
            data: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
            page_id: AtomicI32::new(INVALID_PAGE_ID),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.id
    }

    pub fn page_id(&self) -> PageId {
        self.page_id.load(Ordering::Acquire)
    }

    pub(crate) fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id, Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    pub(crate) fn pin(&self) {
        self.pin_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrements the pin count and returns the previous value.
    pub(crate) fn unpin(&self) -> u32 {
        let prev = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "unpin on unpinned frame");
        prev
    }

    pub(crate) fn reset_pins(&self) {
        self.pin_count.store(0, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
    }

    pub(crate) fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Release);
    }

    /// Runs `f` over the page bytes under the read latch.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let guard = self.data.read();
        f(&guard[..])
    }

    /// Runs `f` over the page bytes under the write latch and marks the
    /// frame dirty.
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.data.write();
        self.mark_dirty();
        f(&mut guard[..])
    }

    /// Copies the current page image. Used when flushing.
    pub(crate) fn snapshot(&self) -> PageBuf {
        let guard = self.data.read();
        Box::new(**guard)
    }
}
