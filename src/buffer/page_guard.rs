//! # Page Guards
//!
//! Scoped holders that tie a pin (and optionally a latch) to a value's
//! lifetime:
//!
//! - [`PageGuard`]: pin only; byte access takes the latch per call
//! - [`ReadPageGuard`]: pin + shared latch for the guard's lifetime
//! - [`WritePageGuard`]: pin + exclusive latch; mutation marks the page
//!   dirty
//!
//! All three are move-only. Dropping a guard releases the latch first,
//! then unpins with the dirty flag recorded during the guard's life. A
//! moved-from guard owns nothing, so double release cannot happen.
//!
//! The latch guards are owned (`arc_lock`): they keep the frame's latch
//! alive without borrowing the pool, which is what lets guards travel up
//! the call stack and across structural recursion in the hash index.

use std::sync::Arc;

use eyre::Result;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::buffer::frame::PageBuf;
use crate::buffer::{BufferPool, Frame};
use crate::config::PageId;

/// Pin-only guard. The page cannot be evicted while this exists.
pub struct PageGuard {
    pool: Arc<BufferPool>,
    frame: Option<Arc<Frame>>,
    page_id: PageId,
    is_dirty: bool,
}

impl PageGuard {
    fn new(pool: Arc<BufferPool>, frame: Arc<Frame>) -> Self {
        let page_id = frame.page_id();
        Self {
            pool,
            frame: Some(frame),
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Reads the page bytes under a transient shared latch.
    pub fn with_data<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        self.frame.as_ref().expect("guard is live").with_data(f)
    }

    /// Mutates the page bytes under a transient exclusive latch and
    /// records the dirty flag for unpin.
    pub fn with_data_mut<R>(&mut self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        self.is_dirty = true;
        self.frame.as_ref().expect("guard is live").with_data_mut(f)
    }

    /// Acquires the shared latch in place, producing a read guard.
    pub fn upgrade_read(mut self) -> ReadPageGuard {
        let frame = self.frame.take().expect("guard is live");
        let latch = frame.data.read_arc();
        self.frame = Some(frame);
        ReadPageGuard { latch, guard: self }
    }

    /// Acquires the exclusive latch in place, producing a write guard.
    pub fn upgrade_write(mut self) -> WritePageGuard {
        let frame = self.frame.take().expect("guard is live");
        let latch = frame.data.write_arc();
        self.frame = Some(frame);
        WritePageGuard { latch, guard: self }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if self.frame.take().is_some() {
            // Unpin failures mean the pool already forgot the page; there
            // is nothing a destructor can do about it.
            let _ = self.pool.unpin_page(self.page_id, self.is_dirty);
        }
    }
}

/// Pin + shared latch. Readers may coexist; writers are excluded.
pub struct ReadPageGuard {
    // Field order is drop order: latch releases before the unpin.
    latch: ArcRwLockReadGuard<RawRwLock, PageBuf>,
    guard: PageGuard,
}

impl ReadPageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8] {
        &self.latch[..]
    }
}

/// Pin + exclusive latch.
pub struct WritePageGuard {
    latch: ArcRwLockWriteGuard<RawRwLock, PageBuf>,
    guard: PageGuard,
}

impl WritePageGuard {
    pub fn page_id(&self) -> PageId {
        self.guard.page_id()
    }

    pub fn data(&self) -> &[u8] {
        &self.latch[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.guard.is_dirty = true;
        if let Some(frame) = self.guard.frame.as_ref() {
            frame.mark_dirty();
        }
        &mut self.latch[..]
    }
}

impl BufferPool {
    /// Fetches a page behind a pin-only guard.
    pub fn fetch_page_guarded(self: &Arc<Self>, page_id: PageId) -> Result<Option<PageGuard>> {
        Ok(self
            .fetch_page(page_id)?
            .map(|frame| PageGuard::new(Arc::clone(self), frame)))
    }

    /// Fetches a page and holds the shared latch.
    pub fn fetch_page_read(self: &Arc<Self>, page_id: PageId) -> Result<Option<ReadPageGuard>> {
        Ok(self.fetch_page_guarded(page_id)?.map(PageGuard::upgrade_read))
    }

    /// Fetches a page and holds the exclusive latch.
    pub fn fetch_page_write(self: &Arc<Self>, page_id: PageId) -> Result<Option<WritePageGuard>> {
        Ok(self
            .fetch_page_guarded(page_id)?
            .map(PageGuard::upgrade_write))
    }

    /// Allocates a fresh page behind a pin-only guard.
    pub fn new_page_guarded(self: &Arc<Self>) -> Result<Option<(PageId, PageGuard)>> {
        Ok(self
            .new_page()?
            .map(|(page_id, frame)| (page_id, PageGuard::new(Arc::clone(self), frame))))
    }

    /// Allocates a fresh page and holds the exclusive latch.
    pub fn new_page_write(self: &Arc<Self>) -> Result<Option<(PageId, WritePageGuard)>> {
        Ok(self
            .new_page_guarded()?
            .map(|(page_id, guard)| (page_id, guard.upgrade_write())))
    }
}
