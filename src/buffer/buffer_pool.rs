//! # Buffer Pool
//!
//! Caches disk pages in a fixed array of frames. One mutex serializes the
//! page table, free list, and replacer; page contents are protected by the
//! per-frame latch.
//!
//! ## Fault path
//!
//! On a miss, the victim frame is *reserved* while the mutex is held: it
//! is pinned, made non-evictable, unmapped from its old page, mapped to
//! the new one, and its content latch is taken. Only then is the mutex
//! released and the blocking disk I/O issued. A concurrent fetch of the
//! same page finds the mapping and pins the frame immediately, but any
//! access to its bytes blocks on the latch until the fill completes, so
//! no thread can observe a half-loaded page.
//!
//! ## Fixed return-value quirks
//!
//! Unlike some teaching implementations, `unpin_page`, `flush_page`, and
//! `delete_page` return `Ok(true)` on success, and `unpin_page` never
//! forces the dirty flag: `is_dirty=false` leaves an existing dirty bit
//! alone.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use eyre::{eyre, Result};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::buffer::{Frame, LruKReplacer};
use crate::config::{FrameId, PageId, INVALID_PAGE_ID};
use crate::storage::{DiskManager, DiskScheduler};

struct PoolInner {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    replacer: LruKReplacer,
    next_page_id: PageId,
}

pub struct BufferPool {
    frames: Vec<Arc<Frame>>,
    inner: Mutex<PoolInner>,
    scheduler: DiskScheduler,
}

impl BufferPool {
    pub fn new(pool_size: usize, disk: Arc<dyn DiskManager>, replacer_k: usize) -> Self {
        let frames = (0..pool_size).map(|i| Arc::new(Frame::new(i))).collect();
        Self {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::with_capacity(pool_size),
                free_list: (0..pool_size).collect(),
                replacer: LruKReplacer::new(pool_size, replacer_k),
                next_page_id: 0,
            }),
            scheduler: DiskScheduler::new(disk),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    /// Allocates a fresh page id on a reserved frame, zeroed and pinned.
    /// Returns `None` when every frame is pinned.
    pub fn new_page(&self) -> Result<Option<(PageId, Arc<Frame>)>> {
        let mut inner = self.inner.lock();
        let Some((frame_id, evicted)) = self.reserve_frame(&mut inner)? else {
            return Ok(None);
        };
        let page_id = inner.next_page_id;
        inner.next_page_id += 1;

        let frame = Arc::clone(&self.frames[frame_id]);
        let mut data = frame.data.write();
        frame.set_page_id(page_id);
        inner.page_table.insert(page_id, frame_id);
        inner.replacer.record_access(frame_id)?;
        inner.replacer.set_evictable(frame_id, false)?;
        drop(inner);

        if let Some((old_page_id, old_image)) = evicted {
            if let Err(e) = self.scheduler.write_blocking(old_page_id, old_image) {
                drop(data);
                self.abandon_frame(page_id, frame_id);
                return Err(e.wrap_err("writing through evicted page"));
            }
        }
        data.fill(0);
        frame.clear_dirty();
        drop(data);

        Ok(Some((page_id, frame)))
    }

    /// Pins the page, faulting it in from disk if necessary. Returns
    /// `None` when the page is non-resident and no frame is evictable.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<Arc<Frame>>> {
        let mut inner = self.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            let frame = Arc::clone(&self.frames[frame_id]);
            frame.pin();
            inner.replacer.record_access(frame_id)?;
            inner.replacer.set_evictable(frame_id, false)?;
            return Ok(Some(frame));
        }

        let Some((frame_id, evicted)) = self.reserve_frame(&mut inner)? else {
            return Ok(None);
        };
        let frame = Arc::clone(&self.frames[frame_id]);
        let mut data = frame.data.write();
        frame.set_page_id(page_id);
        inner.page_table.insert(page_id, frame_id);
        inner.replacer.record_access(frame_id)?;
        inner.replacer.set_evictable(frame_id, false)?;
        drop(inner);

        let filled: Result<()> = (|| {
            if let Some((old_page_id, old_image)) = evicted {
                self.scheduler.write_blocking(old_page_id, old_image)?;
            }
            let image = self.scheduler.read_blocking(page_id)?;
            data.copy_from_slice(&image[..]);
            frame.clear_dirty();
            Ok(())
        })();

        if let Err(e) = filled {
            drop(data);
            self.abandon_frame(page_id, frame_id);
            return Err(e.wrap_err(eyre!("faulting in page {}", page_id)));
        }
        drop(data);
        Ok(Some(frame))
    }

    /// Drops one pin. At pin count zero the frame becomes evictable.
    /// `is_dirty=true` sets the dirty bit; `false` leaves it untouched.
    /// Returns `Ok(false)` if the page is not resident or not pinned.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> Result<bool> {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id];
        if frame.pin_count() == 0 {
            return Ok(false);
        }
        if is_dirty {
            frame.mark_dirty();
        }
        if frame.unpin() == 1 {
            inner.replacer.set_evictable(frame_id, true)?;
        }
        Ok(true)
    }

    /// Writes the page to disk regardless of its dirty state and clears
    /// the dirty flag. Returns `Ok(false)` if the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        // Pin so eviction cannot remap the frame once the mutex drops.
        let frame = Arc::clone(&self.frames[frame_id]);
        frame.pin();
        inner.replacer.set_evictable(frame_id, false)?;
        drop(inner);

        let result = self.scheduler.write_blocking(page_id, frame.snapshot());
        if result.is_ok() {
            frame.clear_dirty();
        }
        self.release_internal_pin(page_id, frame_id);
        result.map(|_| true)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = {
            let inner = self.inner.lock();
            inner.page_table.keys().copied().collect()
        };
        for page_id in resident {
            // A page deleted since the snapshot simply reports false.
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Removes a page from the pool and returns its frame to the free
    /// list. Refuses (returns `Ok(false)`) while the page is pinned.
    /// Dirty contents are discarded: the id is being deallocated, so its
    /// bytes will never be read again.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id];
        if frame.pin_count() > 0 {
            return Ok(false);
        }
        inner.replacer.remove(frame_id)?;
        inner.page_table.remove(&page_id);
        inner.free_list.push_back(frame_id);
        frame.set_page_id(INVALID_PAGE_ID);
        frame.clear_dirty();
        trace!(page_id, frame_id, "page deleted");
        Ok(true)
    }

    /// Number of frames currently available without eviction pressure:
    /// free frames plus evictable residents.
    pub fn available_frames(&self) -> usize {
        let inner = self.inner.lock();
        inner.free_list.len() + inner.replacer.size()
    }

    /// Picks a frame from the free list or evicts one. Returns the frame
    /// id plus, when a dirty page was evicted, its id and final image for
    /// write-through. The frame comes back pinned and unmapped.
    fn reserve_frame(
        &self,
        inner: &mut PoolInner,
    ) -> Result<Option<(FrameId, Option<(PageId, Box<[u8; crate::config::PAGE_SIZE]>)>)>> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            self.frames[frame_id].pin();
            return Ok(Some((frame_id, None)));
        }
        let Some(frame_id) = inner.replacer.evict() else {
            return Ok(None);
        };
        let frame = &self.frames[frame_id];
        let old_page_id = frame.page_id();
        inner.page_table.remove(&old_page_id);
        frame.pin();
        frame.set_page_id(INVALID_PAGE_ID);

        let flush = if frame.is_dirty() {
            debug!(page_id = old_page_id, frame_id, "evicting dirty page");
            Some((old_page_id, frame.snapshot()))
        } else {
            trace!(page_id = old_page_id, frame_id, "evicting clean page");
            None
        };
        frame.clear_dirty();
        Ok(Some((frame_id, flush)))
    }

    /// Rolls back a reserved frame after a failed fault-in.
    fn abandon_frame(&self, page_id: PageId, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        inner.page_table.remove(&page_id);
        let frame = &self.frames[frame_id];
        frame.reset_pins();
        frame.set_page_id(INVALID_PAGE_ID);
        frame.clear_dirty();
        let _ = inner.replacer.set_evictable(frame_id, true);
        let _ = inner.replacer.remove(frame_id);
        inner.free_list.push_back(frame_id);
    }

    /// Undoes the internal pin taken by `flush_page`.
    fn release_internal_pin(&self, page_id: PageId, frame_id: FrameId) {
        let mut inner = self.inner.lock();
        // The mapping cannot have moved: the pin blocked eviction and
        // deletion.
        debug_assert_eq!(inner.page_table.get(&page_id), Some(&frame_id));
        let frame = &self.frames[frame_id];
        if frame.unpin() == 1 {
            let _ = inner.replacer.set_evictable(frame_id, true);
        }
    }
}
