//! Buffer pool behavior across eviction, pinning, and persistence.

use std::sync::Arc;

use opaldb::config::{PageId, PAGE_SIZE};
use opaldb::storage::DiskManager;
use opaldb::{BufferPool, MemoryDiskManager};

fn pool_with_disk(frames: usize) -> (Arc<BufferPool>, Arc<MemoryDiskManager>) {
    let disk = Arc::new(MemoryDiskManager::new());
    let pool = Arc::new(BufferPool::new(
        frames,
        Arc::clone(&disk) as Arc<dyn DiskManager>,
        2,
    ));
    (pool, disk)
}

#[test]
fn eviction_prefers_unpinned_and_fails_when_all_pinned() {
    let (pool, _disk) = pool_with_disk(3);

    let (p0, _f0) = pool.new_page().unwrap().unwrap();
    let (_p1, _f1) = pool.new_page().unwrap().unwrap();
    let (_p2, _f2) = pool.new_page().unwrap().unwrap();

    // Unpinning p0 frees exactly one frame for the next allocation.
    assert!(pool.unpin_page(p0, false).unwrap());
    let (p3, _f3) = pool.new_page().unwrap().unwrap();
    assert_eq!(p3, 3);

    // p0 was evicted and every frame is pinned again: the fetch fails
    // until something is unpinned.
    assert!(pool.fetch_page(p0).unwrap().is_none());
    assert!(pool.unpin_page(p3, false).unwrap());
    assert!(pool.fetch_page(p0).unwrap().is_some());
}

#[test]
fn single_frame_pool_round_trips_through_eviction() {
    let (pool, _disk) = pool_with_disk(1);

    let mut pages: Vec<PageId> = Vec::new();
    for i in 0..8u8 {
        let (pid, frame) = pool.new_page().unwrap().unwrap();
        frame.with_data_mut(|d| {
            d[0] = i;
            d[PAGE_SIZE - 1] = 0xF0 | i;
        });
        assert!(pool.unpin_page(pid, true).unwrap());
        pages.push(pid);
    }

    for (i, &pid) in pages.iter().enumerate() {
        let frame = pool.fetch_page(pid).unwrap().unwrap();
        assert_eq!(frame.with_data(|d| (d[0], d[PAGE_SIZE - 1])), (i as u8, 0xF0 | i as u8));
        assert!(pool.unpin_page(pid, false).unwrap());
    }
}

#[test]
fn flush_after_dirty_unpin_matches_memory_image() {
    let (pool, disk) = pool_with_disk(4);

    let (pid, frame) = pool.new_page().unwrap().unwrap();
    frame.with_data_mut(|d| {
        for (i, b) in d.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
    });
    assert!(pool.unpin_page(pid, true).unwrap());
    assert!(pool.flush_page(pid).unwrap());

    let mut on_disk = [0u8; PAGE_SIZE];
    disk.read_page(pid, &mut on_disk).unwrap();
    for (i, b) in on_disk.iter().enumerate() {
        assert_eq!(*b, (i % 251) as u8);
    }
}

#[test]
fn guards_pin_across_threads() {
    let (pool, _disk) = pool_with_disk(8);

    let (pid, guard) = pool.new_page_guarded().unwrap().unwrap();
    drop(guard);

    let mut handles = Vec::new();
    for t in 0..4u8 {
        let pool = Arc::clone(&pool);
        handles.push(std::thread::spawn(move || {
            for _ in 0..50 {
                let mut w = pool.fetch_page_write(pid).unwrap().unwrap();
                let old = w.data()[0];
                w.data_mut()[0] = old.wrapping_add(1);
                w.data_mut()[1] = t;
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let r = pool.fetch_page_read(pid).unwrap().unwrap();
    // 4 threads * 50 exclusive increments.
    assert_eq!(r.data()[0], 200);
}

#[test]
fn delete_page_returns_frame_to_free_list() {
    let (pool, _disk) = pool_with_disk(2);

    let (p0, _) = pool.new_page().unwrap().unwrap();
    let (p1, _) = pool.new_page().unwrap().unwrap();
    assert!(pool.new_page().unwrap().is_none());

    assert!(!pool.delete_page(p0).unwrap()); // still pinned
    assert!(pool.unpin_page(p0, false).unwrap());
    assert!(pool.delete_page(p0).unwrap());

    // The freed frame serves the next allocation without evicting p1.
    let (p2, _) = pool.new_page().unwrap().unwrap();
    assert!(pool.fetch_page(p1).unwrap().is_some());
    assert_ne!(p2, p1);
}

#[test]
fn io_failure_surfaces_as_error() {
    let (pool, disk) = pool_with_disk(1);

    let (p0, frame) = pool.new_page().unwrap().unwrap();
    frame.with_data_mut(|d| d[0] = 1);
    pool.unpin_page(p0, true).unwrap();

    disk.set_fail_io(true);
    // Evicting the dirty page requires a write, which now fails.
    assert!(pool.new_page().is_err());

    disk.set_fail_io(false);
    // The pool recovers once the disk does.
    assert!(pool.new_page().unwrap().is_some());
}
