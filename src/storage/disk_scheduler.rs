//! # Disk Scheduler
//!
//! Serializes asynchronous page reads and writes against a single
//! [`DiskManager`]. Callers enqueue [`DiskRequest`]s on an unbounded MPSC
//! queue and block (if they choose) on a one-shot completion channel; a
//! single background worker drains the queue in FIFO order and performs
//! the I/O.
//!
//! ## Ordering
//!
//! Per-page request order is program order: the queue is FIFO and there is
//! exactly one worker, so two requests against the same page can never
//! reorder.
//!
//! ## Shutdown
//!
//! Dropping the scheduler enqueues a `None` sentinel. The worker finishes
//! every request queued before the sentinel, then exits and is joined.
//! Requests enqueued after drop began are not accepted (the channel is
//! closed once the sender is dropped).
//!
//! ## Failure
//!
//! A failed read or write completes its request with `false`. The caller
//! decides whether that is fatal; the buffer pool treats it as fatal.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;

use eyre::{eyre, Result};
use tracing::{debug, warn};

use crate::config::{PageId, PAGE_SIZE};
use crate::storage::DiskManager;

/// A single read or write against one page. Move-only by construction:
/// the data buffer and the completion sender are consumed by the worker.
pub struct DiskRequest {
    pub is_write: bool,
    pub data: Box<[u8; PAGE_SIZE]>,
    pub page_id: PageId,
    /// One-shot completion: `true` on success. For reads, the filled
    /// buffer is sent back alongside the flag.
    pub callback: Sender<(bool, Box<[u8; PAGE_SIZE]>)>,
}

impl DiskRequest {
    /// Creates a request plus the receiver its completion arrives on.
    pub fn new(
        is_write: bool,
        data: Box<[u8; PAGE_SIZE]>,
        page_id: PageId,
    ) -> (Self, Receiver<(bool, Box<[u8; PAGE_SIZE]>)>) {
        let (tx, rx) = channel();
        (
            Self {
                is_write,
                data,
                page_id,
                callback: tx,
            },
            rx,
        )
    }
}

pub struct DiskScheduler {
    queue: Sender<Option<DiskRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    pub fn new(disk: std::sync::Arc<dyn DiskManager>) -> Self {
        let (tx, rx) = channel::<Option<DiskRequest>>();
        let worker = std::thread::Builder::new()
            .name("opaldb-disk".into())
            .spawn(move || Self::worker_loop(rx, disk))
            .expect("spawning disk scheduler worker");
        Self {
            queue: tx,
            worker: Some(worker),
        }
    }

    /// Enqueues a request; returns immediately. Fails only if the
    /// scheduler is already shut down.
    pub fn schedule(&self, request: DiskRequest) -> Result<()> {
        self.queue
            .send(Some(request))
            .map_err(|_| eyre!("disk scheduler is shut down"))
    }

    /// Convenience: schedule a read and block for its completion.
    /// Returns the filled buffer, or an error on I/O failure.
    pub fn read_blocking(&self, page_id: PageId) -> Result<Box<[u8; PAGE_SIZE]>> {
        let (req, rx) = DiskRequest::new(false, Box::new([0u8; PAGE_SIZE]), page_id);
        self.schedule(req)?;
        let (ok, buf) = rx.recv().map_err(|_| eyre!("disk worker died"))?;
        if !ok {
            return Err(eyre!("disk read of page {} failed", page_id));
        }
        Ok(buf)
    }

    /// Convenience: schedule a write and block for its completion.
    pub fn write_blocking(&self, page_id: PageId, data: Box<[u8; PAGE_SIZE]>) -> Result<()> {
        let (req, rx) = DiskRequest::new(true, data, page_id);
        self.schedule(req)?;
        let (ok, _) = rx.recv().map_err(|_| eyre!("disk worker died"))?;
        if !ok {
            return Err(eyre!("disk write of page {} failed", page_id));
        }
        Ok(())
    }

    fn worker_loop(rx: Receiver<Option<DiskRequest>>, disk: std::sync::Arc<dyn DiskManager>) {
        while let Ok(Some(mut req)) = rx.recv() {
            let ok = if req.is_write {
                disk.write_page(req.page_id, &req.data[..]).is_ok()
            } else {
                disk.read_page(req.page_id, &mut req.data[..]).is_ok()
            };
            if !ok {
                warn!(
                    page_id = req.page_id,
                    is_write = req.is_write,
                    "disk request failed"
                );
            }
            // The issuer may have given up waiting; a dead receiver is
            // not an error.
            let _ = req.callback.send((ok, req.data));
        }
        debug!("disk scheduler worker exiting");
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Sentinel: the worker drains up to here, then exits.
        let _ = self.queue.send(None);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDiskManager;
    use std::sync::Arc;

    fn page_with(byte: u8) -> Box<[u8; PAGE_SIZE]> {
        let mut p = Box::new([0u8; PAGE_SIZE]);
        p[0] = byte;
        p
    }

    #[test]
    fn schedule_write_then_read() {
        let disk = Arc::new(MemoryDiskManager::new());
        let sched = DiskScheduler::new(disk);

        sched.write_blocking(0, page_with(0x5A)).unwrap();
        let buf = sched.read_blocking(0).unwrap();
        assert_eq!(buf[0], 0x5A);
    }

    #[test]
    fn per_page_order_is_preserved() {
        let disk = Arc::new(MemoryDiskManager::new());
        let sched = DiskScheduler::new(disk);

        // Queue several writes to the same page without waiting, then one
        // read; FIFO + single worker means the read sees the last write.
        let mut receivers = Vec::new();
        for v in 1..=8u8 {
            let (req, rx) = DiskRequest::new(true, page_with(v), 0);
            sched.schedule(req).unwrap();
            receivers.push(rx);
        }
        let buf = sched.read_blocking(0).unwrap();
        assert_eq!(buf[0], 8);
        for rx in receivers {
            assert!(rx.recv().unwrap().0);
        }
    }

    #[test]
    fn io_failure_completes_with_false() {
        let disk = Arc::new(MemoryDiskManager::new());
        disk.set_fail_io(true);
        let sched = DiskScheduler::new(disk);

        let (req, rx) = DiskRequest::new(true, page_with(1), 0);
        sched.schedule(req).unwrap();
        let (ok, _) = rx.recv().unwrap();
        assert!(!ok);
        assert!(sched.read_blocking(0).is_err());
    }

    #[test]
    fn drop_drains_outstanding_requests() {
        let disk = Arc::new(MemoryDiskManager::new());
        let sched = DiskScheduler::new(Arc::clone(&disk) as Arc<dyn DiskManager>);

        let mut receivers = Vec::new();
        for i in 0..16 {
            let (req, rx) = DiskRequest::new(true, page_with(i as u8), i);
            sched.schedule(req).unwrap();
            receivers.push(rx);
        }
        drop(sched);

        // Every request queued before the sentinel completed.
        for rx in receivers {
            assert!(rx.recv().unwrap().0);
        }
    }

    #[test]
    fn schedule_after_shutdown_fails() {
        let disk = Arc::new(MemoryDiskManager::new());
        let sched = DiskScheduler::new(disk);
        let queue = sched.queue.clone();
        drop(sched);
        assert!(queue.send(None).is_err());
    }
}
