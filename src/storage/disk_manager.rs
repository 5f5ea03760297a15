//! # Disk Manager
//!
//! Synchronous, blocking page I/O. The [`DiskManager`] trait is the
//! contract the disk scheduler drives; two implementations are provided:
//!
//! - [`FileDiskManager`]: a single database file, pages addressed at
//!   `page_id * PAGE_SIZE`. Reads past the end of the file zero-fill the
//!   buffer (a freshly allocated page has never been written).
//! - [`MemoryDiskManager`]: a vector of page images for tests, with an
//!   injectable fault flag to exercise I/O failure paths.
//!
//! Thread safety: both implementations are `Send + Sync`; the file manager
//! serializes access with a mutex around the file handle.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::{ensure, Context, Result};
use parking_lot::Mutex;

use crate::config::{PageId, PAGE_SIZE};

/// Synchronous page store consumed by the disk scheduler.
pub trait DiskManager: Send + Sync {
    /// Reads the page into `buf`. `buf` must be exactly `PAGE_SIZE` bytes.
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()>;

    /// Writes the page from `buf`. `buf` must be exactly `PAGE_SIZE` bytes.
    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<()>;
}

/// File-backed disk manager over a single database file.
pub struct FileDiskManager {
    file: Mutex<File>,
}

impl FileDiskManager {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())
            .wrap_err_with(|| format!("opening database file {:?}", path.as_ref()))?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn offset(page_id: PageId) -> Result<u64> {
        ensure!(page_id >= 0, "invalid page id {}", page_id);
        Ok(page_id as u64 * PAGE_SIZE as u64)
    }
}

impl DiskManager for FileDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        ensure!(buf.len() == PAGE_SIZE, "read buffer is not a page");
        let offset = Self::offset(page_id)?;
        let mut file = self.file.lock();

        let len = file.metadata()?.len();
        if offset >= len {
            // Page allocated but never written: hand back zeroes.
            buf.fill(0);
            return Ok(());
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut read = 0;
        while read < PAGE_SIZE {
            match file.read(&mut buf[read..])? {
                0 => break,
                n => read += n,
            }
        }
        // Short read at the tail of the file: the remainder was never
        // written, zero-fill it.
        buf[read..].fill(0);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<()> {
        ensure!(buf.len() == PAGE_SIZE, "write buffer is not a page");
        let offset = Self::offset(page_id)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        file.flush()?;
        Ok(())
    }
}

/// In-memory disk manager for tests.
#[derive(Default)]
pub struct MemoryDiskManager {
    pages: Mutex<Vec<Box<[u8; PAGE_SIZE]>>>,
    fail_io: AtomicBool,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent read/write fail, surfacing the `false`
    /// completion path of the disk scheduler.
    pub fn set_fail_io(&self, fail: bool) {
        self.fail_io.store(fail, Ordering::SeqCst);
    }

    fn check_fault(&self) -> Result<()> {
        ensure!(!self.fail_io.load(Ordering::SeqCst), "injected I/O fault");
        Ok(())
    }

    fn ensure_capacity(pages: &mut Vec<Box<[u8; PAGE_SIZE]>>, page_id: usize) {
        while pages.len() <= page_id {
            pages.push(Box::new([0u8; PAGE_SIZE]));
        }
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        self.check_fault()?;
        ensure!(page_id >= 0, "invalid page id {}", page_id);
        ensure!(buf.len() == PAGE_SIZE, "read buffer is not a page");
        let mut pages = self.pages.lock();
        Self::ensure_capacity(&mut pages, page_id as usize);
        buf.copy_from_slice(&pages[page_id as usize][..]);
        Ok(())
    }

    fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<()> {
        self.check_fault()?;
        ensure!(page_id >= 0, "invalid page id {}", page_id);
        ensure!(buf.len() == PAGE_SIZE, "write buffer is not a page");
        let mut pages = self.pages.lock();
        Self::ensure_capacity(&mut pages, page_id as usize);
        pages[page_id as usize].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_disk_round_trip() {
        let disk = MemoryDiskManager::new();
        let mut page = [0u8; PAGE_SIZE];
        page[0] = 0xAB;
        page[PAGE_SIZE - 1] = 0xCD;

        disk.write_page(3, &page).unwrap();

        let mut out = [0u8; PAGE_SIZE];
        disk.read_page(3, &mut out).unwrap();
        assert_eq!(out[0], 0xAB);
        assert_eq!(out[PAGE_SIZE - 1], 0xCD);
    }

    #[test]
    fn memory_disk_unwritten_page_is_zeroed() {
        let disk = MemoryDiskManager::new();
        let mut out = [0xFFu8; PAGE_SIZE];
        disk.read_page(7, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn memory_disk_injected_fault_fails() {
        let disk = MemoryDiskManager::new();
        disk.set_fail_io(true);
        let mut out = [0u8; PAGE_SIZE];
        assert!(disk.read_page(0, &mut out).is_err());
        assert!(disk.write_page(0, &out).is_err());
    }

    #[test]
    fn file_disk_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db")).unwrap();

        let mut page = [0u8; PAGE_SIZE];
        page[42] = 42;
        disk.write_page(5, &page).unwrap();

        let mut out = [0u8; PAGE_SIZE];
        disk.read_page(5, &mut out).unwrap();
        assert_eq!(out[42], 42);

        // Pages before 5 exist as file holes and read back zeroed.
        disk.read_page(2, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn file_disk_read_past_eof_zero_fills() {
        let dir = tempfile::tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db")).unwrap();
        let mut out = [0xEEu8; PAGE_SIZE];
        disk.read_page(100, &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn file_disk_rejects_negative_page_id() {
        let dir = tempfile::tempdir().unwrap();
        let disk = FileDiskManager::open(dir.path().join("test.db")).unwrap();
        let mut out = [0u8; PAGE_SIZE];
        assert!(disk.read_page(-1, &mut out).is_err());
    }
}
