//! # Hash Table Directory Page
//!
//! Maps the low `global_depth` bits of a hash to a bucket page. Each
//! slot carries the local depth of its bucket; slots whose indices agree
//! on the low `local_depth` bits alias the same bucket.
//!
//! ## Layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  --------------------------------
//! 0       4     max_depth
//! 4       4     global_depth
//! 8       512   local_depths[512] (u8)
//! 520     2048  bucket_page_ids[512] (u32 LE)
//! ```
//!
//! ## Invariants
//!
//! - `local_depth[i] <= global_depth <= max_depth`
//! - slots aliasing one bucket share one local depth
//! - if `local_depth[i] < global_depth`, slot `i` and its split image
//!   (`i` with bit `local_depth-1` flipped) hold the same bucket id
//!
//! `verify_integrity` checks all three; tests lean on it after every
//! structural operation.

use eyre::{ensure, eyre, Result};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::{PageId, HASH_DIRECTORY_ARRAY_SIZE, HASH_DIRECTORY_MAX_DEPTH};
use crate::index::{page_id_from_disk, page_id_to_disk};

#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct HashDirectoryPage {
    max_depth: U32,
    global_depth: U32,
    local_depths: [u8; HASH_DIRECTORY_ARRAY_SIZE],
    bucket_page_ids: [U32; HASH_DIRECTORY_ARRAY_SIZE],
}

impl HashDirectoryPage {
    pub fn view(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(page, _)| page)
            .map_err(|e| eyre!("directory page cast failed: {:?}", e))
    }

    pub fn view_mut(data: &mut [u8]) -> Result<&mut Self> {
        Self::mut_from_prefix(data)
            .map(|(page, _)| page)
            .map_err(|e| eyre!("directory page cast failed: {:?}", e))
    }

    pub fn init(&mut self, max_depth: u32) {
        self.max_depth = U32::new(max_depth.min(HASH_DIRECTORY_MAX_DEPTH));
        self.global_depth = U32::new(0);
        self.local_depths.fill(0);
        for slot in self.bucket_page_ids.iter_mut() {
            *slot = U32::new(crate::config::INVALID_PAGE_ID_DISK);
        }
    }

    zerocopy_accessors! {
        max_depth: u32,
        global_depth: u32,
    }

    /// Active slot count: `1 << global_depth`.
    pub fn size(&self) -> usize {
        1 << self.global_depth()
    }

    /// Routes a hash to a bucket slot by its low `global_depth` bits.
    pub fn hash_to_bucket_index(&self, hash: u32) -> usize {
        (hash as usize) & (self.size() - 1)
    }

    pub fn bucket_page_id(&self, bucket_idx: usize) -> PageId {
        page_id_from_disk(self.bucket_page_ids[bucket_idx].get())
    }

    pub fn set_bucket_page_id(&mut self, bucket_idx: usize, page_id: PageId) {
        self.bucket_page_ids[bucket_idx] = U32::new(page_id_to_disk(page_id));
    }

    pub fn local_depth(&self, bucket_idx: usize) -> u32 {
        self.local_depths[bucket_idx] as u32
    }

    pub fn set_local_depth(&mut self, bucket_idx: usize, depth: u32) {
        debug_assert!(depth <= self.global_depth());
        self.local_depths[bucket_idx] = depth as u8;
    }

    /// The slot paired with `bucket_idx` by flipping the highest bit
    /// within its local depth. Only meaningful for `local_depth > 0`.
    pub fn split_image_index(&self, bucket_idx: usize) -> usize {
        let depth = self.local_depth(bucket_idx);
        debug_assert!(depth > 0);
        bucket_idx ^ (1 << (depth - 1))
    }

    /// Doubles the directory: every upper-half slot mirrors its lower
    /// partner's bucket and local depth.
    pub fn incr_global_depth(&mut self) -> Result<()> {
        let depth = self.global_depth();
        ensure!(
            depth < self.max_depth(),
            "directory already at max depth {}",
            self.max_depth()
        );
        let old_size = self.size();
        for i in 0..old_size {
            self.bucket_page_ids[i + old_size] = self.bucket_page_ids[i];
            self.local_depths[i + old_size] = self.local_depths[i];
        }
        self.global_depth = U32::new(depth + 1);
        Ok(())
    }

    /// Halves the directory, discarding the upper half.
    pub fn decr_global_depth(&mut self) -> Result<()> {
        let depth = self.global_depth();
        ensure!(depth > 0, "directory already at global depth 0");
        self.global_depth = U32::new(depth - 1);
        let new_size = self.size();
        for i in new_size..new_size * 2 {
            self.bucket_page_ids[i] = U32::new(crate::config::INVALID_PAGE_ID_DISK);
            self.local_depths[i] = 0;
        }
        Ok(())
    }

    /// True when every active bucket's local depth sits strictly below
    /// the global depth, i.e. halving loses nothing.
    pub fn can_shrink(&self) -> bool {
        let depth = self.global_depth();
        depth > 0 && (0..self.size()).all(|i| self.local_depth(i) < depth)
    }

    /// Checks the directory invariants; used by tests after structural
    /// changes.
    pub fn verify_integrity(&self) -> Result<()> {
        for i in 0..self.size() {
            let ld = self.local_depth(i);
            ensure!(
                ld <= self.global_depth(),
                "slot {} local depth {} above global depth {}",
                i,
                ld,
                self.global_depth()
            );
            if ld < self.global_depth() && ld > 0 {
                let image = i ^ (1 << (ld - 1));
                ensure!(
                    self.bucket_page_id(i) == self.bucket_page_id(image)
                        || self.local_depth(image) == ld,
                    "slot {} and image {} disagree",
                    i,
                    image
                );
            }
            // Every alias of this bucket shares its local depth.
            let mask = if ld == 0 { 0 } else { (1usize << ld) - 1 };
            for j in 0..self.size() {
                if j & mask == i & mask {
                    ensure!(
                        self.bucket_page_id(j) == self.bucket_page_id(i),
                        "aliased slots {} and {} hold different buckets",
                        i,
                        j
                    );
                    ensure!(
                        self.local_depth(j) == ld,
                        "aliased slots {} and {} disagree on local depth",
                        i,
                        j
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{INVALID_PAGE_ID, PAGE_SIZE};

    fn directory(buf: &mut [u8], max_depth: u32) -> &mut HashDirectoryPage {
        let page = HashDirectoryPage::view_mut(buf).unwrap();
        page.init(max_depth);
        page
    }

    #[test]
    fn layout_fits_one_page() {
        assert!(std::mem::size_of::<HashDirectoryPage>() <= PAGE_SIZE);
    }

    #[test]
    fn fresh_directory_is_single_slot() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let dir = directory(&mut buf, 3);
        assert_eq!(dir.global_depth(), 0);
        assert_eq!(dir.size(), 1);
        assert_eq!(dir.bucket_page_id(0), INVALID_PAGE_ID);
        assert_eq!(dir.hash_to_bucket_index(0xDEAD_BEEF), 0);
    }

    #[test]
    fn grow_mirrors_lower_half() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let dir = directory(&mut buf, 3);
        dir.set_bucket_page_id(0, 10);
        dir.set_local_depth(0, 0);

        dir.incr_global_depth().unwrap();
        assert_eq!(dir.size(), 2);
        assert_eq!(dir.bucket_page_id(1), 10);
        assert_eq!(dir.local_depth(1), 0);
        dir.verify_integrity().unwrap();

        dir.incr_global_depth().unwrap();
        assert_eq!(dir.size(), 4);
        assert_eq!(dir.bucket_page_id(3), 10);
        dir.verify_integrity().unwrap();
    }

    #[test]
    fn grow_stops_at_max_depth() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let dir = directory(&mut buf, 1);
        dir.incr_global_depth().unwrap();
        assert!(dir.incr_global_depth().is_err());
    }

    #[test]
    fn hash_routing_uses_low_bits() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let dir = directory(&mut buf, 3);
        dir.incr_global_depth().unwrap();
        dir.incr_global_depth().unwrap();
        assert_eq!(dir.hash_to_bucket_index(0b1010), 0b10);
        assert_eq!(dir.hash_to_bucket_index(0b1111), 0b11);
    }

    #[test]
    fn split_image_flips_top_local_bit() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let dir = directory(&mut buf, 3);
        dir.incr_global_depth().unwrap();
        dir.incr_global_depth().unwrap();
        dir.set_local_depth(0b01, 2);
        assert_eq!(dir.split_image_index(0b01), 0b11);
        dir.set_local_depth(0b10, 1);
        assert_eq!(dir.split_image_index(0b10), 0b11);
    }

    #[test]
    fn shrink_requires_all_local_depths_below_global() {
        let mut buf = vec![0u8; PAGE_SIZE];
        let dir = directory(&mut buf, 3);
        dir.set_bucket_page_id(0, 5);
        dir.incr_global_depth().unwrap();
        assert!(dir.can_shrink());

        dir.set_local_depth(0, 1);
        dir.set_bucket_page_id(1, 6);
        dir.set_local_depth(1, 1);
        assert!(!dir.can_shrink());

        dir.set_local_depth(0, 0);
        dir.set_bucket_page_id(1, 5);
        dir.set_local_depth(1, 0);
        assert!(dir.can_shrink());
        dir.decr_global_depth().unwrap();
        assert_eq!(dir.size(), 1);
        dir.verify_integrity().unwrap();
    }
}
