//! # Hash Table Header Page
//!
//! Root of an extendible hash table. Routes a hash to one of
//! `1 << max_depth` directory pages using the *uppermost* `max_depth`
//! bits, so keys spread across directories even when their low bits
//! collide.
//!
//! ## Layout
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  --------------------------------
//! 0       4     max_depth
//! 4       2048  directory_page_ids[512] (u32 LE)
//! ```
//!
//! Unused slots hold the on-disk invalid page id `0xFFFF_FFFF`.

use eyre::{eyre, Result};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::config::{PageId, HASH_HEADER_ARRAY_SIZE, HASH_HEADER_MAX_DEPTH};
use crate::index::{page_id_from_disk, page_id_to_disk};

#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct HashHeaderPage {
    max_depth: U32,
    directory_page_ids: [U32; HASH_HEADER_ARRAY_SIZE],
}

impl HashHeaderPage {
    /// Interprets the front of a page buffer as a header page.
    pub fn view(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(page, _)| page)
            .map_err(|e| eyre!("header page cast failed: {:?}", e))
    }

    pub fn view_mut(data: &mut [u8]) -> Result<&mut Self> {
        Self::mut_from_prefix(data)
            .map(|(page, _)| page)
            .map_err(|e| eyre!("header page cast failed: {:?}", e))
    }

    /// Initializes an empty header. `max_depth` is clamped to the layout
    /// bound.
    pub fn init(&mut self, max_depth: u32) {
        self.max_depth = U32::new(max_depth.min(HASH_HEADER_MAX_DEPTH));
        for slot in self.directory_page_ids.iter_mut() {
            *slot = U32::new(crate::config::INVALID_PAGE_ID_DISK);
        }
    }

    zerocopy_accessors! {
        max_depth: u32,
    }

    /// Routes a hash to a directory slot by its top `max_depth` bits.
    pub fn hash_to_directory_index(&self, hash: u32) -> usize {
        let depth = self.max_depth();
        if depth == 0 {
            return 0;
        }
        (hash >> (32 - depth)) as usize
    }

    pub fn directory_page_id(&self, directory_idx: usize) -> PageId {
        page_id_from_disk(self.directory_page_ids[directory_idx].get())
    }

    pub fn set_directory_page_id(&mut self, directory_idx: usize, page_id: PageId) {
        self.directory_page_ids[directory_idx] = U32::new(page_id_to_disk(page_id));
    }

    /// Number of addressable directory slots.
    pub fn max_size(&self) -> usize {
        1 << self.max_depth()
    }
}
