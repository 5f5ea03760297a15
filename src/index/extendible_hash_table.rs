//! # Disk-Backed Extendible Hash Table
//!
//! Dynamic hashing over header, directory, and bucket pages, all owned
//! by the buffer pool and reached through page guards.
//!
//! ## Routing
//!
//! The *top* `header.max_depth` bits of the hash choose a directory
//! (directories materialize lazily); the *low* `global_depth` bits choose
//! a bucket slot inside it.
//!
//! ## Growth
//!
//! A full bucket splits: its local depth increases, a fresh image bucket
//! takes the directory slots whose index has the new distinguishing bit
//! set, and entries redistribute by that bit. When the split needs more
//! bits than the directory currently decodes, the directory doubles
//! first. A bucket already at `max_depth` cannot split; inserting into it
//! while full is an out-of-space error.
//!
//! ## Shrinkage
//!
//! Removal that empties a bucket merges it with its split image whenever
//! both share a local depth, transitively; once every local depth sits
//! strictly below the global depth the directory halves.
//!
//! ## Latching
//!
//! Guards are acquired top-down (header → directory → bucket) and parents
//! release as soon as the child is pinned. Lookups take read guards the
//! whole way; mutations hold a write guard on the directory while
//! structural changes are possible.

use std::marker::PhantomData;
use std::sync::Arc;

use eyre::{bail, ensure, Result};
use tracing::{debug, trace};
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::buffer::BufferPool;
use crate::config::{PageId, INVALID_PAGE_ID};
use crate::index::{
    bucket_capacity_for, HashBucketMut, HashBucketRef, HashDirectoryPage, HashHeaderPage,
};

/// Hash function the table routes by. Pluggable so integer-keyed tests
/// can pin down directory bit patterns.
pub trait KeyHasher<K>: Send + Sync {
    fn hash_key(&self, key: &K) -> u32;
}

/// SipHash over the key's `Hash` impl. Deterministic within a process.
#[derive(Default, Clone, Copy)]
pub struct DefaultKeyHasher;

impl<K: std::hash::Hash> KeyHasher<K> for DefaultKeyHasher {
    fn hash_key(&self, key: &K) -> u32 {
        use std::hash::{BuildHasher, BuildHasherDefault, Hasher};
        type Sip = BuildHasherDefault<std::collections::hash_map::DefaultHasher>;
        let mut hasher = Sip::default().build_hasher();
        key.hash(&mut hasher);
        hasher.finish() as u32
    }
}

/// Uses the key's own low 32 bits as the hash.
#[derive(Default, Clone, Copy)]
pub struct IdentityKeyHasher;

impl KeyHasher<i64> for IdentityKeyHasher {
    fn hash_key(&self, key: &i64) -> u32 {
        *key as u32
    }
}

impl KeyHasher<u64> for IdentityKeyHasher {
    fn hash_key(&self, key: &u64) -> u32 {
        *key as u32
    }
}

impl KeyHasher<u32> for IdentityKeyHasher {
    fn hash_key(&self, key: &u32) -> u32 {
        *key
    }
}

pub struct DiskExtendibleHashTable<K, V, H = DefaultKeyHasher> {
    name: String,
    bpm: Arc<BufferPool>,
    header_page_id: PageId,
    directory_max_depth: u32,
    bucket_max_size: u32,
    hasher: H,
    _pd: PhantomData<fn() -> (K, V)>,
}

impl<K, V, H> DiskExtendibleHashTable<K, V, H>
where
    K: FromBytes + IntoBytes + Immutable + Copy + PartialEq,
    V: FromBytes + IntoBytes + Immutable + Copy,
    H: KeyHasher<K>,
{
    /// Creates a table rooted at a freshly allocated header page.
    pub fn new(
        name: impl Into<String>,
        bpm: Arc<BufferPool>,
        header_max_depth: u32,
        directory_max_depth: u32,
        bucket_max_size: u32,
        hasher: H,
    ) -> Result<Self> {
        ensure!(bucket_max_size > 0, "bucket size must be positive");
        ensure!(
            bucket_max_size as usize <= bucket_capacity_for::<K, V>(),
            "bucket size {} exceeds page capacity {}",
            bucket_max_size,
            bucket_capacity_for::<K, V>()
        );
        let Some((header_page_id, mut header)) = bpm.new_page_write()? else {
            bail!("buffer pool exhausted allocating hash table header");
        };
        HashHeaderPage::view_mut(header.data_mut())?.init(header_max_depth);
        drop(header);
        Ok(Self {
            name: name.into(),
            bpm,
            header_page_id,
            directory_max_depth,
            bucket_max_size,
            hasher,
            _pd: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    /// Looks a key up. Read guards the whole way down; each parent is
    /// released once its child is pinned.
    pub fn get_value(&self, key: &K) -> Result<Option<V>> {
        let hash = self.hasher.hash_key(key);

        let Some(header_guard) = self.bpm.fetch_page_read(self.header_page_id)? else {
            bail!("buffer pool exhausted fetching hash header");
        };
        let header = HashHeaderPage::view(header_guard.data())?;
        let directory_page_id = header.directory_page_id(header.hash_to_directory_index(hash));
        if directory_page_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let Some(dir_guard) = self.bpm.fetch_page_read(directory_page_id)? else {
            bail!("buffer pool exhausted fetching hash directory");
        };
        drop(header_guard);
        let directory = HashDirectoryPage::view(dir_guard.data())?;
        let bucket_page_id = directory.bucket_page_id(directory.hash_to_bucket_index(hash));
        if bucket_page_id == INVALID_PAGE_ID {
            return Ok(None);
        }

        let Some(bucket_guard) = self.bpm.fetch_page_read(bucket_page_id)? else {
            bail!("buffer pool exhausted fetching hash bucket");
        };
        drop(dir_guard);
        let bucket = HashBucketRef::<K, V>::new(bucket_guard.data());
        Ok(bucket.lookup(key))
    }

    /// Inserts a key/value pair. `Ok(false)` means the key already
    /// exists; a full bucket at maximum depth is an out-of-space error.
    pub fn insert(&self, key: K, value: V) -> Result<bool> {
        let hash = self.hasher.hash_key(&key);
        let mut dir_guard = self.directory_for_insert(hash)?;

        loop {
            let directory = HashDirectoryPage::view(dir_guard.data())?;
            let bucket_idx = directory.hash_to_bucket_index(hash);
            let bucket_page_id = directory.bucket_page_id(bucket_idx);

            if bucket_page_id == INVALID_PAGE_ID {
                // Fresh directory: materialize its first bucket.
                let Some((new_pid, mut bucket_guard)) = self.bpm.new_page_write()? else {
                    bail!("buffer pool exhausted allocating hash bucket");
                };
                HashBucketMut::<K, V>::new(bucket_guard.data_mut()).init(self.bucket_max_size as usize);
                drop(bucket_guard);
                let directory = HashDirectoryPage::view_mut(dir_guard.data_mut())?;
                directory.set_bucket_page_id(bucket_idx, new_pid);
                directory.set_local_depth(bucket_idx, 0);
                continue;
            }

            let Some(mut bucket_guard) = self.bpm.fetch_page_write(bucket_page_id)? else {
                bail!("buffer pool exhausted fetching hash bucket");
            };
            let mut bucket = HashBucketMut::<K, V>::new(bucket_guard.data_mut());

            if bucket.lookup(&key).is_some() {
                return Ok(false);
            }
            if !bucket.is_full() {
                let inserted = bucket.insert(&key, &value);
                debug_assert!(inserted);
                return Ok(true);
            }

            // Full: split, then retry.
            let local_depth = {
                let directory = HashDirectoryPage::view(dir_guard.data())?;
                directory.local_depth(bucket_idx)
            };
            if local_depth >= self.directory_max_depth_of(&dir_guard)? {
                bail!(
                    "hash table {} out of space: bucket at max depth {} is full",
                    self.name,
                    local_depth
                );
            }
            self.split_bucket(&mut dir_guard, bucket_guard, bucket_idx)?;
        }
    }

    /// Removes a key. Empty buckets merge with their split images and
    /// the directory shrinks when possible.
    pub fn remove(&self, key: &K) -> Result<bool> {
        let hash = self.hasher.hash_key(key);

        let Some(header_guard) = self.bpm.fetch_page_read(self.header_page_id)? else {
            bail!("buffer pool exhausted fetching hash header");
        };
        let header = HashHeaderPage::view(header_guard.data())?;
        let directory_page_id = header.directory_page_id(header.hash_to_directory_index(hash));
        if directory_page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let Some(mut dir_guard) = self.bpm.fetch_page_write(directory_page_id)? else {
            bail!("buffer pool exhausted fetching hash directory");
        };
        drop(header_guard);
        let directory = HashDirectoryPage::view(dir_guard.data())?;
        let bucket_idx = directory.hash_to_bucket_index(hash);
        let bucket_page_id = directory.bucket_page_id(bucket_idx);
        if bucket_page_id == INVALID_PAGE_ID {
            return Ok(false);
        }

        let Some(mut bucket_guard) = self.bpm.fetch_page_write(bucket_page_id)? else {
            bail!("buffer pool exhausted fetching hash bucket");
        };
        let mut bucket = HashBucketMut::<K, V>::new(bucket_guard.data_mut());
        if !bucket.remove(key) {
            return Ok(false);
        }
        let now_empty = bucket.is_empty();
        drop(bucket_guard);

        if now_empty {
            self.merge_buckets(&mut dir_guard, bucket_idx)?;
        }
        Ok(true)
    }

    /// Resolves (or lazily creates) the directory for `hash`, returning
    /// it write-latched. The header guard is held until the directory is
    /// pinned.
    fn directory_for_insert(&self, hash: u32) -> Result<crate::buffer::WritePageGuard> {
        let Some(mut header_guard) = self.bpm.fetch_page_write(self.header_page_id)? else {
            bail!("buffer pool exhausted fetching hash header");
        };
        let header = HashHeaderPage::view(header_guard.data())?;
        let directory_idx = header.hash_to_directory_index(hash);
        let existing = header.directory_page_id(directory_idx);
        if existing != INVALID_PAGE_ID {
            let Some(dir_guard) = self.bpm.fetch_page_write(existing)? else {
                bail!("buffer pool exhausted fetching hash directory");
            };
            return Ok(dir_guard);
        }

        let Some((directory_page_id, mut dir_guard)) = self.bpm.new_page_write()? else {
            bail!("buffer pool exhausted allocating hash directory");
        };
        HashDirectoryPage::view_mut(dir_guard.data_mut())?.init(self.directory_max_depth);
        HashHeaderPage::view_mut(header_guard.data_mut())?
            .set_directory_page_id(directory_idx, directory_page_id);
        debug!(
            table = %self.name,
            directory_idx,
            directory_page_id,
            "materialized hash directory"
        );
        Ok(dir_guard)
    }

    fn directory_max_depth_of(
        &self,
        dir_guard: &crate::buffer::WritePageGuard,
    ) -> Result<u32> {
        Ok(HashDirectoryPage::view(dir_guard.data())?.max_depth())
    }

    /// Splits the full bucket at `bucket_idx`, growing the directory
    /// first when the new local depth needs an extra decoded bit.
    fn split_bucket(
        &self,
        dir_guard: &mut crate::buffer::WritePageGuard,
        mut bucket_guard: crate::buffer::WritePageGuard,
        bucket_idx: usize,
    ) -> Result<()> {
        let old_page_id = bucket_guard.page_id();
        let (local_depth, global_depth) = {
            let directory = HashDirectoryPage::view(dir_guard.data())?;
            (directory.local_depth(bucket_idx), directory.global_depth())
        };

        if local_depth == global_depth {
            HashDirectoryPage::view_mut(dir_guard.data_mut())?.incr_global_depth()?;
        }

        let Some((image_page_id, mut image_guard)) = self.bpm.new_page_write()? else {
            bail!("buffer pool exhausted allocating split bucket");
        };
        let mut image = HashBucketMut::<K, V>::new(image_guard.data_mut());
        image.init(self.bucket_max_size as usize);

        // Repoint directory slots: among the aliases of the old bucket,
        // those with the new distinguishing bit set move to the image.
        let new_depth = local_depth + 1;
        let split_bit = 1usize << local_depth;
        {
            let directory = HashDirectoryPage::view_mut(dir_guard.data_mut())?;
            for i in 0..directory.size() {
                if directory.bucket_page_id(i) == old_page_id {
                    directory.set_local_depth(i, new_depth);
                    if i & split_bit != 0 {
                        directory.set_bucket_page_id(i, image_page_id);
                    }
                }
            }
        }

        // Redistribute entries by the same bit.
        let mut bucket = HashBucketMut::<K, V>::new(bucket_guard.data_mut());
        let entries = bucket.drain();
        for (k, v) in entries {
            let target_is_image = (self.hasher.hash_key(&k) as usize) & split_bit != 0;
            let inserted = if target_is_image {
                image.insert(&k, &v)
            } else {
                bucket.insert(&k, &v)
            };
            ensure!(inserted, "split redistribution overflowed a bucket");
        }
        debug!(
            table = %self.name,
            old_page_id,
            image_page_id,
            new_depth,
            "split hash bucket"
        );
        Ok(())
    }

    /// Merges empty buckets with their split images transitively, then
    /// shrinks the directory while every local depth allows it.
    fn merge_buckets(
        &self,
        dir_guard: &mut crate::buffer::WritePageGuard,
        start_idx: usize,
    ) -> Result<()> {
        let mut bucket_idx = start_idx;
        loop {
            let (local_depth, bucket_page_id, image_idx) = {
                let directory = HashDirectoryPage::view(dir_guard.data())?;
                let ld = directory.local_depth(bucket_idx);
                if ld == 0 {
                    break;
                }
                (
                    ld,
                    directory.bucket_page_id(bucket_idx),
                    directory.split_image_index(bucket_idx),
                )
            };
            let image_page_id = {
                let directory = HashDirectoryPage::view(dir_guard.data())?;
                if directory.local_depth(image_idx) != local_depth {
                    break;
                }
                directory.bucket_page_id(image_idx)
            };
            if image_page_id == bucket_page_id || image_page_id == INVALID_PAGE_ID {
                break;
            }

            let bucket_empty = self.bucket_is_empty(bucket_page_id)?;
            let image_empty = self.bucket_is_empty(image_page_id)?;
            let (dead_page_id, survivor_page_id) = if bucket_empty {
                (bucket_page_id, image_page_id)
            } else if image_empty {
                (image_page_id, bucket_page_id)
            } else {
                break;
            };

            {
                let directory = HashDirectoryPage::view_mut(dir_guard.data_mut())?;
                for i in 0..directory.size() {
                    let pid = directory.bucket_page_id(i);
                    if pid == dead_page_id || pid == survivor_page_id {
                        directory.set_bucket_page_id(i, survivor_page_id);
                        directory.set_local_depth(i, local_depth - 1);
                    }
                }
            }
            self.bpm.delete_page(dead_page_id)?;
            trace!(
                table = %self.name,
                dead_page_id,
                survivor_page_id,
                "merged hash buckets"
            );

            // Continue from the merged bucket: it may itself be empty
            // with a same-depth image.
            bucket_idx &= !(1usize << (local_depth - 1));
        }

        let directory = HashDirectoryPage::view_mut(dir_guard.data_mut())?;
        while directory.can_shrink() {
            directory.decr_global_depth()?;
        }
        Ok(())
    }

    fn bucket_is_empty(&self, page_id: PageId) -> Result<bool> {
        let Some(guard) = self.bpm.fetch_page_read(page_id)? else {
            bail!("buffer pool exhausted fetching hash bucket");
        };
        Ok(HashBucketRef::<K, V>::new(guard.data()).is_empty())
    }

    /// Runs the directory invariant check on every materialized
    /// directory. Test helper.
    pub fn verify_integrity(&self) -> Result<()> {
        let Some(header_guard) = self.bpm.fetch_page_read(self.header_page_id)? else {
            bail!("buffer pool exhausted fetching hash header");
        };
        let header = HashHeaderPage::view(header_guard.data())?;
        let directory_ids: Vec<PageId> = (0..header.max_size())
            .map(|i| header.directory_page_id(i))
            .filter(|&pid| pid != INVALID_PAGE_ID)
            .collect();
        drop(header_guard);

        for pid in directory_ids {
            let Some(guard) = self.bpm.fetch_page_read(pid)? else {
                bail!("buffer pool exhausted fetching hash directory");
            };
            HashDirectoryPage::view(guard.data())?.verify_integrity()?;
        }
        Ok(())
    }
}
