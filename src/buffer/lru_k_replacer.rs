//! # LRU-K Replacer
//!
//! Tracks access history per frame and evicts the frame whose K-th most
//! recent access is furthest in the past. Frames with fewer than K
//! recorded accesses have infinite K-distance and are evicted first, in
//! first-access order.
//!
//! ## Structure
//!
//! Resident frames are partitioned into two ordered lists:
//!
//! - `inf_list`: history shorter than K, ordered by first recorded access
//! - `k_list`: history of exactly K, ordered by ascending oldest-of-last-K
//!   timestamp (front = largest K-distance)
//!
//! Eviction takes the first *evictable* frame of `inf_list`, falling back
//! to `k_list`. List maintenance is O(n) per access; pools here are small
//! enough that this beats intrusive-list bookkeeping.
//!
//! ## Thread safety
//!
//! None. The replacer is only touched while the buffer pool's mutex is
//! held.

use std::collections::{HashMap, VecDeque};

use eyre::{bail, ensure, Result};

use crate::config::FrameId;

struct LruKNode {
    /// Last ≤ K access timestamps, oldest first.
    history: VecDeque<u64>,
    evictable: bool,
}

pub struct LruKReplacer {
    num_frames: usize,
    k: usize,
    clock: u64,
    curr_size: usize,
    nodes: HashMap<FrameId, LruKNode>,
    inf_list: Vec<FrameId>,
    k_list: Vec<FrameId>,
}

impl LruKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k >= 1, "k must be at least 1");
        Self {
            num_frames,
            k,
            clock: 0,
            curr_size: 0,
            nodes: HashMap::with_capacity(num_frames),
            inf_list: Vec::new(),
            k_list: Vec::new(),
        }
    }

    /// Records an access to `frame_id` at the current virtual time,
    /// creating its node if this is the first access since residency.
    pub fn record_access(&mut self, frame_id: FrameId) -> Result<()> {
        ensure!(
            frame_id < self.num_frames,
            "frame id {} out of range (pool has {} frames)",
            frame_id,
            self.num_frames
        );

        let now = self.clock;
        self.clock += 1;

        let node = self.nodes.entry(frame_id).or_insert_with(|| LruKNode {
            history: VecDeque::new(),
            evictable: false,
        });
        let was_full = node.history.len() >= self.k;
        node.history.push_back(now);
        while node.history.len() > self.k {
            node.history.pop_front();
        }
        let is_full = node.history.len() >= self.k;
        let key = *node.history.front().expect("history never empty here");

        if !is_full {
            // Still infinite K-distance: keep first-access order, so only
            // append if the frame is not already listed.
            if !self.inf_list.contains(&frame_id) {
                self.inf_list.push(frame_id);
            }
        } else {
            if !was_full {
                self.inf_list.retain(|&f| f != frame_id);
            } else {
                self.k_list.retain(|&f| f != frame_id);
            }
            let pos = self
                .k_list
                .iter()
                .position(|f| {
                    let front = *self.nodes[f].history.front().expect("k node has history");
                    front > key
                })
                .unwrap_or(self.k_list.len());
            self.k_list.insert(pos, frame_id);
        }
        Ok(())
    }

    /// Toggles evictability; a no-op when already in the requested state.
    pub fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> Result<()> {
        let Some(node) = self.nodes.get_mut(&frame_id) else {
            bail!("frame id {} is not tracked by the replacer", frame_id);
        };
        if node.evictable == evictable {
            return Ok(());
        }
        node.evictable = evictable;
        if evictable {
            self.curr_size += 1;
        } else {
            self.curr_size -= 1;
        }
        Ok(())
    }

    /// Evicts the frame with the largest K-distance among evictable
    /// frames. Returns `None` when nothing is evictable.
    pub fn evict(&mut self) -> Option<FrameId> {
        if self.curr_size == 0 {
            return None;
        }
        let pick = |list: &[FrameId], nodes: &HashMap<FrameId, LruKNode>| {
            list.iter().copied().find(|f| nodes[f].evictable)
        };
        let victim = pick(&self.inf_list, &self.nodes).or_else(|| pick(&self.k_list, &self.nodes))?;

        self.nodes.remove(&victim);
        self.inf_list.retain(|&f| f != victim);
        self.k_list.retain(|&f| f != victim);
        self.curr_size -= 1;
        Some(victim)
    }

    /// Drops a frame from the replacer regardless of its K-distance.
    /// Removing a non-evictable frame is a caller bug.
    pub fn remove(&mut self, frame_id: FrameId) -> Result<()> {
        ensure!(
            frame_id < self.num_frames,
            "frame id {} out of range (pool has {} frames)",
            frame_id,
            self.num_frames
        );
        let Some(node) = self.nodes.get(&frame_id) else {
            return Ok(());
        };
        ensure!(
            node.evictable,
            "remove called on non-evictable frame {}",
            frame_id
        );
        self.nodes.remove(&frame_id);
        self.inf_list.retain(|&f| f != frame_id);
        self.k_list.retain(|&f| f != frame_id);
        self.curr_size -= 1;
        Ok(())
    }

    /// Number of evictable resident frames.
    pub fn size(&self) -> usize {
        self.curr_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_evictable(r: &mut LruKReplacer, frames: &[FrameId]) {
        for &f in frames {
            r.set_evictable(f, true).unwrap();
        }
    }

    #[test]
    fn evicts_infinite_distance_first_in_first_access_order() {
        let mut r = LruKReplacer::new(8, 2);
        // A=0 B=1 C=2 D=3, sequence A B C A B D
        for f in [0, 1, 2, 0, 1, 3] {
            r.record_access(f).unwrap();
        }
        all_evictable(&mut r, &[0, 1, 2, 3]);
        assert_eq!(r.size(), 4);

        // C has one access and the oldest first touch among the ∞ class.
        assert_eq!(r.evict(), Some(2));
        assert_eq!(r.evict(), Some(3));
        // K class: A's 2nd-last access (t=0) is older than B's (t=1).
        assert_eq!(r.evict(), Some(0));
        assert_eq!(r.evict(), Some(1));
        assert_eq!(r.evict(), None);
        assert_eq!(r.size(), 0);
    }

    #[test]
    fn k_equal_one_degenerates_to_lru() {
        let mut r = LruKReplacer::new(4, 1);
        for f in [0, 1, 2] {
            r.record_access(f).unwrap();
        }
        r.record_access(0).unwrap(); // 0 is now most recent
        all_evictable(&mut r, &[0, 1, 2]);

        assert_eq!(r.evict(), Some(1));
        assert_eq!(r.evict(), Some(2));
        assert_eq!(r.evict(), Some(0));
    }

    #[test]
    fn large_k_behaves_as_lru_over_infinite_class() {
        let mut r = LruKReplacer::new(4, 10);
        for f in [0, 1, 2, 1, 0] {
            r.record_access(f).unwrap();
        }
        all_evictable(&mut r, &[0, 1, 2]);
        // Nobody reaches K accesses: first-access order 0, 1, 2.
        assert_eq!(r.evict(), Some(0));
        assert_eq!(r.evict(), Some(1));
        assert_eq!(r.evict(), Some(2));
    }

    #[test]
    fn pinned_frames_are_skipped() {
        let mut r = LruKReplacer::new(4, 2);
        for f in [0, 1] {
            r.record_access(f).unwrap();
        }
        r.set_evictable(1, true).unwrap();

        assert_eq!(r.evict(), Some(1));
        assert_eq!(r.evict(), None);
    }

    #[test]
    fn set_evictable_is_idempotent_on_size() {
        let mut r = LruKReplacer::new(4, 2);
        r.record_access(0).unwrap();
        r.set_evictable(0, true).unwrap();
        r.set_evictable(0, true).unwrap();
        assert_eq!(r.size(), 1);
        r.set_evictable(0, false).unwrap();
        r.set_evictable(0, false).unwrap();
        assert_eq!(r.size(), 0);
    }

    #[test]
    fn record_access_rejects_out_of_range_frame() {
        let mut r = LruKReplacer::new(4, 2);
        assert!(r.record_access(4).is_err());
        assert!(r.record_access(3).is_ok());
    }

    #[test]
    fn remove_rejects_non_evictable_frame() {
        let mut r = LruKReplacer::new(4, 2);
        r.record_access(0).unwrap();
        assert!(r.remove(0).is_err());
        r.set_evictable(0, true).unwrap();
        r.remove(0).unwrap();
        assert_eq!(r.size(), 0);
        // Removing an untracked frame is a no-op.
        r.remove(0).unwrap();
    }

    #[test]
    fn reaccess_promotes_from_infinite_to_k_class() {
        let mut r = LruKReplacer::new(4, 2);
        r.record_access(0).unwrap();
        r.record_access(1).unwrap();
        r.record_access(0).unwrap(); // 0 graduates to the K class
        all_evictable(&mut r, &[0, 1]);

        // 1 still has infinite distance and goes first.
        assert_eq!(r.evict(), Some(1));
        assert_eq!(r.evict(), Some(0));
    }
}
