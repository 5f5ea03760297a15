//! # Watermark
//!
//! Tracks the multiset of active read timestamps as a sorted map of
//! `ts → count`. The published watermark is the smallest active read
//! timestamp, or the last commit timestamp when no reader is in flight.
//!
//! Invariants: no reader may register below `commit_ts`, and
//! `update_commit_ts` must be called before the last transaction at the
//! old baseline is removed.

use std::collections::BTreeMap;

use eyre::{bail, ensure, Result};

use crate::config::Timestamp;

#[derive(Debug, Default)]
pub struct Watermark {
    commit_ts: Timestamp,
    current_reads: BTreeMap<Timestamp, usize>,
}

impl Watermark {
    pub fn new(commit_ts: Timestamp) -> Self {
        Self {
            commit_ts,
            current_reads: BTreeMap::new(),
        }
    }

    /// Registers an in-flight reader.
    pub fn add_txn(&mut self, read_ts: Timestamp) -> Result<()> {
        ensure!(
            read_ts >= self.commit_ts,
            "read ts {} below commit ts {}",
            read_ts,
            self.commit_ts
        );
        *self.current_reads.entry(read_ts).or_insert(0) += 1;
        Ok(())
    }

    /// Unregisters a reader previously added at `read_ts`.
    pub fn remove_txn(&mut self, read_ts: Timestamp) -> Result<()> {
        let Some(count) = self.current_reads.get_mut(&read_ts) else {
            bail!("read ts {} is not registered", read_ts);
        };
        *count -= 1;
        if *count == 0 {
            self.current_reads.remove(&read_ts);
        }
        Ok(())
    }

    /// Advances the baseline used when no reader is active.
    pub fn update_commit_ts(&mut self, commit_ts: Timestamp) {
        self.commit_ts = commit_ts;
    }

    pub fn commit_ts(&self) -> Timestamp {
        self.commit_ts
    }

    pub fn watermark(&self) -> Timestamp {
        self.current_reads
            .keys()
            .next()
            .copied()
            .unwrap_or(self.commit_ts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_tracks_minimum_reader() {
        let mut w = Watermark::new(10);
        w.add_txn(12).unwrap();
        w.add_txn(11).unwrap();
        w.add_txn(12).unwrap();
        assert_eq!(w.watermark(), 11);

        w.remove_txn(11).unwrap();
        assert_eq!(w.watermark(), 12);

        w.remove_txn(12).unwrap();
        w.remove_txn(12).unwrap();
        assert_eq!(w.watermark(), 10);
    }

    #[test]
    fn empty_watermark_is_commit_ts() {
        let w = Watermark::new(42);
        assert_eq!(w.watermark(), 42);
    }

    #[test]
    fn rejects_reader_below_commit_ts() {
        let mut w = Watermark::new(10);
        assert!(w.add_txn(9).is_err());
        assert!(w.add_txn(10).is_ok());
    }

    #[test]
    fn rejects_removal_of_unknown_reader() {
        let mut w = Watermark::new(0);
        assert!(w.remove_txn(5).is_err());
        w.add_txn(5).unwrap();
        w.remove_txn(5).unwrap();
        assert!(w.remove_txn(5).is_err());
    }

    #[test]
    fn commit_ts_advances_baseline() {
        let mut w = Watermark::new(10);
        w.add_txn(10).unwrap();
        w.update_commit_ts(11);
        w.remove_txn(10).unwrap();
        assert_eq!(w.watermark(), 11);
        // Readers below the new baseline are now invalid.
        assert!(w.add_txn(10).is_err());
    }
}
