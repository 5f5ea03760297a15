//! # Rewrite Rules
//!
//! The individual plan transformations. Rules are idempotent, return
//! `None` when no transformation applies, allocate rewritten nodes in
//! the caller's arena, and preserve query semantics.

mod nlj_as_hash_join;
mod seq_scan_as_index_scan;
mod sort_limit_as_topn;

pub use nlj_as_hash_join::NljAsHashJoinRule;
pub use seq_scan_as_index_scan::SeqScanAsIndexScanRule;
pub use sort_limit_as_topn::SortLimitAsTopNRule;
