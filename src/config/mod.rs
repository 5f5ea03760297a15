//! # Configuration Module
//!
//! Centralizes the numeric constants of the storage core. Interdependent
//! values (page size vs. page-struct sizes, header vs. directory depth
//! bounds) live together so mismatches are caught by the compile-time
//! assertions in [`constants`].

pub mod constants;
pub use constants::*;
