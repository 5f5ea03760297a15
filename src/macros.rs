//! # Internal Macros
//!
//! Boilerplate reduction for page structs that persist little-endian
//! fields through `zerocopy` wrapper types (`U32`, `U64`).
//!
//! ```ignore
//! use zerocopy::little_endian::U32;
//!
//! #[repr(C)]
//! struct DirectoryHeader {
//!     max_depth: U32,
//!     global_depth: U32,
//! }
//!
//! impl DirectoryHeader {
//!     zerocopy_accessors! {
//!         max_depth: u32,
//!         global_depth: u32,
//!     }
//! }
//! // Generates max_depth() / set_max_depth() and
//! // global_depth() / set_global_depth().
//! ```

/// Generates getter and setter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! zerocopy_accessors {
    (@impl $field:ident, u32) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u32 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u32) {
                self.$field = ::zerocopy::little_endian::U32::new(val);
            }
        }
    };
    (@impl $field:ident, u64) => {
        ::paste::paste! {
            #[inline]
            pub fn $field(&self) -> u64 {
                self.$field.get()
            }

            #[inline]
            pub fn [<set_ $field>](&mut self, val: u64) {
                self.$field = ::zerocopy::little_endian::U64::new(val);
            }
        }
    };
    ($($field:ident : $ty:tt),* $(,)?) => {
        $(
            $crate::zerocopy_accessors!(@impl $field, $ty);
        )*
    };
}
