#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Erase-safe positions within a table.
///
/// This module provides the read-only [`Cursor`], the erasing [`CursorMut`]
/// and the zero-sized [`End`] marker they both compare against.
pub mod cursor;

/// A hash set built on the chained table.
///
/// This module provides a `HashSet` that wraps a `HashTable` with `()` values
/// and adds in-place set algebra.
pub mod hash_set;

pub mod hash_table;

/// The textual pair-list form of tables and sets.
pub mod stream;

pub use cursor::Cursor;
pub use cursor::CursorMut;
pub use cursor::End;
pub use hash_set::HashSet;
pub use hash_table::DEFAULT_TABLE_SIZE;
pub use hash_table::HashTable;
pub use hash_table::MAX_TABLE_SIZE;
pub use hash_table::MIN_TABLE_SIZE;
pub use stream::ParseError;

cfg_if::cfg_if! {
    if #[cfg(feature = "foldhash")] {
        /// The hasher builder used when a table or set names none.
        pub type DefaultHashBuilder = foldhash::fast::RandomState;
    } else if #[cfg(feature = "std")] {
        /// The hasher builder used when a table or set names none.
        pub type DefaultHashBuilder = std::hash::RandomState;
    } else {
        /// Placeholder hasher builder when neither `foldhash` nor `std` is
        /// enabled. It cannot be constructed; supply a builder explicitly.
        pub enum DefaultHashBuilder {}
    }
}
