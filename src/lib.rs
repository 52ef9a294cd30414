#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// Error type for the fallible reservation path.
pub mod error;

pub mod hash_code;

/// A hash set built on [`HashTable`].
///
/// This module provides a `HashSet` that wraps a `HashTable` with unit values
/// and exposes the usual set interface and set algebra.
pub mod hash_set;

pub mod hash_table;

#[cfg(any(test, feature = "stats"))]
pub mod stats;

pub use error::TryReserveError;
#[cfg(feature = "foldhash")]
pub use hash_code::FoldKeyHasher;
pub use hash_code::BuildKeyHasher;
pub use hash_code::DefaultKeyHasher;
pub use hash_code::HashCode;
pub use hash_code::KeyHasher;
pub use hash_code::TableKey;
pub use hash_set::HashSet;
pub use hash_table::Entry;
pub use hash_table::HashTable;
