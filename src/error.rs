use core::alloc::Layout;
use core::fmt;

use alloc::alloc::handle_alloc_error;

/// The error returned by [`HashTable::try_reserve`].
///
/// The infallible API never surfaces this type: capacity overflow panics and
/// allocator failure aborts through [`handle_alloc_error`].
///
/// [`HashTable::try_reserve`]: crate::HashTable::try_reserve
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TryReserveError {
    /// The requested table size does not fit in `usize`, or the slot buffers
    /// would exceed `isize::MAX` bytes.
    CapacityOverflow,
    /// The allocator refused to provide memory for one of the slot buffers.
    AllocError {
        /// The layout of the rejected allocation.
        layout: Layout,
    },
}

impl fmt::Display for TryReserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryReserveError::CapacityOverflow => {
                f.write_str("capacity overflow while sizing hash table slots")
            }
            TryReserveError::AllocError { layout } => write!(
                f,
                "memory allocation of {} bytes for hash table slots failed",
                layout.size()
            ),
        }
    }
}

impl core::error::Error for TryReserveError {}

/// Panics with the capacity overflow message.
#[cold]
#[inline(never)]
pub(crate) fn capacity_overflow() -> ! {
    panic!("Allocation Error: hash table capacity overflow")
}

/// Converts the result of a fallible sizing step into the abort-on-failure
/// behavior of the infallible API.
#[inline]
pub(crate) fn infallible<T>(result: Result<T, TryReserveError>) -> T {
    match result {
        Ok(value) => value,
        Err(TryReserveError::CapacityOverflow) => capacity_overflow(),
        Err(TryReserveError::AllocError { layout }) => handle_alloc_error(layout),
    }
}
