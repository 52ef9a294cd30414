//! Hash codes and the hashing capability a [`HashTable`] is parameterized
//! over.
//!
//! Every key is reduced to a 32-bit [`HashCode`] that is never zero, because
//! the table stores `0` in its slot-code array to mark an empty slot. Built-in
//! key types go through [`TableKey`]:
//!
//! - integers are mixed with a PCG step and an xorshift-rotate finalizer,
//!   except `u32`, which only forces its high bit;
//! - byte strings accumulate FNV-1a over their content and then run the same
//!   finalizer;
//! - pointers hash their address through the 64-bit integer path.
//!
//! Keys that only implement [`core::hash::Hash`] can use [`BuildKeyHasher`]
//! with any [`BuildHasher`].
//!
//! [`HashTable`]: crate::HashTable

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::num::NonZeroU32;
use core::ptr::NonNull;

const HIGH_BIT: u32 = 0x8000_0000;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const PCG_MULTIPLIER: u64 = 6_364_136_223_846_793_005;
const PCG_INCREMENT: u64 = 1_442_695_040_888_963_407;

/// A 32-bit hash code that is guaranteed to be non-zero.
///
/// The table reserves the code `0` for unoccupied slots, so every hasher must
/// produce a `HashCode`. [`HashCode::new`] sets the high bit of its input,
/// which keeps the low bits (the ones used for slot addressing) untouched.
///
/// ```rust
/// use probe_table::HashCode;
///
/// let code = HashCode::new(0);
/// assert_eq!(code.get(), 0x8000_0000);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct HashCode(NonZeroU32);

impl HashCode {
    /// Creates a hash code from a raw 32-bit value by forcing its high bit.
    #[inline(always)]
    pub const fn new(raw: u32) -> Self {
        // SAFETY: The high bit is set, so the value can never be zero.
        Self(unsafe { NonZeroU32::new_unchecked(raw | HIGH_BIT) })
    }

    /// Wraps an already non-zero code without altering it.
    ///
    /// Custom hashers that want to use the full 32-bit range can use this
    /// instead of [`HashCode::new`].
    #[inline(always)]
    pub const fn from_nonzero(code: NonZeroU32) -> Self {
        Self(code)
    }

    /// Folds a 64-bit digest into a hash code.
    #[inline(always)]
    pub const fn from_u64(digest: u64) -> Self {
        Self::new((digest ^ (digest >> 32)) as u32)
    }

    /// Combines two codes into one, for compound keys.
    ///
    /// The combination is order-sensitive: `a.combine(b)` and `b.combine(a)`
    /// differ for almost every pair.
    #[inline(always)]
    pub const fn combine(self, other: HashCode) -> Self {
        hash_u64(((self.get() as u64) << 32) | other.get() as u64)
    }

    /// Returns the raw code stored in the slot-code array.
    #[inline(always)]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Debug for HashCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashCode({:#010x})", self.get())
    }
}

/// 64-bit FNV-1a over `bytes`.
#[inline]
pub const fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// PCG XSH-RR output permutation: reduces a 64-bit state to 32 well-mixed
/// bits.
#[inline(always)]
pub const fn pcg_finalize(state: u64) -> u32 {
    let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
    let rotation = (state >> 59) as u32;
    xorshifted.rotate_right(rotation)
}

/// Hashes a 64-bit integer: one PCG state step, then the output permutation.
#[inline(always)]
pub const fn hash_u64(value: u64) -> HashCode {
    let state = value
        .wrapping_mul(PCG_MULTIPLIER)
        .wrapping_add(PCG_INCREMENT);
    HashCode::new(pcg_finalize(state))
}

/// Hashes a 32-bit integer by forcing its high bit and nothing else.
///
/// Dense `u32` keys therefore land in consecutive home slots.
#[inline(always)]
pub const fn hash_u32(value: u32) -> HashCode {
    HashCode::new(value)
}

/// Hashes the full content of a byte string.
#[inline]
pub const fn hash_bytes(bytes: &[u8]) -> HashCode {
    HashCode::new(pcg_finalize(fnv1a(bytes)))
}

#[inline(always)]
const fn hash_u128(value: u128) -> HashCode {
    hash_u64((value >> 64) as u64).combine(hash_u64(value as u64))
}

/// Byte-content equality: lengths first, then the bytes.
#[inline]
fn bytes_eq(stored: &[u8], probe: &[u8]) -> bool {
    stored.len() == probe.len() && stored == probe
}

/// The hashing and equality capability of a [`HashTable`].
///
/// A table calls [`hash_key`] once per operation and [`eq_keys`] only for
/// slots whose stored code equals the probe code.
///
/// Implementations must be consistent: keys that compare equal must hash to
/// the same code.
///
/// [`HashTable`]: crate::HashTable
/// [`hash_key`]: KeyHasher::hash_key
/// [`eq_keys`]: KeyHasher::eq_keys
pub trait KeyHasher<K: ?Sized> {
    /// Computes the code of `key`.
    fn hash_key(&self, key: &K) -> HashCode;

    /// Returns `true` if the stored key and the probe key are the same key.
    fn eq_keys(&self, stored: &K, probe: &K) -> bool;
}

/// Per-type hashing for key types with a built-in table hash.
///
/// Equality defaults to [`Eq`]; byte-string keys override it with a
/// length-then-content comparison.
///
/// ```rust
/// use probe_table::HashCode;
/// use probe_table::TableKey;
/// use probe_table::hash_code::hash_u64;
///
/// #[derive(PartialEq, Eq)]
/// struct ActorId(u64);
///
/// impl TableKey for ActorId {
///     fn table_hash(&self) -> HashCode {
///         hash_u64(self.0)
///     }
/// }
///
/// assert_eq!(ActorId(7).table_hash(), hash_u64(7));
/// ```
pub trait TableKey: Eq {
    /// Computes the table hash of `self`.
    fn table_hash(&self) -> HashCode;

    /// Compares `self` with another key.
    #[inline(always)]
    fn table_eq(&self, other: &Self) -> bool {
        self == other
    }
}

/// The hasher used by tables created with [`HashTable::new`]; dispatches to
/// [`TableKey`].
///
/// [`HashTable::new`]: crate::HashTable::new
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultKeyHasher;

impl<K> KeyHasher<K> for DefaultKeyHasher
where
    K: TableKey + ?Sized,
{
    #[inline(always)]
    fn hash_key(&self, key: &K) -> HashCode {
        key.table_hash()
    }

    #[inline(always)]
    fn eq_keys(&self, stored: &K, probe: &K) -> bool {
        stored.table_eq(probe)
    }
}

/// Adapts a standard [`BuildHasher`] into a [`KeyHasher`] for any
/// `Hash + Eq` key. The 64-bit digest is folded with
/// [`HashCode::from_u64`].
///
/// ```rust
/// use std::collections::hash_map::RandomState;
///
/// use probe_table::BuildKeyHasher;
/// use probe_table::HashTable;
///
/// let mut table = HashTable::with_hasher(BuildKeyHasher::new(RandomState::new()));
/// table.insert(vec![1u16, 2, 3], "path");
/// assert_eq!(table.find(&vec![1, 2, 3]), Some(&"path"));
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct BuildKeyHasher<S>(S);

impl<S> BuildKeyHasher<S> {
    /// Wraps a hasher builder.
    pub const fn new(hash_builder: S) -> Self {
        Self(hash_builder)
    }

    /// Returns the wrapped hasher builder.
    pub fn hash_builder(&self) -> &S {
        &self.0
    }
}

impl<K, S> KeyHasher<K> for BuildKeyHasher<S>
where
    K: Hash + Eq + ?Sized,
    S: BuildHasher,
{
    #[inline]
    fn hash_key(&self, key: &K) -> HashCode {
        HashCode::from_u64(self.0.hash_one(key))
    }

    #[inline(always)]
    fn eq_keys(&self, stored: &K, probe: &K) -> bool {
        stored == probe
    }
}

/// A [`BuildKeyHasher`] backed by foldhash's fixed-seed fast hasher.
#[cfg(feature = "foldhash")]
pub type FoldKeyHasher = BuildKeyHasher<foldhash::fast::FixedState>;

macro_rules! impl_widening_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TableKey for $ty {
                #[inline(always)]
                fn table_hash(&self) -> HashCode {
                    hash_u64(*self as u64)
                }
            }
        )*
    };
}

impl_widening_key!(u8, u16, u64, i8, i16, i32, i64, bool, char);

impl TableKey for u32 {
    #[inline(always)]
    fn table_hash(&self) -> HashCode {
        hash_u32(*self)
    }
}

impl TableKey for u128 {
    #[inline(always)]
    fn table_hash(&self) -> HashCode {
        hash_u128(*self)
    }
}

impl TableKey for i128 {
    #[inline(always)]
    fn table_hash(&self) -> HashCode {
        hash_u128(*self as u128)
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_pointer_width = "64")] {
        impl TableKey for usize {
            #[inline(always)]
            fn table_hash(&self) -> HashCode {
                hash_u64(*self as u64)
            }
        }

        impl TableKey for isize {
            #[inline(always)]
            fn table_hash(&self) -> HashCode {
                hash_u64(*self as u64)
            }
        }
    } else {
        impl TableKey for usize {
            #[inline(always)]
            fn table_hash(&self) -> HashCode {
                hash_u32(*self as u32)
            }
        }

        impl TableKey for isize {
            #[inline(always)]
            fn table_hash(&self) -> HashCode {
                hash_u32(*self as u32)
            }
        }
    }
}

impl<T: ?Sized> TableKey for *const T {
    #[inline(always)]
    fn table_hash(&self) -> HashCode {
        hash_u64(self.addr() as u64)
    }
}

impl<T: ?Sized> TableKey for *mut T {
    #[inline(always)]
    fn table_hash(&self) -> HashCode {
        hash_u64(self.addr() as u64)
    }
}

impl<T: ?Sized> TableKey for NonNull<T> {
    #[inline(always)]
    fn table_hash(&self) -> HashCode {
        hash_u64(self.as_ptr().addr() as u64)
    }
}

impl TableKey for [u8] {
    #[inline]
    fn table_hash(&self) -> HashCode {
        hash_bytes(self)
    }

    #[inline]
    fn table_eq(&self, other: &Self) -> bool {
        bytes_eq(self, other)
    }
}

impl TableKey for str {
    #[inline]
    fn table_hash(&self) -> HashCode {
        hash_bytes(self.as_bytes())
    }

    #[inline]
    fn table_eq(&self, other: &Self) -> bool {
        bytes_eq(self.as_bytes(), other.as_bytes())
    }
}

impl TableKey for String {
    #[inline]
    fn table_hash(&self) -> HashCode {
        self.as_str().table_hash()
    }

    #[inline]
    fn table_eq(&self, other: &Self) -> bool {
        self.as_str().table_eq(other.as_str())
    }
}

impl TableKey for Vec<u8> {
    #[inline]
    fn table_hash(&self) -> HashCode {
        self.as_slice().table_hash()
    }

    #[inline]
    fn table_eq(&self, other: &Self) -> bool {
        self.as_slice().table_eq(other.as_slice())
    }
}

impl<T: TableKey + ?Sized> TableKey for &T {
    #[inline(always)]
    fn table_hash(&self) -> HashCode {
        (**self).table_hash()
    }

    #[inline(always)]
    fn table_eq(&self, other: &Self) -> bool {
        (**self).table_eq(*other)
    }
}

impl<T: TableKey + ?Sized> TableKey for Box<T> {
    #[inline(always)]
    fn table_hash(&self) -> HashCode {
        (**self).table_hash()
    }

    #[inline(always)]
    fn table_eq(&self, other: &Self) -> bool {
        (**self).table_eq(other)
    }
}

impl<A: TableKey, B: TableKey> TableKey for (A, B) {
    #[inline]
    fn table_hash(&self) -> HashCode {
        self.0.table_hash().combine(self.1.table_hash())
    }

    #[inline]
    fn table_eq(&self, other: &Self) -> bool {
        self.0.table_eq(&other.0) && self.1.table_eq(&other.1)
    }
}

impl<A: TableKey, B: TableKey, C: TableKey> TableKey for (A, B, C) {
    #[inline]
    fn table_hash(&self) -> HashCode {
        self.0
            .table_hash()
            .combine(self.1.table_hash())
            .combine(self.2.table_hash())
    }

    #[inline]
    fn table_eq(&self, other: &Self) -> bool {
        self.0.table_eq(&other.0) && self.1.table_eq(&other.1) && self.2.table_eq(&other.2)
    }
}

impl<T: TableKey, const N: usize> TableKey for [T; N] {
    #[inline]
    fn table_hash(&self) -> HashCode {
        self.iter()
            .fold(hash_u64(N as u64), |code, item| code.combine(item.table_hash()))
    }

    #[inline]
    fn table_eq(&self, other: &Self) -> bool {
        self.iter().zip(other).all(|(a, b)| a.table_eq(b))
    }
}
