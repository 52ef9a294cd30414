//! The open-addressing [`HashTable`] and its entry and iterator types.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::alloc::Layout;
use core::fmt::Debug;
use core::iter::FusedIterator;
use core::iter::Zip;
use core::mem::MaybeUninit;
use core::ops::Range;
use core::slice;

use crate::error::TryReserveError;
use crate::error::infallible;
use crate::hash_code::DefaultKeyHasher;
use crate::hash_code::HashCode;
use crate::hash_code::KeyHasher;
#[cfg(any(test, feature = "stats"))]
use crate::stats::DebugStats;
#[cfg(any(test, feature = "stats"))]
use crate::stats::ProbeHistogram;

/// Slot code marking an unoccupied slot. Hashers can never produce it, see
/// [`HashCode`].
const EMPTY: u32 = 0;

/// Table size used by [`HashTable::new`] and [`HashTable::with_hasher`].
const DEFAULT_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Capacity {
    bits: u32,
}

impl Capacity {
    /// Stops one bit short of the pointer width so that
    /// `table_size + probe_len` always fits in a `usize`.
    const MAX_BITS: u32 = usize::BITS - 2;

    fn for_hint(hint: usize) -> Result<Self, TryReserveError> {
        let size = hint
            .checked_next_power_of_two()
            .ok_or(TryReserveError::CapacityOverflow)?;
        let bits = size.trailing_zeros();
        if bits > Self::MAX_BITS {
            return Err(TryReserveError::CapacityOverflow);
        }
        Ok(Capacity { bits })
    }

    fn doubled(self) -> Result<Self, TryReserveError> {
        if self.bits >= Self::MAX_BITS {
            return Err(TryReserveError::CapacityOverflow);
        }
        Ok(Capacity {
            bits: self.bits + 1,
        })
    }

    #[inline(always)]
    fn table_size(self) -> usize {
        1 << self.bits
    }

    #[inline(always)]
    fn probe_len(self) -> usize {
        self.bits as usize
    }

    #[inline(always)]
    fn total_slots(self) -> usize {
        self.table_size() + self.probe_len()
    }

    /// First slot of the probe window for `code`.
    #[inline(always)]
    fn home(self, code: u32) -> usize {
        code as usize & (self.table_size() - 1)
    }

    /// Probe window for `code`. Its end never exceeds `total_slots()`, since
    /// `home(code) <= table_size() - 1`.
    #[inline(always)]
    fn window(self, code: u32) -> Range<usize> {
        let start = self.home(code);
        start..start + self.probe_len()
    }
}

fn allocate_codes(capacity: Capacity) -> Result<Box<[u32]>, TryReserveError> {
    let total = capacity.total_slots();
    let layout = Layout::array::<u32>(total).map_err(|_| TryReserveError::CapacityOverflow)?;
    let mut codes = Vec::new();
    codes
        .try_reserve_exact(total)
        .map_err(|_| TryReserveError::AllocError { layout })?;
    codes.resize(total, EMPTY);
    Ok(codes.into_boxed_slice())
}

fn allocate_entries<T>(capacity: Capacity) -> Result<Box<[MaybeUninit<T>]>, TryReserveError> {
    let total = capacity.total_slots();
    let layout = Layout::array::<T>(total).map_err(|_| TryReserveError::CapacityOverflow)?;
    let mut entries = Vec::new();
    entries
        .try_reserve_exact(total)
        .map_err(|_| TryReserveError::AllocError { layout })?;
    entries.resize_with(total, MaybeUninit::uninit);
    Ok(entries.into_boxed_slice())
}

/// New slot positions for every live code of a table, computed before any
/// entry is moved.
struct Placement {
    capacity: Capacity,
    codes: Box<[u32]>,
    /// Destination slot of each live code, in ascending source-slot order.
    targets: Vec<usize>,
}

/// Lays out the live codes of `codes` into a fresh code array of at least
/// `capacity`, using the same first-empty-slot-in-window rule as insertion.
///
/// If some code finds its window full, the target capacity is doubled and
/// placement starts over. Every retry widens every window by one slot, and
/// [`Capacity::doubled`] bounds the loop.
fn place(
    codes: &[u32],
    live: usize,
    mut capacity: Capacity,
) -> Result<Placement, TryReserveError> {
    'retry: loop {
        let mut placed = allocate_codes(capacity)?;
        let mut targets = Vec::with_capacity(live);

        for &code in codes.iter().filter(|&&code| code != EMPTY) {
            let window = capacity.window(code);
            let start = window.start;
            match placed[window].iter().position(|&slot| slot == EMPTY) {
                Some(offset) => {
                    placed[start + offset] = code;
                    targets.push(start + offset);
                }
                None => {
                    capacity = capacity.doubled()?;
                    continue 'retry;
                }
            }
        }

        return Ok(Placement {
            capacity,
            codes: placed,
            targets,
        });
    }
}

enum Probe {
    Found(usize),
    Vacant(usize),
    Full,
}

enum Located {
    Occupied(usize),
    Vacant(usize),
}

/// An open-addressing hash table with linear probing over a bounded window.
///
/// Keys hash to a non-zero 32-bit [`HashCode`]. A key with code `h` always
/// lives in one of the `max_probe_length` slots starting at
/// `h & (capacity - 1)`, where `capacity` is a power of two and
/// `max_probe_length = log2(capacity)`. The backing arrays are
/// `max_probe_length` slots longer than `capacity`, so no window ever wraps
/// around and no probe needs a per-slot bounds check.
///
/// Lookups, inserts and removals therefore cost at most `log2(capacity)` slot
/// reads. When an insert finds its window full, the table doubles, which
/// also widens every window by one slot. There is no load-factor threshold
/// and the table never shrinks; a badly distributed hasher makes it grow
/// large instead of slow.
///
/// The hasher `H` is a [`KeyHasher`]. [`DefaultKeyHasher`] covers every
/// [`TableKey`] type: integers, strings, byte strings, pointers, tuples and
/// arrays of those.
///
/// ## Example
///
/// ```rust
/// use probe_table::HashTable;
///
/// let mut tiles: HashTable<(i32, i32), &str> = HashTable::new();
/// tiles.insert((0, 0), "floor");
/// tiles.insert((1, 0), "wall");
///
/// assert_eq!(tiles.find(&(1, 0)), Some(&"wall"));
/// assert!(tiles.erase(&(0, 0)));
/// assert_eq!(tiles.find(&(0, 0)), None);
/// assert_eq!(tiles.len(), 1);
/// ```
///
/// [`TableKey`]: crate::TableKey
pub struct HashTable<K, V, H = DefaultKeyHasher> {
    codes: Box<[u32]>,
    entries: Box<[MaybeUninit<(K, V)>]>,

    capacity: Capacity,
    populated: usize,

    hasher: H,
}

impl<K, V, H> Debug for HashTable<K, V, H>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, H> Clone for HashTable<K, V, H>
where
    K: Clone,
    V: Clone,
    H: Clone,
{
    /// Re-inserts every entry into fresh buffers of the same capacity.
    fn clone(&self) -> Self {
        let Placement {
            capacity,
            codes,
            targets,
        } = infallible(place(&self.codes, self.populated, self.capacity));
        let mut entries = infallible(allocate_entries(capacity));

        let live = self
            .codes
            .iter()
            .zip(self.entries.iter())
            .filter(|(code, _)| **code != EMPTY);
        for ((_, entry), target) in live.zip(targets) {
            // SAFETY: The filter only keeps slots with a non-zero code, and a
            // non-zero code marks an initialized entry.
            let (key, value) = unsafe { entry.assume_init_ref() };
            entries[target].write((key.clone(), value.clone()));
        }

        Self {
            codes,
            entries,
            capacity,
            populated: self.populated,
            hasher: self.hasher.clone(),
        }
    }
}

impl<K, V, H> Drop for HashTable<K, V, H> {
    fn drop(&mut self) {
        if core::mem::needs_drop::<(K, V)>() && self.populated > 0 {
            for (code, entry) in self.codes.iter().zip(self.entries.iter_mut()) {
                if *code != EMPTY {
                    // SAFETY: A non-zero code marks an initialized entry, and
                    // each entry is dropped exactly once here.
                    unsafe { entry.assume_init_drop() };
                }
            }
        }
    }
}

impl<K, V, H> Default for HashTable<K, V, H>
where
    H: Default,
{
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

impl<K, V> HashTable<K, V, DefaultKeyHasher> {
    /// Creates an empty table with the default capacity of 16 slots.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashTable;
    ///
    /// let table: HashTable<u64, u64> = HashTable::new();
    /// assert!(table.is_empty());
    /// assert_eq!(table.capacity(), 16);
    /// assert_eq!(table.max_probe_length(), 4);
    /// ```
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty table whose capacity is `capacity` rounded up to the
    /// next power of two.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashTable;
    ///
    /// let table: HashTable<u64, u64> = HashTable::with_capacity(100);
    /// assert_eq!(table.capacity(), 128);
    /// assert_eq!(table.max_probe_length(), 7);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultKeyHasher)
    }
}

impl<K, V, H> HashTable<K, V, H> {
    /// Creates an empty table with the default capacity and the given hasher.
    pub fn with_hasher(hasher: H) -> Self {
        Self::with_capacity_and_hasher(DEFAULT_CAPACITY, hasher)
    }

    /// Creates an empty table with at least `capacity` slots and the given
    /// hasher.
    ///
    /// # Panics
    ///
    /// Panics if the rounded capacity overflows `usize`.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: H) -> Self {
        let capacity = infallible(Capacity::for_hint(capacity));

        Self {
            codes: infallible(allocate_codes(capacity)),
            entries: infallible(allocate_entries(capacity)),
            capacity,
            populated: 0,
            hasher,
        }
    }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        self.populated
    }

    /// Returns `true` if the table contains no entries.
    pub fn is_empty(&self) -> bool {
        self.populated == 0
    }

    /// Returns the table size: the power of two that hash codes are masked
    /// with.
    ///
    /// The backing arrays hold `capacity() + max_probe_length()` slots. An
    /// insert may grow the table before it is full if a probe window is.
    pub fn capacity(&self) -> usize {
        self.capacity.table_size()
    }

    /// Returns the length of every probe window, `log2(capacity())`.
    pub fn max_probe_length(&self) -> usize {
        self.capacity.probe_len()
    }

    /// Returns a reference to the table's hasher.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Returns an iterator over the entries in slot order.
    ///
    /// Slot order depends on the hash codes and the capacity, and changes
    /// whenever the table grows. The iterator is double-ended.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashTable;
    ///
    /// let mut table = HashTable::new();
    /// table.insert("north", 1);
    /// table.insert("south", 2);
    ///
    /// let mut total = 0;
    /// for (_, cost) in table.iter() {
    ///     total += cost;
    /// }
    /// assert_eq!(total, 3);
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            slots: self.codes.iter().zip(self.entries.iter()),
            remaining: self.populated,
        }
    }

    /// Returns an iterator over the entries in slot order with mutable
    /// references to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            slots: self.codes.iter().zip(self.entries.iter_mut()),
            remaining: self.populated,
        }
    }

    /// Returns an iterator over the keys in slot order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values in slot order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable references to the values in slot
    /// order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Consumes the table and returns an iterator over its keys.
    pub fn into_keys(self) -> IntoKeys<K, V, H> {
        IntoKeys {
            inner: self.into_iter(),
        }
    }

    /// Consumes the table and returns an iterator over its values.
    pub fn into_values(self) -> IntoValues<K, V, H> {
        IntoValues {
            inner: self.into_iter(),
        }
    }

    /// Removes every entry and yields it, keeping the capacity.
    ///
    /// Entries the iterator does not reach are dropped when it is dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashTable;
    ///
    /// let mut table = HashTable::new();
    /// table.insert(1u64, "a");
    /// table.insert(2u64, "b");
    ///
    /// let mut drained: Vec<_> = table.drain().collect();
    /// drained.sort();
    /// assert_eq!(drained, [(1, "a"), (2, "b")]);
    /// assert!(table.is_empty());
    /// assert_eq!(table.capacity(), 16);
    /// ```
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        Drain {
            slots: self.codes.iter_mut().zip(self.entries.iter_mut()),
            populated: &mut self.populated,
        }
    }

    /// Drops every entry and zeroes every slot code. The capacity is kept.
    pub fn clear(&mut self) {
        if core::mem::needs_drop::<(K, V)>() && self.populated > 0 {
            for index in 0..self.codes.len() {
                if self.codes[index] != EMPTY {
                    // SAFETY: The code at `index` is non-zero.
                    drop(unsafe { self.vacate(index) });
                }
            }
        } else {
            self.codes.fill(EMPTY);
            self.populated = 0;
        }

        debug_assert_eq!(self.populated, 0);
    }

    /// Keeps only the entries for which `keep` returns `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashTable;
    ///
    /// let mut costs: HashTable<u32, u32> = (0..8).map(|k| (k, k * 10)).collect();
    /// costs.retain(|_, cost| *cost < 40);
    /// assert_eq!(costs.len(), 4);
    /// ```
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        for index in 0..self.codes.len() {
            if self.codes[index] == EMPTY {
                continue;
            }

            // SAFETY: The code at `index` is non-zero.
            let (key, value) = unsafe { self.entry_at_mut(index) };
            if !keep(key, value) {
                // SAFETY: The code at `index` is still non-zero.
                drop(unsafe { self.vacate(index) });
            }
        }
    }

    /// Grows the table so that at least `additional` more entries fit in
    /// `capacity()`.
    ///
    /// Inserts can still grow the table afterwards if a probe window fills.
    ///
    /// # Panics
    ///
    /// Panics if the new capacity overflows `usize`.
    pub fn reserve(&mut self, additional: usize) {
        infallible(self.try_reserve(additional))
    }

    /// Fallible version of [`reserve`](HashTable::reserve).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashTable;
    /// use probe_table::TryReserveError;
    ///
    /// let mut table: HashTable<u64, u64> = HashTable::new();
    /// assert!(table.try_reserve(1000).is_ok());
    /// assert!(table.capacity() >= 1000);
    ///
    /// assert_eq!(
    ///     table.try_reserve(usize::MAX),
    ///     Err(TryReserveError::CapacityOverflow)
    /// );
    /// ```
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let required = self
            .populated
            .checked_add(additional)
            .ok_or(TryReserveError::CapacityOverflow)?;
        if required <= self.capacity.table_size() {
            return Ok(());
        }

        let capacity = Capacity::for_hint(required)?;
        self.rebuild(capacity)
    }

    /// Doubles the table.
    #[cold]
    #[inline(never)]
    fn grow(&mut self) {
        let capacity = infallible(self.capacity.doubled());
        infallible(self.rebuild(capacity));
    }

    /// Moves every live entry into fresh buffers of at least `capacity`.
    ///
    /// Placement runs on the codes first, so an allocation failure leaves the
    /// table untouched.
    fn rebuild(&mut self, capacity: Capacity) -> Result<(), TryReserveError> {
        let Placement {
            capacity,
            codes,
            targets,
        } = place(&self.codes, self.populated, capacity)?;
        let mut entries = allocate_entries(capacity)?;

        let mut targets = targets.into_iter();
        for (index, &code) in self.codes.iter().enumerate() {
            if code == EMPTY {
                continue;
            }

            let Some(target) = targets.next() else {
                unreachable!("placement is missing a live slot");
            };
            // SAFETY: The code at `index` is non-zero so the entry is
            // initialized. It is read exactly once, and the old buffers are
            // released below without dropping their contents.
            let entry = unsafe { self.entries.get_unchecked(index).assume_init_read() };
            entries[target].write(entry);
        }
        debug_assert!(targets.next().is_none());

        self.codes = codes;
        self.entries = entries;
        self.capacity = capacity;
        Ok(())
    }

    /// Returns the entry at `index`.
    ///
    /// # Safety
    ///
    /// The slot code at `index` must be non-zero.
    #[inline(always)]
    unsafe fn entry_at(&self, index: usize) -> &(K, V) {
        // SAFETY: Caller ensures the slot is live, which also puts `index`
        // inside both buffers.
        unsafe {
            debug_assert_ne!(self.codes[index], EMPTY);
            self.entries.get_unchecked(index).assume_init_ref()
        }
    }

    /// Returns the entry at `index` mutably.
    ///
    /// # Safety
    ///
    /// The slot code at `index` must be non-zero.
    #[inline(always)]
    unsafe fn entry_at_mut(&mut self, index: usize) -> &mut (K, V) {
        // SAFETY: Caller ensures the slot is live, which also puts `index`
        // inside both buffers.
        unsafe {
            debug_assert_ne!(self.codes[index], EMPTY);
            self.entries.get_unchecked_mut(index).assume_init_mut()
        }
    }

    /// Constructs an entry in the empty slot `index`.
    ///
    /// # Safety
    ///
    /// `index` must be an empty slot inside the probe window of `code`.
    #[inline(always)]
    unsafe fn occupy(&mut self, index: usize, code: HashCode, key: K, value: V) -> &mut V {
        // SAFETY: Caller ensures `index` is inside the window of `code`, and
        // every window lies inside both buffers.
        unsafe {
            debug_assert!(self.capacity.window(code.get()).contains(&index));
            debug_assert_eq!(*self.codes.get_unchecked(index), EMPTY);

            *self.codes.get_unchecked_mut(index) = code.get();
            self.populated += 1;
            &mut self.entries.get_unchecked_mut(index).write((key, value)).1
        }
    }

    /// Moves the entry out of slot `index` and marks the slot empty.
    ///
    /// # Safety
    ///
    /// The slot code at `index` must be non-zero.
    #[inline(always)]
    unsafe fn vacate(&mut self, index: usize) -> (K, V) {
        // SAFETY: Caller ensures the slot is live. Zeroing the code first
        // means the entry is never read again.
        unsafe {
            debug_assert_ne!(*self.codes.get_unchecked(index), EMPTY);

            *self.codes.get_unchecked_mut(index) = EMPTY;
            self.populated -= 1;
            self.entries.get_unchecked(index).assume_init_read()
        }
    }

    /// Computes a histogram of how far each entry sits from its home slot.
    ///
    /// Bin `d` counts the entries stored `d` slots past `hash & (capacity -
    /// 1)`; there are `max_probe_length()` bins.
    #[cfg(any(test, feature = "stats"))]
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mut bins = alloc::vec![0usize; self.capacity.probe_len()];
        for (index, &code) in self.codes.iter().enumerate() {
            if code != EMPTY {
                bins[index - self.capacity.home(code)] += 1;
            }
        }

        ProbeHistogram::new(bins, self.populated)
    }

    /// Returns detailed utilization statistics for debugging.
    #[cfg(any(test, feature = "stats"))]
    pub fn debug_stats(&self) -> DebugStats {
        let table_size = self.capacity.table_size();
        let total_slots = self.capacity.total_slots();
        let overflow_occupied = self.codes[table_size..]
            .iter()
            .filter(|&&code| code != EMPTY)
            .count();
        let slot_bytes = core::mem::size_of::<u32>() + core::mem::size_of::<(K, V)>();

        DebugStats {
            populated: self.populated,
            table_size,
            max_probe_length: self.capacity.probe_len(),
            total_slots,
            overflow_occupied,
            load_factor: self.populated as f64 / table_size as f64,
            slot_utilization: self.populated as f64 / total_slots as f64,
            total_bytes: total_slots * slot_bytes,
            wasted_bytes: (total_slots - self.populated) * slot_bytes,
        }
    }
}

impl<K, V, H> HashTable<K, V, H>
where
    H: KeyHasher<K>,
{
    /// Scans the window of `code` for `key`.
    #[inline]
    fn find_index(&self, code: HashCode, key: &K) -> Option<usize> {
        let code = code.get();
        for index in self.capacity.window(code) {
            // SAFETY: Windows never extend past `total_slots()`, the length of
            // both buffers.
            if unsafe { *self.codes.get_unchecked(index) } != code {
                continue;
            }

            // SAFETY: The code at `index` equals `code`, which is non-zero.
            let (stored, _) = unsafe { self.entry_at(index) };
            if self.hasher.eq_keys(stored, key) {
                return Some(index);
            }
        }

        None
    }

    /// Scans the window of `code` once, looking for `key` and remembering
    /// the first empty slot.
    #[inline]
    fn probe(&self, code: HashCode, key: &K) -> Probe {
        let code = code.get();
        let mut vacant = None;
        for index in self.capacity.window(code) {
            // SAFETY: Windows never extend past `total_slots()`, the length of
            // both buffers.
            let stored_code = unsafe { *self.codes.get_unchecked(index) };
            if stored_code == code {
                // SAFETY: The code at `index` equals `code`, which is non-zero.
                let (stored, _) = unsafe { self.entry_at(index) };
                if self.hasher.eq_keys(stored, key) {
                    return Probe::Found(index);
                }
            } else if stored_code == EMPTY && vacant.is_none() {
                vacant = Some(index);
            }
        }

        match vacant {
            Some(index) => Probe::Vacant(index),
            None => Probe::Full,
        }
    }

    /// Finds the slot holding `key`, or an empty slot in its window, growing
    /// the table until one exists.
    fn locate(&mut self, code: HashCode, key: &K) -> Located {
        loop {
            match self.probe(code, key) {
                Probe::Found(index) => return Located::Occupied(index),
                Probe::Vacant(index) => return Located::Vacant(index),
                Probe::Full => self.grow(),
            }
        }
    }

    /// Inserts `value` under `key`.
    ///
    /// If the key is already present its value is overwritten in place (the
    /// stored key is kept) and the previous value is returned. Otherwise the
    /// entry is created in the first empty slot of the key's window, growing
    /// the table first if the window has none.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashTable;
    ///
    /// let mut table = HashTable::new();
    /// assert_eq!(table.insert(3u64, "goblin"), None);
    /// assert_eq!(table.insert(3u64, "orc"), Some("goblin"));
    /// assert_eq!(table.len(), 1);
    /// assert_eq!(table.find(&3), Some(&"orc"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let code = self.hasher.hash_key(&key);
        match self.locate(code, &key) {
            Located::Occupied(index) => {
                // SAFETY: `locate` only reports live slots as occupied.
                let (_, stored) = unsafe { self.entry_at_mut(index) };
                Some(core::mem::replace(stored, value))
            }
            Located::Vacant(index) => {
                // SAFETY: `locate` returned an empty slot in the window of
                // `code`.
                unsafe { self.occupy(index, code, key, value) };
                None
            }
        }
    }

    /// Inserts `value` under `key` unless the key is already present.
    ///
    /// Returns a reference to the value now stored under `key` and whether
    /// the key already existed. An existing value is never overwritten; the
    /// passed key and value are dropped in that case.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashTable;
    ///
    /// let mut visits = HashTable::new();
    /// let (count, existed) = visits.checked_insert((2i32, 5i32), 0u32);
    /// assert!(!existed);
    /// *count += 1;
    ///
    /// let (count, existed) = visits.checked_insert((2, 5), 0);
    /// assert!(existed);
    /// assert_eq!(*count, 1);
    /// ```
    pub fn checked_insert(&mut self, key: K, value: V) -> (&mut V, bool) {
        let code = self.hasher.hash_key(&key);
        match self.locate(code, &key) {
            Located::Occupied(index) => {
                // SAFETY: `locate` only reports live slots as occupied.
                let (_, stored) = unsafe { self.entry_at_mut(index) };
                (stored, true)
            }
            Located::Vacant(index) => {
                // SAFETY: `locate` returned an empty slot in the window of
                // `code`.
                (unsafe { self.occupy(index, code, key, value) }, false)
            }
        }
    }

    /// Returns the value stored under `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashTable;
    ///
    /// let mut table = HashTable::new();
    /// table.insert("key".to_string(), 42);
    /// assert_eq!(table.find(&"key".to_string()), Some(&42));
    /// assert_eq!(table.find(&"missing".to_string()), None);
    /// ```
    #[inline]
    pub fn find(&self, key: &K) -> Option<&V> {
        self.get_key_value(key).map(|(_, value)| value)
    }

    /// Returns a mutable reference to the value stored under `key`.
    #[inline]
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.populated == 0 {
            return None;
        }

        let index = self.find_index(self.hasher.hash_key(key), key)?;
        // SAFETY: `find_index` only returns live slots.
        let (_, value) = unsafe { self.entry_at_mut(index) };
        Some(value)
    }

    /// Returns the stored key and value for `key`.
    #[inline]
    pub fn get_key_value(&self, key: &K) -> Option<(&K, &V)> {
        if self.populated == 0 {
            return None;
        }

        let index = self.find_index(self.hasher.hash_key(key), key)?;
        // SAFETY: `find_index` only returns live slots.
        let (stored, value) = unsafe { self.entry_at(index) };
        Some((stored, value))
    }

    /// Returns `true` if `key` is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get_key_value(key).is_some()
    }

    /// Removes `key` and returns whether it was present.
    ///
    /// No other entry moves.
    pub fn erase(&mut self, key: &K) -> bool {
        self.remove_entry(key).is_some()
    }

    /// Removes `key` and returns its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key` and returns the stored key and value.
    pub fn remove_entry(&mut self, key: &K) -> Option<(K, V)> {
        if self.populated == 0 {
            return None;
        }

        let index = self.find_index(self.hasher.hash_key(key), key)?;
        // SAFETY: `find_index` only returns live slots.
        Some(unsafe { self.vacate(index) })
    }

    /// Gets the entry for `key` for in-place manipulation.
    ///
    /// A vacant entry already owns an empty slot in the key's window; the
    /// table grows here if it has to.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashTable;
    ///
    /// let mut counts: HashTable<&str, u32> = HashTable::new();
    /// for word in ["bat", "rat", "bat"] {
    ///     *counts.entry(word).or_insert(0) += 1;
    /// }
    /// assert_eq!(counts.find(&"bat"), Some(&2));
    /// assert_eq!(counts.find(&"rat"), Some(&1));
    /// ```
    pub fn entry(&mut self, key: K) -> Entry<'_, K, V, H> {
        let code = self.hasher.hash_key(&key);
        match self.locate(code, &key) {
            Located::Occupied(index) => Entry::Occupied(OccupiedEntry { table: self, index }),
            Located::Vacant(index) => Entry::Vacant(VacantEntry {
                table: self,
                index,
                code,
                key,
            }),
        }
    }
}

#[cfg(test)]
impl<K, V, H> HashTable<K, V, H>
where
    H: KeyHasher<K>,
{
    /// Checks every structural invariant of the table.
    fn assert_invariants(&self) {
        assert!(self.capacity().is_power_of_two());
        assert_eq!(
            self.max_probe_length(),
            self.capacity().trailing_zeros() as usize
        );
        assert_eq!(
            self.codes.len(),
            self.capacity() + self.max_probe_length()
        );
        assert_eq!(self.entries.len(), self.codes.len());

        let mut live = 0;
        for (index, &code) in self.codes.iter().enumerate() {
            if code == EMPTY {
                continue;
            }
            live += 1;

            // SAFETY: The code at `index` is non-zero.
            let (key, _) = unsafe { self.entry_at(index) };
            assert_eq!(self.hasher.hash_key(key).get(), code);
            assert!(self.capacity.window(code).contains(&index));
            assert_eq!(self.find_index(HashCode::new(code), key), Some(index));
        }
        assert_eq!(live, self.populated);
    }
}

impl<K, V, H> PartialEq for HashTable<K, V, H>
where
    V: PartialEq,
    H: KeyHasher<K>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.find(key) == Some(value))
    }
}

impl<K, V, H> Eq for HashTable<K, V, H>
where
    V: Eq,
    H: KeyHasher<K>,
{
}

impl<K, V, H> Extend<(K, V)> for HashTable<K, V, H>
where
    H: KeyHasher<K>,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, H> FromIterator<(K, V)> for HashTable<K, V, H>
where
    H: KeyHasher<K> + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut table = Self::with_hasher(H::default());
        table.extend(iter);
        table
    }
}

/// A view into a single entry of a [`HashTable`], which may be vacant or
/// occupied.
///
/// This enum is constructed from the [`entry`] method on [`HashTable`].
///
/// [`entry`]: HashTable::entry
pub enum Entry<'a, K, V, H> {
    /// The key is present in the table.
    Occupied(OccupiedEntry<'a, K, V, H>),
    /// The key is absent; a slot for it is already reserved.
    Vacant(VacantEntry<'a, K, V, H>),
}

impl<'a, K, V, H> Entry<'a, K, V, H> {
    /// Inserts `default` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_insert(self, default: V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default),
        }
    }

    /// Inserts the result of `default` if the entry is vacant and returns a
    /// mutable reference to the value. The closure is not called for an
    /// occupied entry.
    pub fn or_insert_with(self, default: impl FnOnce() -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(default()),
        }
    }

    /// Like [`or_insert_with`](Entry::or_insert_with), but the closure
    /// receives the key.
    pub fn or_insert_with_key(self, default: impl FnOnce(&K) -> V) -> &'a mut V {
        match self {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let value = default(entry.key());
                entry.insert(value)
            }
        }
    }

    /// Applies `f` to the value of an occupied entry.
    pub fn and_modify(self, f: impl FnOnce(&mut V)) -> Self {
        match self {
            Entry::Occupied(mut entry) => {
                f(entry.get_mut());
                Entry::Occupied(entry)
            }
            Entry::Vacant(entry) => Entry::Vacant(entry),
        }
    }

    /// Returns the key of this entry.
    pub fn key(&self) -> &K {
        match self {
            Entry::Occupied(entry) => entry.key(),
            Entry::Vacant(entry) => entry.key(),
        }
    }
}

impl<'a, K, V, H> Entry<'a, K, V, H>
where
    V: Default,
{
    /// Inserts `V::default()` if the entry is vacant and returns a mutable
    /// reference to the value.
    pub fn or_default(self) -> &'a mut V {
        self.or_insert_with(Default::default)
    }
}

/// A view into an occupied entry of a [`HashTable`].
pub struct OccupiedEntry<'a, K, V, H> {
    table: &'a mut HashTable<K, V, H>,
    index: usize,
}

impl<'a, K, V, H> OccupiedEntry<'a, K, V, H> {
    /// Returns the stored key.
    pub fn key(&self) -> &K {
        // SAFETY: An occupied entry always points at a live slot.
        unsafe { &self.table.entry_at(self.index).0 }
    }

    /// Returns the value.
    pub fn get(&self) -> &V {
        // SAFETY: An occupied entry always points at a live slot.
        unsafe { &self.table.entry_at(self.index).1 }
    }

    /// Returns the value mutably.
    pub fn get_mut(&mut self) -> &mut V {
        // SAFETY: An occupied entry always points at a live slot.
        unsafe { &mut self.table.entry_at_mut(self.index).1 }
    }

    /// Converts the entry into a mutable reference to the value with the
    /// lifetime of the table borrow.
    pub fn into_mut(self) -> &'a mut V {
        let OccupiedEntry { table, index } = self;
        // SAFETY: An occupied entry always points at a live slot.
        unsafe { &mut table.entry_at_mut(index).1 }
    }

    /// Replaces the value and returns the old one.
    pub fn insert(&mut self, value: V) -> V {
        core::mem::replace(self.get_mut(), value)
    }

    /// Removes the entry and returns its value.
    pub fn remove(self) -> V {
        self.remove_entry().1
    }

    /// Removes the entry and returns the stored key and value.
    pub fn remove_entry(self) -> (K, V) {
        // SAFETY: An occupied entry always points at a live slot.
        unsafe { self.table.vacate(self.index) }
    }
}

/// A view into a vacant entry of a [`HashTable`].
pub struct VacantEntry<'a, K, V, H> {
    table: &'a mut HashTable<K, V, H>,
    index: usize,
    code: HashCode,
    key: K,
}

impl<'a, K, V, H> VacantEntry<'a, K, V, H> {
    /// Returns the key that would be inserted.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Takes back ownership of the key. The reserved slot stays empty.
    pub fn into_key(self) -> K {
        self.key
    }

    /// Inserts `value` into the reserved slot and returns a mutable reference
    /// to it.
    pub fn insert(self, value: V) -> &'a mut V {
        let VacantEntry {
            table,
            index,
            code,
            key,
        } = self;
        // SAFETY: `index` was returned by `locate` as an empty slot in the
        // window of `code`, and the exclusive borrow kept it empty.
        unsafe { table.occupy(index, code, key, value) }
    }
}

type Slots<'a, K, V> = Zip<slice::Iter<'a, u32>, slice::Iter<'a, MaybeUninit<(K, V)>>>;
type SlotsMut<'a, K, V> = Zip<slice::Iter<'a, u32>, slice::IterMut<'a, MaybeUninit<(K, V)>>>;
type SlotsDrain<'a, K, V> = Zip<slice::IterMut<'a, u32>, slice::IterMut<'a, MaybeUninit<(K, V)>>>;

/// An iterator over the entries of a [`HashTable`] in slot order.
///
/// This struct is created by the [`iter`] method on [`HashTable`].
///
/// [`iter`]: HashTable::iter
pub struct Iter<'a, K, V> {
    slots: Slots<'a, K, V>,
    remaining: usize,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            slots: self.slots.clone(),
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        for (code, entry) in self.slots.by_ref() {
            if *code != EMPTY {
                self.remaining -= 1;
                // SAFETY: A non-zero code marks an initialized entry.
                let (key, value) = unsafe { entry.assume_init_ref() };
                return Some((key, value));
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        while let Some((code, entry)) = self.slots.next_back() {
            if *code != EMPTY {
                self.remaining -= 1;
                // SAFETY: A non-zero code marks an initialized entry.
                let (key, value) = unsafe { entry.assume_init_ref() };
                return Some((key, value));
            }
        }

        None
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// A mutable iterator over the entries of a [`HashTable`] in slot order.
///
/// This struct is created by the [`iter_mut`] method on [`HashTable`].
///
/// [`iter_mut`]: HashTable::iter_mut
pub struct IterMut<'a, K, V> {
    slots: SlotsMut<'a, K, V>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        for (code, entry) in self.slots.by_ref() {
            if *code != EMPTY {
                self.remaining -= 1;
                // SAFETY: A non-zero code marks an initialized entry.
                let (key, value) = unsafe { entry.assume_init_mut() };
                return Some((&*key, value));
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        while let Some((code, entry)) = self.slots.next_back() {
            if *code != EMPTY {
                self.remaining -= 1;
                // SAFETY: A non-zero code marks an initialized entry.
                let (key, value) = unsafe { entry.assume_init_mut() };
                return Some((&*key, value));
            }
        }

        None
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// An iterator over the keys of a [`HashTable`].
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

/// An iterator over the values of a [`HashTable`].
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

/// A mutable iterator over the values of a [`HashTable`].
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

/// A draining iterator over the entries of a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`].
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, K, V> {
    slots: SlotsDrain<'a, K, V>,
    populated: &'a mut usize,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if *self.populated == 0 {
            return None;
        }

        for (code, entry) in self.slots.by_ref() {
            if *code != EMPTY {
                *code = EMPTY;
                *self.populated -= 1;
                // SAFETY: The code was non-zero, and zeroing it means the
                // entry is read exactly once.
                return Some(unsafe { entry.assume_init_read() });
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (*self.populated, Some(*self.populated))
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}

impl<K, V> FusedIterator for Drain<'_, K, V> {}

impl<K, V> Drop for Drain<'_, K, V> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

/// An owning iterator over the entries of a [`HashTable`].
pub struct IntoIter<K, V, H> {
    table: HashTable<K, V, H>,
    index: usize,
}

impl<K, V, H> Iterator for IntoIter<K, V, H> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.table.populated == 0 {
            return None;
        }

        while self.index < self.table.codes.len() {
            let index = self.index;
            self.index += 1;
            if self.table.codes[index] != EMPTY {
                // SAFETY: The code at `index` is non-zero.
                return Some(unsafe { self.table.vacate(index) });
            }
        }

        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.table.populated, Some(self.table.populated))
    }
}

impl<K, V, H> ExactSizeIterator for IntoIter<K, V, H> {}

impl<K, V, H> FusedIterator for IntoIter<K, V, H> {}

/// An owning iterator over the keys of a [`HashTable`].
pub struct IntoKeys<K, V, H> {
    inner: IntoIter<K, V, H>,
}

impl<K, V, H> Iterator for IntoKeys<K, V, H> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An owning iterator over the values of a [`HashTable`].
pub struct IntoValues<K, V, H> {
    inner: IntoIter<K, V, H>,
}

impl<K, V, H> Iterator for IntoValues<K, V, H> {
    type Item = V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V, H> IntoIterator for HashTable<K, V, H> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, H>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            table: self,
            index: 0,
        }
    }
}

impl<'a, K, V, H> IntoIterator for &'a HashTable<K, V, H> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, H> IntoIterator for &'a mut HashTable<K, V, H> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use alloc::collections::BTreeMap;
    use alloc::rc::Rc;
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::cell::Cell;
    use core::hash::BuildHasher;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use rand::rngs::SmallRng;
    use siphasher::sip::SipHasher;

    use super::*;
    use crate::hash_code::BuildKeyHasher;

    #[derive(Clone)]
    struct SipHashBuilder {
        k0: u64,
        k1: u64,
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap_or(0),
                k1: rng.try_next_u64().unwrap_or(0),
            }
        }
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    type SipTable<K, V> = HashTable<K, V, BuildKeyHasher<SipHashBuilder>>;

    fn sip_table<K, V>(capacity: usize) -> SipTable<K, V> {
        HashTable::with_capacity_and_hasher(
            capacity,
            BuildKeyHasher::new(SipHashBuilder::default()),
        )
    }

    /// Gives every key the same code.
    #[derive(Clone, Copy, Default)]
    struct ConstantHasher;

    impl KeyHasher<u64> for ConstantHasher {
        fn hash_key(&self, _: &u64) -> HashCode {
            HashCode::new(0x1234)
        }

        fn eq_keys(&self, stored: &u64, probe: &u64) -> bool {
            stored == probe
        }
    }

    /// Keeps the low `shift` bits of every code at zero.
    #[derive(Clone, Copy)]
    struct LowBitsHasher {
        shift: u32,
    }

    impl KeyHasher<u64> for LowBitsHasher {
        fn hash_key(&self, key: &u64) -> HashCode {
            HashCode::new((*key as u32) << self.shift)
        }

        fn eq_keys(&self, stored: &u64, probe: &u64) -> bool {
            stored == probe
        }
    }

    struct DropCounter<'a>(&'a Cell<usize>);

    impl Drop for DropCounter<'_> {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn new_uses_default_capacity() {
        let table: HashTable<u64, u64> = HashTable::new();
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.max_probe_length(), 4);
        assert_eq!(table.codes.len(), 20);
        assert!(table.is_empty());
        table.assert_invariants();
    }

    #[test]
    fn with_capacity_rounds_up() {
        for (hint, size) in [(0, 1), (1, 1), (2, 2), (3, 4), (16, 16), (17, 32), (1000, 1024)] {
            let table: HashTable<u64, u64> = HashTable::with_capacity(hint);
            assert_eq!(table.capacity(), size, "hint {hint}");
            table.assert_invariants();
        }
    }

    #[test]
    fn tiny_table_grows_on_first_insert() {
        let mut table: HashTable<u64, u64> = HashTable::with_capacity(1);
        assert_eq!(table.max_probe_length(), 0);
        assert_eq!(table.find(&1), None);

        table.insert(1, 10);
        assert!(table.capacity() >= 2);
        assert_eq!(table.find(&1), Some(&10));
        table.assert_invariants();
    }

    #[test]
    fn insert_and_find() {
        let mut table = sip_table(0);
        for k in 0..32u64 {
            assert_eq!(table.insert(k, (k as i32) * 2), None);
            assert_eq!(table.find(&k), Some(&((k as i32) * 2)), "{:#?}", table);
        }
        assert_eq!(table.len(), 32);
        for k in 0..32u64 {
            assert_eq!(table.find(&k), Some(&((k as i32) * 2)));
        }

        assert!(table.find(&999).is_none());
        table.assert_invariants();
    }

    #[test]
    fn coordinate_scenario() {
        let mut table: HashTable<(i32, i32), &str> = HashTable::new();
        table.insert((0, 0), "A");
        table.insert((1, 0), "B");
        table.insert((0, 1), "C");

        assert_eq!(table.find(&(1, 0)), Some(&"B"));
        assert!(table.erase(&(0, 0)));
        assert_eq!(table.find(&(0, 0)), None);
        assert_eq!(table.len(), 2);
        table.assert_invariants();
    }

    #[test]
    fn duplicate_insert_overwrites() {
        let mut table: HashTable<u64, i32> = HashTable::new();
        assert_eq!(table.insert(42, 7), None);
        assert_eq!(table.insert(42, 11), Some(7));
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&42), Some(&11));
        table.assert_invariants();
    }

    #[test]
    fn overwrite_keeps_stored_key() {
        let mut table: SipTable<Rc<str>, u32> = sip_table(0);
        let first: Rc<str> = Rc::from("ember");
        let second: Rc<str> = Rc::from("ember");
        table.insert(first.clone(), 1);
        table.insert(second.clone(), 2);

        let (stored, value) = table.get_key_value(&first).unwrap();
        assert!(Rc::ptr_eq(stored, &first));
        assert_eq!(*value, 2);
        assert_eq!(Rc::strong_count(&second), 1);
    }

    #[test]
    fn checked_insert_keeps_existing() {
        let mut table: HashTable<u64, String> = HashTable::new();
        let (value, existed) = table.checked_insert(5, "first".to_string());
        assert!(!existed);
        assert_eq!(value, "first");

        let (value, existed) = table.checked_insert(5, "second".to_string());
        assert!(existed);
        assert_eq!(value, "first");
        value.push('!');

        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&5).map(String::as_str), Some("first!"));
    }

    #[test]
    fn checked_insert_grows_when_window_is_full() {
        let mut table: HashTable<u64, u64, _> =
            HashTable::with_capacity_and_hasher(16, ConstantHasher);
        for k in 0..4 {
            assert!(!table.checked_insert(k, k).1);
        }
        assert_eq!(table.capacity(), 16);

        let (value, existed) = table.checked_insert(4, 40);
        assert!(!existed);
        assert_eq!(*value, 40);
        assert_eq!(table.capacity(), 32);
        table.assert_invariants();
    }

    #[test]
    fn find_mut_and_modify() {
        let mut table = sip_table(0);
        for k in 0..5u64 {
            table.insert(k, 1);
        }

        for k in 0..5u64 {
            if let Some(v) = table.find_mut(&k) {
                *v += 9;
            }
        }
        for k in 0..5u64 {
            assert_eq!(table.find(&k), Some(&10));
        }
        assert_eq!(table.find_mut(&77), None);
    }

    #[test]
    fn remove_items() {
        let mut table = sip_table(0);
        for k in 0..8u64 {
            table.insert(k, k as i32);
        }
        assert_eq!(table.len(), 8);

        for k in [0u64, 3, 7] {
            assert_eq!(table.remove_entry(&k), Some((k, k as i32)));
        }
        assert_eq!(table.len(), 5);
        assert_eq!(table.remove(&1000), None);
        assert_eq!(table.remove(&4), Some(4));
        assert_eq!(table.len(), 4);
        table.assert_invariants();
    }

    #[test]
    fn erase_reports_presence() {
        let mut table: HashTable<u64, u64> = HashTable::new();
        assert!(!table.erase(&1));

        table.insert(1, 1);
        table.insert(2, 2);
        assert!(table.erase(&1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&1), None);
        assert!(!table.erase(&1));
        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&2), Some(&2));
    }

    #[test]
    fn erase_leaves_colliding_keys_reachable() {
        let mut table: HashTable<u64, u64, _> =
            HashTable::with_capacity_and_hasher(16, ConstantHasher);
        for k in 0..4 {
            table.insert(k, k * 100);
        }
        let positions: Vec<usize> = (0..4)
            .map(|k| table.find_index(HashCode::new(0x1234), &k).unwrap())
            .collect();

        assert!(table.erase(&1));
        for k in [0, 2, 3] {
            assert_eq!(table.find(&k), Some(&(k * 100)));
        }
        // No entry moved.
        assert_eq!(
            table.find_index(HashCode::new(0x1234), &3),
            Some(positions[3])
        );

        // The hole is reused.
        table.insert(9, 900);
        assert_eq!(
            table.find_index(HashCode::new(0x1234), &9),
            Some(positions[1])
        );
        assert_eq!(table.capacity(), 16);
        table.assert_invariants();
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn insert_many() {
        let mut table = sip_table(0);
        for k in 0..100000u64 {
            table.insert(k, k as i32);
            assert_eq!(table.find(&k), Some(&(k as i32)));
        }

        assert_eq!(table.len(), 100000);
        assert!(table.capacity().is_power_of_two());
        for k in 0..100000u64 {
            assert_eq!(table.find(&k), Some(&(k as i32)));
        }
        table.assert_invariants();
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn insert_many_default_hasher() {
        let mut table: HashTable<u64, u64> = HashTable::new();
        for k in 0..50000u64 {
            table.insert(k, !k);
        }
        assert_eq!(table.len(), 50000);
        for k in 0..50000u64 {
            assert_eq!(table.find(&k), Some(&!k));
        }
        table.assert_invariants();
    }

    #[test]
    fn growth_keeps_every_value() {
        let mut table: HashTable<u32, u32> = HashTable::with_capacity(4);
        let mut capacities = vec![table.capacity()];
        for k in 0..1000u32 {
            table.insert(k, k.wrapping_mul(31));
            if *capacities.last().unwrap() != table.capacity() {
                capacities.push(table.capacity());
                for j in 0..=k {
                    assert_eq!(table.find(&j), Some(&j.wrapping_mul(31)));
                }
                table.assert_invariants();
            }
        }
        assert!(capacities.len() > 1);
        assert!(capacities.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn explicit_collision() {
        let mut table: HashTable<u64, u64, _> =
            HashTable::with_capacity_and_hasher(16, ConstantHasher);
        for k in 0..16u64 {
            table.insert(k, k + 1);
        }

        assert_eq!(table.len(), 16);
        // Identical codes need a window as long as the cluster.
        assert_eq!(table.max_probe_length(), 16);
        assert_eq!(table.capacity(), 1 << 16);
        for k in 0..16u64 {
            assert_eq!(table.find(&k), Some(&(k + 1)));
        }
        table.assert_invariants();
    }

    #[test]
    fn low_bit_collision_stress() {
        let mut table: HashTable<u64, u64, _> =
            HashTable::with_capacity_and_hasher(16, LowBitsHasher { shift: 8 });
        for round in 0..3u64 {
            for k in 0..300u64 {
                table.insert(k, k * 7 + round);
            }
            assert_eq!(table.len(), 300);
            for k in 0..300u64 {
                assert_eq!(table.find(&k), Some(&(k * 7 + round)));
            }
            table.assert_invariants();

            let mut slots: Vec<usize> = (0..300u64)
                .map(|k| table.find_index(table.hasher.hash_key(&k), &k).unwrap())
                .collect();
            slots.sort_unstable();
            slots.dedup();
            assert_eq!(slots.len(), 300);
        }

        for k in (0..300u64).step_by(2) {
            assert!(table.erase(&k));
        }
        assert_eq!(table.len(), 150);
        for k in 0..300u64 {
            assert_eq!(table.contains_key(&k), k % 2 == 1);
        }
        table.assert_invariants();
    }

    #[test]
    fn randomized_against_model() {
        let mut rng = SmallRng::seed_from_u64(0x7ab1e);
        let mut table: HashTable<u32, u64> = HashTable::with_capacity(2);
        let mut model = BTreeMap::new();

        for step in 0..20000u64 {
            let key = rng.random_range(0..2048u32);
            match rng.random_range(0..4u8) {
                0 | 1 => assert_eq!(table.insert(key, step), model.insert(key, step)),
                2 => assert_eq!(table.erase(&key), model.remove(&key).is_some()),
                _ => assert_eq!(table.find(&key), model.get(&key)),
            }
            assert_eq!(table.len(), model.len());
        }

        table.assert_invariants();
        for (key, value) in &model {
            assert_eq!(table.find(key), Some(value));
        }
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut table: HashTable<u64, String> = HashTable::new();
        for k in 0..100u64 {
            table.insert(k, k.to_string());
        }
        let capacity = table.capacity();

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), capacity);
        assert_eq!(table.iter().count(), 0);
        assert!(table.codes.iter().all(|&code| code == EMPTY));

        table.insert(5, "five".to_string());
        assert_eq!(table.find(&5).map(String::as_str), Some("five"));
        table.assert_invariants();
    }

    #[test]
    fn entries_are_dropped_exactly_once() {
        let drops = Cell::new(0);
        let mut table = HashTable::with_capacity(2);
        for k in 0..100u64 {
            table.insert(k, DropCounter(&drops));
        }
        assert_eq!(drops.get(), 0, "growth must move, not drop");

        for k in 0..10u64 {
            table.insert(k, DropCounter(&drops));
        }
        assert_eq!(drops.get(), 10);

        for k in 10..15u64 {
            assert!(table.erase(&k));
        }
        assert_eq!(drops.get(), 15);

        let _ = table.checked_insert(20, DropCounter(&drops));
        assert_eq!(drops.get(), 16);

        table.retain(|k, _| *k < 50);
        assert_eq!(drops.get(), 16 + 50);
        assert_eq!(table.len(), 45);

        table.clear();
        assert_eq!(drops.get(), 16 + 50 + 45);

        for k in 0..3u64 {
            table.insert(k, DropCounter(&drops));
        }
        drop(table);
        assert_eq!(drops.get(), 16 + 50 + 45 + 3);
    }

    #[test]
    fn iter_and_drain() {
        let mut table = sip_table(0);
        for k in 10..20u64 {
            table.insert(k, (k as i32) + 1);
        }
        let collected: Vec<u64> = table.keys().copied().collect();
        assert_eq!(collected.len(), 10);
        for k in 10..20u64 {
            assert!(collected.contains(&k));
        }
        assert_eq!(table.iter().len(), 10);

        let drained: Vec<(u64, i32)> = table.drain().collect();
        assert_eq!(drained.len(), 10);
        assert_eq!(table.len(), 0);

        for k in 10..20u64 {
            assert!(table.find(&k).is_none());
        }
        table.assert_invariants();
    }

    #[test]
    fn dropped_drain_empties_table() {
        let drops = Cell::new(0);
        let mut table = HashTable::new();
        for k in 0..10u64 {
            table.insert(k, DropCounter(&drops));
        }

        let mut drain = table.drain();
        assert_eq!(drain.len(), 10);
        drop(drain.next());
        drop(drain);

        assert_eq!(drops.get(), 10);
        assert!(table.is_empty());
        table.assert_invariants();
    }

    #[test]
    fn iteration_follows_slot_order() {
        let mut table: HashTable<u64, u64> = HashTable::new();
        for k in 0..200u64 {
            table.insert(k, k);
        }

        let slots: Vec<usize> = table
            .keys()
            .map(|k| table.find_index(table.hasher.hash_key(k), k).unwrap())
            .collect();
        assert!(slots.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn reverse_iteration_mirrors_forward() {
        let mut table: HashTable<u64, u64> = HashTable::new();
        for k in 0..64u64 {
            table.insert(k, k);
        }

        let forward: Vec<u64> = table.keys().copied().collect();
        let mut backward: Vec<u64> = table.iter().rev().map(|(k, _)| *k).collect();
        backward.reverse();
        assert_eq!(forward, backward);

        let mut iter = table.iter();
        let mut seen = 0;
        loop {
            let front = iter.next();
            let back = iter.next_back();
            seen += front.is_some() as usize + back.is_some() as usize;
            if back.is_none() {
                break;
            }
        }
        assert_eq!(seen, 64);
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next_back(), None);

        let empty: HashTable<u64, u64> = HashTable::new();
        assert_eq!(empty.iter().next_back(), None);
    }

    #[test]
    fn iter_mut_updates_values() {
        let mut table: HashTable<u64, u64> = (0..20u64).map(|k| (k, k)).collect();
        for (k, v) in table.iter_mut() {
            *v += *k;
        }
        for v in table.values_mut() {
            *v += 1;
        }
        for (k, v) in &table {
            assert_eq!(*v, 2 * k + 1);
        }
        assert_eq!(table.values().sum::<u64>(), (0..20u64).map(|k| 2 * k + 1).sum());
    }

    #[test]
    fn into_iter_yields_everything() {
        let table: HashTable<u64, String> = (0..50u64).map(|k| (k, k.to_string())).collect();
        let mut items: Vec<(u64, String)> = table.into_iter().collect();
        items.sort();
        assert_eq!(items.len(), 50);
        assert!(items.iter().all(|(k, v)| k.to_string() == *v));

        let table: HashTable<u64, u64> = (0..5u64).map(|k| (k, k * 2)).collect();
        let mut keys: Vec<u64> = table.clone().into_keys().collect();
        keys.sort();
        assert_eq!(keys, [0, 1, 2, 3, 4]);
        let mut values: Vec<u64> = table.into_values().collect();
        values.sort();
        assert_eq!(values, [0, 2, 4, 6, 8]);
    }

    #[test]
    fn partially_consumed_into_iter_drops_rest() {
        let drops = Cell::new(0);
        let mut table = HashTable::new();
        for k in 0..8u64 {
            table.insert(k, DropCounter(&drops));
        }

        let mut iter = table.into_iter();
        assert_eq!(iter.len(), 8);
        drop(iter.next());
        drop(iter);
        assert_eq!(drops.get(), 8);
    }

    #[test]
    fn insert_and_find_string_keys() {
        let mut table: HashTable<String, i32> = HashTable::with_capacity(0);
        let keys = ["hello", "world", "foo", "bar", "baz"];
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(table.insert(k.to_string(), i as i32), None);
        }

        assert_eq!(table.len(), keys.len());
        for (i, k) in keys.iter().enumerate() {
            assert_eq!(table.find(&k.to_string()), Some(&(i as i32)));
        }
        assert!(table.find(&"not found".to_string()).is_none());

        assert!(table.erase(&"foo".to_string()));
        assert!(!table.contains_key(&"foo".to_string()));
        assert!(table.contains_key(&"bar".to_string()));
        table.assert_invariants();
    }

    #[test]
    fn borrowed_str_keys() {
        let mut table: HashTable<&str, usize> = HashTable::new();
        for word in "the quick brown fox jumps over the lazy dog".split(' ') {
            *table.entry(word).or_default() += 1;
        }
        assert_eq!(table.find(&"the"), Some(&2));
        assert_eq!(table.find(&"fox"), Some(&1));
        assert_eq!(table.len(), 8);
    }

    #[test]
    fn entry_or_insert_with() {
        let mut table: HashTable<String, i32> = HashTable::new();
        let key = "unique_key".to_string();

        let value = table.entry(key.clone()).or_insert_with(|| 42);
        assert_eq!(*value, 42);

        let existing = table
            .entry(key.clone())
            .or_insert_with(|| panic!("should not be called"));
        assert_eq!(*existing, 42);

        let by_key = table
            .entry("other".to_string())
            .or_insert_with_key(|k| k.len() as i32);
        assert_eq!(*by_key, 5);

        assert_eq!(table.len(), 2);
    }

    #[test]
    fn entry_and_modify() {
        let mut table: HashTable<u64, u64> = HashTable::new();
        table.entry(1).and_modify(|v| *v += 1).or_insert(10);
        table.entry(1).and_modify(|v| *v += 1).or_insert(10);
        assert_eq!(table.find(&1), Some(&11));
    }

    #[test]
    fn occupied_entry_operations() {
        let mut table: HashTable<String, u64> = HashTable::new();
        table.insert("key".to_string(), 1);

        match table.entry("key".to_string()) {
            Entry::Occupied(mut entry) => {
                assert_eq!(entry.key(), "key");
                assert_eq!(*entry.get(), 1);
                assert_eq!(entry.insert(2), 1);
                *entry.get_mut() += 1;
                assert_eq!(*entry.get(), 3);
            }
            Entry::Vacant(_) => unreachable!("entry should be occupied"),
        }

        let value_ref = match table.entry("key".to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(_) => unreachable!(),
        };
        *value_ref = 7;
        assert_eq!(table.find(&"key".to_string()), Some(&7));

        let removed = match table.entry("key".to_string()) {
            Entry::Occupied(entry) => entry.remove_entry(),
            Entry::Vacant(_) => unreachable!(),
        };
        assert_eq!(removed, ("key".to_string(), 7));
        assert!(table.is_empty());
        table.assert_invariants();
    }

    #[test]
    fn vacant_entry_operations() {
        let mut table: HashTable<String, u64> = HashTable::new();

        match table.entry("fresh".to_string()) {
            Entry::Vacant(entry) => {
                assert_eq!(entry.key(), "fresh");
                assert_eq!(entry.into_key(), "fresh");
            }
            Entry::Occupied(_) => unreachable!(),
        }
        assert!(table.is_empty());

        match table.entry("fresh".to_string()) {
            Entry::Vacant(entry) => {
                *entry.insert(5) += 1;
            }
            Entry::Occupied(_) => unreachable!(),
        }
        assert_eq!(table.find(&"fresh".to_string()), Some(&6));
        table.assert_invariants();
    }

    #[test]
    fn entry_grows_when_window_is_full() {
        let mut table: HashTable<u64, u64, _> =
            HashTable::with_capacity_and_hasher(16, ConstantHasher);
        for k in 0..4 {
            table.insert(k, k);
        }

        match table.entry(4) {
            Entry::Vacant(entry) => {
                entry.insert(4);
            }
            Entry::Occupied(_) => unreachable!(),
        }
        assert_eq!(table.capacity(), 32);
        assert_eq!(table.len(), 5);
        table.assert_invariants();
    }

    #[test]
    fn retain_removes_rejected() {
        let mut table: HashTable<u64, u64> = (0..100u64).map(|k| (k, k)).collect();
        table.retain(|k, v| {
            *v += 1;
            k % 3 == 0
        });
        assert_eq!(table.len(), 34);
        for k in 0..100u64 {
            if k % 3 == 0 {
                assert_eq!(table.find(&k), Some(&(k + 1)));
            } else {
                assert_eq!(table.find(&k), None);
            }
        }
        table.assert_invariants();
    }

    #[test]
    fn test_clone() {
        let mut original: HashTable<String, i32> = HashTable::with_capacity(10);
        let test_data = [
            ("hello", 1),
            ("world", 2),
            ("rust", 3),
            ("clone", 4),
            ("test", 5),
        ];
        for (key, value) in test_data.iter() {
            original.insert(key.to_string(), *value);
        }

        let cloned = original.clone();
        assert_eq!(original.len(), cloned.len());
        assert_eq!(original.capacity(), cloned.capacity());
        assert_eq!(original, cloned);
        cloned.assert_invariants();

        *original.find_mut(&"hello".to_string()).unwrap() = 999;
        assert_eq!(original.find(&"hello".to_string()), Some(&999));
        assert_eq!(cloned.find(&"hello".to_string()), Some(&1));
        assert_ne!(original, cloned);
    }

    #[test]
    fn test_clone_empty_table() {
        let original: HashTable<u64, u64> = HashTable::with_capacity(10);
        let cloned = original.clone();

        assert!(original.is_empty());
        assert!(cloned.is_empty());
        assert_eq!(cloned.capacity(), 16);
    }

    #[test]
    fn test_clone_with_collisions() {
        let mut table: HashTable<u64, u64, _> =
            HashTable::with_capacity_and_hasher(16, ConstantHasher);
        for k in 0..10u64 {
            table.insert(k, k);
        }
        for k in (0..10u64).step_by(3) {
            table.erase(&k);
        }

        let cloned = table.clone();
        assert_eq!(cloned.capacity(), table.capacity());
        assert_eq!(cloned.len(), table.len());
        for k in 0..10u64 {
            assert_eq!(cloned.find(&k), table.find(&k));
        }
        cloned.assert_invariants();
    }

    #[test]
    fn moved_table_keeps_entries() {
        let mut table: HashTable<u64, String> = HashTable::new();
        table.insert(1, "one".to_string());

        let moved = core::mem::take(&mut table);
        assert_eq!(moved.find(&1).map(String::as_str), Some("one"));
        assert!(table.is_empty());
        table.assert_invariants();
    }

    #[test]
    fn reserve_grows_to_power_of_two() {
        let mut table: HashTable<u64, u64> = HashTable::new();
        for k in 0..10u64 {
            table.insert(k, k);
        }

        table.reserve(100);
        assert_eq!(table.capacity(), 128);
        for k in 0..10u64 {
            assert_eq!(table.find(&k), Some(&k));
        }

        table.reserve(5);
        assert_eq!(table.capacity(), 128);
        table.assert_invariants();
    }

    #[test]
    fn try_reserve_reports_overflow() {
        let mut table: HashTable<u64, u64> = HashTable::new();
        table.insert(1, 1);
        assert_eq!(
            table.try_reserve(usize::MAX),
            Err(TryReserveError::CapacityOverflow)
        );
        assert_eq!(
            table.try_reserve(usize::MAX / 2),
            Err(TryReserveError::CapacityOverflow)
        );
        assert_eq!(table.find(&1), Some(&1));
        assert_eq!(table.capacity(), 16);
    }

    #[test]
    #[should_panic(expected = "capacity overflow")]
    fn with_capacity_overflow_panics() {
        let _table: HashTable<u64, u64> = HashTable::with_capacity(usize::MAX);
    }

    #[test]
    fn probe_histogram_counts_displacements() {
        let mut table: HashTable<u64, u64, _> =
            HashTable::with_capacity_and_hasher(16, ConstantHasher);
        for k in 0..4 {
            table.insert(k, k);
        }

        let histogram = table.probe_histogram();
        assert_eq!(histogram.bins(), &[1, 1, 1, 1]);
        assert_eq!(histogram.max_displacement(), Some(3));

        let stats = table.debug_stats();
        assert_eq!(stats.populated, 4);
        assert_eq!(stats.table_size, 16);
        assert_eq!(stats.total_slots, 20);
    }

    #[test]
    fn overflow_region_is_used() {
        // Home slot 15 is the last in-range slot, so three of the four keys
        // spill past `capacity()`.
        #[derive(Clone, Copy)]
        struct LastSlotHasher;

        impl KeyHasher<u64> for LastSlotHasher {
            fn hash_key(&self, _: &u64) -> HashCode {
                HashCode::new(0xFFFF)
            }

            fn eq_keys(&self, stored: &u64, probe: &u64) -> bool {
                stored == probe
            }
        }

        let mut table = HashTable::with_capacity_and_hasher(16, LastSlotHasher);
        for k in 0..4u64 {
            table.insert(k, k);
        }
        assert_eq!(table.capacity(), 16);
        assert_eq!(table.debug_stats().overflow_occupied, 3);
        for k in 0..4u64 {
            assert_eq!(table.find(&k), Some(&k));
        }
        table.assert_invariants();
    }

    #[test]
    fn debug_lists_entries() {
        let mut table: HashTable<u64, &str> = HashTable::new();
        table.insert(1, "a");
        assert_eq!(alloc::format!("{:?}", table), r#"{1: "a"}"#);
    }

    #[test]
    fn equality_ignores_capacity() {
        let small: HashTable<u64, u64> = (0..10u64).map(|k| (k, k)).collect();
        let mut large: HashTable<u64, u64> = HashTable::with_capacity(1024);
        large.extend((0..10u64).rev().map(|k| (k, k)));
        assert_eq!(small, large);

        large.insert(3, 4);
        assert_ne!(small, large);
    }
}
