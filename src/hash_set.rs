use core::fmt::Debug;
use core::iter::Chain;
use core::iter::FusedIterator;

use crate::error::TryReserveError;
use crate::hash_code::DefaultKeyHasher;
use crate::hash_code::KeyHasher;
use crate::hash_table;
use crate::hash_table::HashTable;

/// A hash set stored in a [`HashTable`] with unit values.
///
/// `HashSet<T, H>` inherits the table's bounded probe windows: membership
/// tests read at most `log2(capacity())` slots. The hasher `H` is any
/// [`KeyHasher`] for `T`; [`DefaultKeyHasher`] covers the
/// [`TableKey`](crate::TableKey) types.
///
/// # Examples
///
/// ```rust
/// use probe_table::HashSet;
///
/// let mut visited: HashSet<(i32, i32)> = HashSet::new();
/// assert!(visited.insert((4, 2)));
/// assert!(!visited.insert((4, 2)));
/// assert!(visited.contains(&(4, 2)));
/// assert!(!visited.contains(&(2, 4)));
/// ```
#[derive(Clone)]
pub struct HashSet<T, H = DefaultKeyHasher> {
    table: HashTable<T, (), H>,
}

impl<T, H> PartialEq for HashSet<T, H>
where
    H: KeyHasher<T>,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|v| other.contains(v))
    }
}

impl<T, H> Eq for HashSet<T, H> where H: KeyHasher<T> {}

impl<T, H> Debug for HashSet<T, H>
where
    T: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T> HashSet<T, DefaultKeyHasher> {
    /// Creates an empty set with the default capacity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashSet;
    ///
    /// let set: HashSet<i32> = HashSet::new();
    /// assert!(set.is_empty());
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(DefaultKeyHasher)
    }

    /// Creates an empty set with at least `capacity` slots.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashSet;
    ///
    /// let set: HashSet<i32> = HashSet::with_capacity(100);
    /// assert_eq!(set.capacity(), 128);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultKeyHasher)
    }
}

impl<T, H> HashSet<T, H> {
    /// Creates an empty set with the given hasher.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(feature = "foldhash")]
    /// # {
    /// use probe_table::FoldKeyHasher;
    /// use probe_table::HashSet;
    ///
    /// let mut set = HashSet::with_hasher(FoldKeyHasher::default());
    /// set.insert("cave");
    /// assert!(set.contains(&"cave"));
    /// # }
    /// ```
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            table: HashTable::with_hasher(hasher),
        }
    }

    /// Creates an empty set with at least `capacity` slots and the given
    /// hasher.
    pub fn with_capacity_and_hasher(capacity: usize, hasher: H) -> Self {
        Self {
            table: HashTable::with_capacity_and_hasher(capacity, hasher),
        }
    }

    /// Returns the number of elements in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no elements.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the table size of the underlying [`HashTable`].
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Returns a reference to the set's hasher.
    pub fn hasher(&self) -> &H {
        self.table.hasher()
    }

    /// Removes every element, keeping the capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Grows the set so that at least `additional` more elements fit in
    /// `capacity()`.
    pub fn reserve(&mut self, additional: usize) {
        self.table.reserve(additional);
    }

    /// Fallible version of [`reserve`](HashSet::reserve).
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        self.table.try_reserve(additional)
    }

    /// Returns an iterator over the elements in slot order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.table.iter(),
        }
    }

    /// Removes and yields every element, keeping the capacity.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashSet;
    ///
    /// let mut set: HashSet<u8> = [1, 2, 3].into_iter().collect();
    /// assert_eq!(set.drain().count(), 3);
    /// assert!(set.is_empty());
    /// ```
    pub fn drain(&mut self) -> Drain<'_, T> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Keeps only the elements for which `f` returns `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashSet;
    ///
    /// let mut set: HashSet<i32> = (1..=4).collect();
    /// set.retain(|&x| x % 2 == 0);
    /// assert_eq!(set.len(), 2);
    /// assert!(set.contains(&2));
    /// assert!(set.contains(&4));
    /// ```
    pub fn retain(&mut self, mut f: impl FnMut(&T) -> bool) {
        self.table.retain(|value, _| f(value));
    }
}

impl<T, H> HashSet<T, H>
where
    H: KeyHasher<T>,
{
    /// Adds `value` to the set. Returns `true` if it was not present.
    ///
    /// An element already present is kept and `value` is dropped.
    pub fn insert(&mut self, value: T) -> bool {
        !self.table.checked_insert(value, ()).1
    }

    /// Returns `true` if the set contains `value`.
    pub fn contains(&self, value: &T) -> bool {
        self.table.contains_key(value)
    }

    /// Returns the stored element equal to `value`.
    pub fn get(&self, value: &T) -> Option<&T> {
        self.table.get_key_value(value).map(|(stored, _)| stored)
    }

    /// Removes `value`. Returns `true` if it was present.
    pub fn remove(&mut self, value: &T) -> bool {
        self.table.erase(value)
    }

    /// Removes and returns the stored element equal to `value`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashSet;
    ///
    /// let mut set: HashSet<String> = HashSet::new();
    /// set.insert("torch".to_string());
    /// assert_eq!(set.take(&"torch".to_string()), Some("torch".to_string()));
    /// assert!(set.is_empty());
    /// ```
    pub fn take(&mut self, value: &T) -> Option<T> {
        self.table.remove_entry(value).map(|(stored, _)| stored)
    }

    /// Returns `true` if `self` and `other` share no element.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small.iter().all(|v| !large.contains(v))
    }

    /// Returns `true` if every element of `self` is in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|v| other.contains(v))
    }

    /// Returns `true` if every element of `other` is in `self`.
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns an iterator over the elements in `self` or `other`, without
    /// duplicates.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use probe_table::HashSet;
    ///
    /// let a: HashSet<i32> = [1, 2, 3].into_iter().collect();
    /// let b: HashSet<i32> = [3, 4].into_iter().collect();
    ///
    /// let mut union: Vec<_> = a.union(&b).copied().collect();
    /// union.sort();
    /// assert_eq!(union, [1, 2, 3, 4]);
    /// ```
    pub fn union<'a>(&'a self, other: &'a Self) -> Union<'a, T, H> {
        Union {
            iter: self.iter().chain(other.difference(self)),
        }
    }

    /// Returns an iterator over the elements in both `self` and `other`.
    pub fn intersection<'a>(&'a self, other: &'a Self) -> Intersection<'a, T, H> {
        Intersection {
            iter: self.iter(),
            other,
        }
    }

    /// Returns an iterator over the elements in `self` but not in `other`.
    pub fn difference<'a>(&'a self, other: &'a Self) -> Difference<'a, T, H> {
        Difference {
            iter: self.iter(),
            other,
        }
    }

    /// Returns an iterator over the elements in exactly one of `self` and
    /// `other`.
    pub fn symmetric_difference<'a>(
        &'a self,
        other: &'a Self,
    ) -> SymmetricDifference<'a, T, H> {
        SymmetricDifference {
            iter: self.difference(other).chain(other.difference(self)),
        }
    }
}

impl<T, H> Default for HashSet<T, H>
where
    H: Default,
{
    fn default() -> Self {
        Self::with_hasher(H::default())
    }
}

/// An iterator over the elements of a [`HashSet`].
pub struct Iter<'a, T> {
    inner: hash_table::Iter<'a, T, ()>,
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Iter {
            inner: self.inner.clone(),
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(value, _)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(value, _)| value)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}

/// A draining iterator over the elements of a [`HashSet`].
pub struct Drain<'a, T> {
    inner: hash_table::Drain<'a, T, ()>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(value, _)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Drain<'_, T> {}

/// A consuming iterator over the elements of a [`HashSet`].
pub struct IntoIter<T, H> {
    inner: hash_table::IntoKeys<T, (), H>,
}

impl<T, H> Iterator for IntoIter<T, H> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, H> IntoIterator for HashSet<T, H> {
    type IntoIter = IntoIter<T, H>;
    type Item = T;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_keys(),
        }
    }
}

impl<'a, T, H> IntoIterator for &'a HashSet<T, H> {
    type IntoIter = Iter<'a, T>;
    type Item = &'a T;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, H> FromIterator<T> for HashSet<T, H>
where
    H: KeyHasher<T> + Default,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = HashSet::default();
        set.extend(iter);
        set
    }
}

impl<T, H> Extend<T> for HashSet<T, H>
where
    H: KeyHasher<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

/// An iterator over the union of two sets.
pub struct Union<'a, T, H> {
    iter: Chain<Iter<'a, T>, Difference<'a, T, H>>,
}

impl<'a, T, H> Iterator for Union<'a, T, H>
where
    H: KeyHasher<T>,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}

/// An iterator over the intersection of two sets.
pub struct Intersection<'a, T, H> {
    iter: Iter<'a, T>,
    other: &'a HashSet<T, H>,
}

impl<'a, T, H> Iterator for Intersection<'a, T, H>
where
    H: KeyHasher<T>,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let v = self.iter.next()?;
            if self.other.contains(v) {
                return Some(v);
            }
        }
    }
}

/// An iterator over the difference of two sets.
pub struct Difference<'a, T, H> {
    iter: Iter<'a, T>,
    other: &'a HashSet<T, H>,
}

impl<'a, T, H> Iterator for Difference<'a, T, H>
where
    H: KeyHasher<T>,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let v = self.iter.next()?;
            if !self.other.contains(v) {
                return Some(v);
            }
        }
    }
}

/// An iterator over the symmetric difference of two sets.
pub struct SymmetricDifference<'a, T, H> {
    iter: Chain<Difference<'a, T, H>, Difference<'a, T, H>>,
}

impl<'a, T, H> Iterator for SymmetricDifference<'a, T, H>
where
    H: KeyHasher<T>,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next()
    }
}
