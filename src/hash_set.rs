use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::ops::BitAndAssign;
use core::ops::BitOrAssign;
use core::ops::SubAssign;

use crate::DefaultHashBuilder;
use crate::hash_table::HashTable;

/// A hash set stored as a [`HashTable`] whose values are `()`.
///
/// `HashSet<K, S>` inherits the table's chaining, capacity policy and
/// iteration order. Besides the usual membership operations it provides the
/// in-place set algebra of a key registry: [`union_with`], [`intersect_with`]
/// and [`difference_with`], also available as `|=`, `&=` and `-=`.
///
/// [`union_with`]: HashSet::union_with
/// [`intersect_with`]: HashSet::intersect_with
/// [`difference_with`]: HashSet::difference_with
///
/// # Examples
///
/// ```rust
/// # #[cfg(any(feature = "std", feature = "foldhash"))]
/// # {
/// use chain_hash::HashSet;
///
/// let mut walls: HashSet<&str> = ["top", "bottom", "left"].into_iter().collect();
/// let moving: HashSet<&str> = ["top", "lid"].into_iter().collect();
///
/// walls -= &moving;
/// assert_eq!(walls.sorted_toc(), ["bottom", "left"]);
///
/// walls |= &moving;
/// assert_eq!(walls.len(), 4);
/// # }
/// ```
pub struct HashSet<K, S = DefaultHashBuilder> {
    table: HashTable<K, (), S>,
}

impl<K, S> Clone for HashSet<K, S>
where
    K: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<K, S> PartialEq for HashSet<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter().all(|k| other.contains(k))
    }
}

impl<K, S> Eq for HashSet<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
}

impl<K, S> Debug for HashSet<K, S>
where
    K: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, S> HashSet<K, S> {
    /// Creates a new hash set with the given hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self {
            table: HashTable::with_hasher(hash_builder),
        }
    }

    /// Creates a new hash set with at least `capacity` buckets and the given
    /// hasher builder.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(feature = "std")]
    /// # {
    /// use std::collections::hash_map::RandomState;
    ///
    /// use chain_hash::hash_set::HashSet;
    ///
    /// let set: HashSet<i32, _> = HashSet::with_capacity_and_hasher(100, RandomState::new());
    /// assert_eq!(set.capacity(), 128);
    /// # }
    /// ```
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self {
            table: HashTable::with_capacity_and_hasher(capacity, hash_builder),
        }
    }

    /// Returns the number of keys in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns `true` if the set contains no keys.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of buckets.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Removes all keys, keeping the bucket array.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Removes all keys and releases the bucket array.
    pub fn clear_storage(&mut self) {
        self.table.clear_storage();
    }

    /// Resizes the bucket array. See [`HashTable::resize`].
    pub fn resize(&mut self, new_size: usize) {
        self.table.resize(new_size);
    }

    /// Shrinks the bucket array to roughly twice the number of keys.
    pub fn shrink(&mut self) {
        self.table.shrink();
    }

    /// Returns an iterator over the keys in bucket order.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            inner: self.table.keys(),
        }
    }

    /// Removes every key, yielding them as owned values.
    pub fn drain(&mut self) -> Drain<'_, K> {
        Drain {
            inner: self.table.drain(),
        }
    }

    /// Returns every key, in iteration order.
    pub fn toc(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.table.toc()
    }

    /// Returns every key, sorted.
    pub fn sorted_toc(&self) -> Vec<K>
    where
        K: Clone + Ord,
    {
        self.table.sorted_toc()
    }

    /// Keeps only the keys for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.table.retain(|key, _| keep(key));
    }
}

impl<K, S> HashSet<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Adds a key to the set.
    ///
    /// Returns `false` if the key was already present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashSet;
    ///
    /// let mut set: HashSet<i32> = HashSet::new();
    /// assert!(set.insert(1));
    /// assert!(!set.insert(1));
    /// # }
    /// ```
    pub fn insert(&mut self, key: K) -> bool {
        self.table.insert(key, ())
    }

    /// Adds a key to the set. Always returns `true`.
    ///
    /// Keys carry no value, so this only differs from [`insert`] in its
    /// return value.
    ///
    /// [`insert`]: HashSet::insert
    pub fn set(&mut self, key: K) -> bool {
        self.table.set(key, ())
    }

    /// Returns `true` if the set contains `key`.
    pub fn found<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.found(key)
    }

    /// Returns `true` if the set contains `key`.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.found(key)
    }

    /// Removes `key`. Returns `false` if it was absent.
    pub fn erase<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.erase(key)
    }

    /// Removes `key` and returns the stored key.
    pub fn take<Q>(&mut self, key: &Q) -> Option<K>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.table.remove_entry(key).map(|(key, ())| key)
    }

    /// Removes every listed key, returning how many were present.
    pub fn erase_keys<'q, Q, I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'q Q>,
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized + 'q,
    {
        self.table.erase_keys(keys)
    }

    /// Adds every key of `other`.
    pub fn union_with<S2>(&mut self, other: &HashSet<K, S2>)
    where
        K: Clone,
    {
        for key in other.iter() {
            self.insert(key.clone());
        }
    }

    /// Keeps only the keys also present in `other`.
    pub fn intersect_with<S2>(&mut self, other: &HashSet<K, S2>)
    where
        S2: BuildHasher,
    {
        self.table.retain(|key, _| other.contains(key));
    }

    /// Removes every key present in `other`.
    pub fn difference_with<S2>(&mut self, other: &HashSet<K, S2>)
    where
        S2: BuildHasher,
    {
        self.table.erase_table_keys(&other.table);
    }

    /// Returns `true` if every key of this set is in `other`.
    pub fn is_subset<S2>(&self, other: &HashSet<K, S2>) -> bool
    where
        S2: BuildHasher,
    {
        self.len() <= other.len() && self.iter().all(|key| other.contains(key))
    }
}

impl<K, S> HashSet<K, S>
where
    S: BuildHasher + Default,
{
    /// Creates a new hash set with the default number of buckets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashSet;
    ///
    /// let set: HashSet<i32> = HashSet::new();
    /// assert!(set.is_empty());
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a new hash set with at least `capacity` buckets.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, S> HashSet<K, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Default,
{
    /// Collects the keys of a table into a set.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashSet;
    /// use chain_hash::HashTable;
    ///
    /// let table: HashTable<&str, f64> = [("p", 1.0), ("U", 0.5)].into_iter().collect();
    /// let names: HashSet<&str> = HashSet::from_table_keys(&table);
    /// assert!(names.contains("U"));
    /// # }
    /// ```
    pub fn from_table_keys<V, S2>(table: &HashTable<K, V, S2>) -> Self {
        let mut set = Self::with_capacity(table.len().saturating_mul(2).min(crate::MAX_TABLE_SIZE));
        for key in table.keys() {
            set.insert(key.clone());
        }
        set
    }
}

impl<K, S> Default for HashSet<K, S>
where
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, S, S2> BitOrAssign<&HashSet<K, S2>> for HashSet<K, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    fn bitor_assign(&mut self, other: &HashSet<K, S2>) {
        self.union_with(other);
    }
}

impl<K, S, S2> BitAndAssign<&HashSet<K, S2>> for HashSet<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
    S2: BuildHasher,
{
    fn bitand_assign(&mut self, other: &HashSet<K, S2>) {
        self.intersect_with(other);
    }
}

impl<K, S, S2> SubAssign<&HashSet<K, S2>> for HashSet<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
    S2: BuildHasher,
{
    fn sub_assign(&mut self, other: &HashSet<K, S2>) {
        self.difference_with(other);
    }
}

/// An iterator over the keys of a `HashSet`.
pub struct Iter<'a, K> {
    inner: crate::hash_table::Keys<'a, K, ()>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> ExactSizeIterator for Iter<'_, K> {}

/// A draining iterator over the keys of a `HashSet`.
pub struct Drain<'a, K> {
    inner: crate::hash_table::Drain<'a, K, ()>,
}

impl<K> Iterator for Drain<'_, K> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, ())| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// A consuming iterator over the keys of a `HashSet`.
pub struct IntoIter<K> {
    inner: crate::hash_table::IntoIter<K, ()>,
}

impl<K> Iterator for IntoIter<K> {
    type Item = K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, ())| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> ExactSizeIterator for IntoIter<K> {}

impl<K> FusedIterator for IntoIter<K> {}

impl<K, S> IntoIterator for HashSet<K, S> {
    type IntoIter = IntoIter<K>;
    type Item = K;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.table.into_iter(),
        }
    }
}

impl<'a, K, S> IntoIterator for &'a HashSet<K, S> {
    type IntoIter = Iter<'a, K>;
    type Item = &'a K;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, S> FromIterator<K> for HashSet<K, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        let mut set = HashSet::with_capacity(lower.saturating_mul(2).min(crate::MAX_TABLE_SIZE));
        set.extend(iter);
        set
    }
}

impl<K, S> Extend<K> for HashSet<K, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use alloc::vec::Vec;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipHashBuilder {
        k1: u64,
        k2: u64,
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> Self::Hasher {
            SipHasher::new_with_keys(self.k1, self.k2)
        }
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            Self {
                k1: OsRng.try_next_u64().unwrap_or(0),
                k2: OsRng.try_next_u64().unwrap_or(0),
            }
        }
    }

    type Set<K> = HashSet<K, SipHashBuilder>;

    fn set_of(keys: &[i32]) -> Set<i32> {
        keys.iter().copied().collect()
    }

    #[test]
    fn test_insert_and_contains() {
        let mut set: Set<String> = HashSet::new();
        assert!(set.insert("a".to_string()));
        assert!(!set.insert("a".to_string()));
        assert!(set.set("a".to_string()));
        assert!(set.set("b".to_string()));

        assert_eq!(set.len(), 2);
        assert!(set.contains("a"));
        assert!(set.found("b"));
        assert!(!set.contains("c"));
    }

    #[test]
    fn test_erase_and_take() {
        let mut set = set_of(&[1, 2, 3, 4]);
        assert!(set.erase(&1));
        assert!(!set.erase(&1));
        assert_eq!(set.take(&2), Some(2));
        assert_eq!(set.take(&2), None);
        assert_eq!(set.erase_keys([&3, &5]), 1);
        assert_eq!(set.toc(), vec![4]);
    }

    #[test]
    fn test_union_with() {
        let mut a = set_of(&[1, 2, 3]);
        let b: HashSet<i32, hashbrown::DefaultHashBuilder> = [3, 4, 5].into_iter().collect();

        a.union_with(&b);
        assert_eq!(a.sorted_toc(), vec![1, 2, 3, 4, 5]);

        let mut c = set_of(&[9]);
        c |= &a;
        assert_eq!(c.len(), 6);
    }

    #[test]
    fn test_intersect_with() {
        let mut a = set_of(&[1, 2, 3, 4]);
        let b = set_of(&[2, 4, 6]);

        a.intersect_with(&b);
        assert_eq!(a.sorted_toc(), vec![2, 4]);

        a &= &set_of(&[4]);
        assert_eq!(a.sorted_toc(), vec![4]);

        a &= &set_of(&[]);
        assert!(a.is_empty());
    }

    #[test]
    fn test_difference_with() {
        let mut a = set_of(&[1, 2, 3, 4]);
        a.difference_with(&set_of(&[2, 3, 10]));
        assert_eq!(a.sorted_toc(), vec![1, 4]);

        a -= &set_of(&[1]);
        assert_eq!(a.sorted_toc(), vec![4]);

        let large: Set<i32> = (0..100).collect();
        a -= &large;
        assert!(a.is_empty());
    }

    #[test]
    fn test_algebra_matches_std() {
        let left: Vec<i32> = (0..200).filter(|n| n % 3 == 0).collect();
        let right: Vec<i32> = (0..200).filter(|n| n % 5 == 0).collect();

        let std_left: hashbrown::HashSet<i32> = left.iter().copied().collect();
        let std_right: hashbrown::HashSet<i32> = right.iter().copied().collect();

        let expected = |keys: hashbrown::HashSet<i32>| {
            let mut keys: Vec<i32> = keys.into_iter().collect();
            keys.sort_unstable();
            keys
        };

        let mut union = set_of(&left);
        union |= &set_of(&right);
        assert_eq!(
            union.sorted_toc(),
            expected(std_left.union(&std_right).copied().collect())
        );

        let mut intersection = set_of(&left);
        intersection &= &set_of(&right);
        assert_eq!(
            intersection.sorted_toc(),
            expected(std_left.intersection(&std_right).copied().collect())
        );

        let mut difference = set_of(&left);
        difference -= &set_of(&right);
        assert_eq!(
            difference.sorted_toc(),
            expected(std_left.difference(&std_right).copied().collect())
        );
    }

    #[test]
    fn test_subset_and_equality() {
        let small = set_of(&[1, 2]);
        let big = set_of(&[3, 2, 1]);
        assert!(small.is_subset(&big));
        assert!(!big.is_subset(&small));

        let mut other: Set<i32> = HashSet::with_capacity(1024);
        other.insert(2);
        other.insert(1);
        assert_eq!(small, other);
        assert_ne!(small, big);
    }

    #[test]
    fn test_from_table_keys() {
        let table: HashTable<String, f64, SipHashBuilder> = [("p", 1.0), ("U", 2.0)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();

        let keys: Set<String> = HashSet::from_table_keys(&table);
        assert_eq!(keys.sorted_toc(), vec!["U".to_string(), "p".to_string()]);
    }

    #[test]
    fn test_from_empty_table_keys() {
        let table: HashTable<i32, f64, SipHashBuilder> = HashTable::with_capacity(4);
        let keys: Set<i32> = HashSet::from_table_keys(&table);
        assert!(keys.is_empty());
        assert_eq!(keys.capacity(), crate::DEFAULT_TABLE_SIZE);

        let table: HashTable<i32, f64, SipHashBuilder> = (0..100).map(|k| (k, 0.0)).collect();
        let keys: Set<i32> = HashSet::from_table_keys(&table);
        assert_eq!(keys.len(), 100);
        assert_eq!(keys.capacity(), 256);
    }

    #[test]
    fn test_iter_drain_into_iter() {
        let mut set = set_of(&[5, 6, 7]);
        assert_eq!(set.iter().len(), 3);
        assert_eq!((&set).into_iter().copied().sum::<i32>(), 18);

        let mut drained: Vec<i32> = set.drain().collect();
        drained.sort_unstable();
        assert_eq!(drained, vec![5, 6, 7]);
        assert!(set.is_empty());

        set.extend([1, 2]);
        let mut owned: Vec<i32> = set.into_iter().collect();
        owned.sort_unstable();
        assert_eq!(owned, vec![1, 2]);
    }

    #[test]
    fn test_retain_and_storage() {
        let mut set: Set<i32> = (0..50).collect();
        set.retain(|k| k % 2 == 0);
        assert_eq!(set.len(), 25);

        set.shrink();
        assert_eq!(set.capacity(), 64);

        set.resize(8);
        assert_eq!(set.len(), 25);
        assert!((0..50).step_by(2).all(|k| set.contains(&k)));

        set.clear();
        assert_eq!(set.capacity(), 8);
        set.clear_storage();
        assert_eq!(set.capacity(), 0);
        assert!(set.insert(1));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = set_of(&[1, 2, 3]);
        let mut copy = original.clone();
        copy.erase(&1);
        assert!(original.contains(&1));
        assert_eq!(copy.len(), 2);
    }

    #[test]
    fn test_debug() {
        let set = set_of(&[42]);
        assert_eq!(alloc::format!("{:?}", set), "{42}");
    }
}
