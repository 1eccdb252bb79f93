//! The chained hash table, its capacity policy and its iterators.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::borrow::Borrow;
use core::fmt::Debug;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ops::Index;

use crate::DefaultHashBuilder;
use crate::cursor::Cursor;
use crate::cursor::CursorMut;
use crate::cursor::End;

/// Capacity used by [`HashTable::new`] and by construction requests of zero.
pub const DEFAULT_TABLE_SIZE: usize = 128;

/// Smallest allocated capacity.
///
/// A table without backing storage grows to this size on its first insertion,
/// and [`HashTable::shrink`] never goes below it.
pub const MIN_TABLE_SIZE: usize = 2;

/// Largest capacity a table may be resized to.
pub const MAX_TABLE_SIZE: usize = 1 << (usize::BITS - 3);

/// Returns the power-of-two capacity a requested size is rounded up to.
///
/// A request of zero yields zero, the storage-free state.
///
/// # Panics
///
/// Panics if `requested` exceeds [`MAX_TABLE_SIZE`].
///
/// # Examples
///
/// ```rust
/// use chain_hash::hash_table::canonical_size;
///
/// assert_eq!(canonical_size(0), 0);
/// assert_eq!(canonical_size(1), 1);
/// assert_eq!(canonical_size(100), 128);
/// assert_eq!(canonical_size(128), 128);
/// ```
#[inline]
pub fn canonical_size(requested: usize) -> usize {
    if requested == 0 {
        return 0;
    }

    assert!(
        requested <= MAX_TABLE_SIZE,
        "requested table size {requested} exceeds the maximum table size {MAX_TABLE_SIZE}"
    );

    requested.next_power_of_two()
}

/// Grow once the table is more than 80% full.
#[inline(always)]
fn exceeds_load_factor(len: usize, capacity: usize) -> bool {
    (len as u128) * 5 > (capacity as u128) * 4
}

pub(crate) type Link<K, V> = Option<Box<Node<K, V>>>;

/// A single chained entry. Each node owns its successor in the chain.
pub(crate) struct Node<K, V> {
    pub(crate) hash: u64,
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) next: Link<K, V>,
}

fn empty_buckets<K, V>(capacity: usize) -> Vec<Link<K, V>> {
    let mut buckets = Vec::with_capacity(capacity);
    buckets.resize_with(capacity, || None);
    buckets
}

/// Walks `depth` links down a chain, returning the link slot found there.
fn link_at_mut<K, V>(mut link: &mut Link<K, V>, depth: usize) -> Option<&mut Link<K, V>> {
    for _ in 0..depth {
        link = &mut link.as_mut()?.next;
    }
    Some(link)
}

/// Drops a chain one node at a time so long chains cannot overflow the stack.
fn drop_chain<K, V>(mut link: Link<K, V>) {
    while let Some(mut node) = link {
        link = node.next.take();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InsertPolicy {
    /// Leave an existing value untouched.
    Protect,
    /// Replace an existing value in place.
    Overwrite,
}

/// Chain and bucket statistics for a [`HashTable`].
///
/// Available in tests and with the `stats` feature.
#[cfg(any(test, feature = "stats"))]
#[derive(Debug, Clone, PartialEq)]
pub struct TableStats {
    /// Number of entries in the table
    pub len: usize,
    /// Number of buckets
    pub capacity: usize,
    /// Number of buckets holding at least one entry
    pub used_buckets: usize,
    /// Length of the longest collision chain
    pub max_chain: usize,
    /// Load factor (len / capacity)
    pub load_factor: f64,
    /// `histogram[n]` is the number of buckets whose chain holds `n` entries
    pub histogram: Vec<usize>,
}

#[cfg(any(test, feature = "stats"))]
impl TableStats {
    /// Mean chain length over the buckets that hold at least one entry.
    pub fn mean_chain(&self) -> f64 {
        if self.used_buckets == 0 {
            0.0
        } else {
            self.len as f64 / self.used_buckets as f64
        }
    }

    /// Pretty-print the statistics.
    #[cfg(feature = "std")]
    pub fn print(&self) {
        println!("{self}");
    }
}

#[cfg(any(test, feature = "stats"))]
impl core::fmt::Display for TableStats {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "=== Hash Table Statistics ===")?;
        writeln!(
            f,
            "Entries: {} in {} buckets ({:.2}% load factor)",
            self.len,
            self.capacity,
            self.load_factor * 100.0
        )?;
        writeln!(
            f,
            "Buckets used: {} (mean chain {:.2}, longest chain {})",
            self.used_buckets,
            self.mean_chain(),
            self.max_chain
        )?;
        for (length, count) in self.histogram.iter().enumerate() {
            writeln!(f, "{length:>3} | {count}")?;
        }
        Ok(())
    }
}

/// A hash table resolving collisions by separate chaining.
///
/// `HashTable<K, V, S>` maps keys of type `K` to values of type `V`, hashing
/// keys with the builder `S`. Storage is an array of bucket heads whose length
/// is always a power of two (or zero, for a table without backing storage).
/// Entries hashing to the same bucket form a singly-linked chain with the most
/// recently inserted entry at its head.
///
/// ## Iteration order
///
/// Iteration visits buckets in index order and each chain from its head.
/// Resizing, cloning and transferring all rebuild chains, so the order is an
/// implementation artifact. Use [`sorted_toc`](HashTable::sorted_toc) or
/// [`sorted`](HashTable::sorted) when a stable order matters.
///
/// ## Performance Characteristics
///
/// - **Lookup**: O(chain length) at the key's bucket; O(1) on average, since
///   the table doubles once it is more than 80% full.
/// - **Memory**: one pointer per bucket, plus a heap node per entry holding the
///   key, the value, a u64 hash and a pointer to the next node.
///
/// ## Example
///
/// ```rust
/// # #[cfg(any(feature = "std", feature = "foldhash"))]
/// # {
/// use chain_hash::HashTable;
///
/// let mut table: HashTable<String, i32> = HashTable::with_capacity(1);
/// assert!(table.insert("a".to_string(), 1));
/// assert!(table.insert("b".to_string(), 2));
/// assert!(!table.insert("a".to_string(), 10));
/// assert!(table.set("c".to_string(), 3));
///
/// assert_eq!(table.len(), 3);
/// assert_eq!(table["a"], 1);
/// assert_eq!(table.sorted_toc(), ["a", "b", "c"]);
/// # }
/// ```
pub struct HashTable<K, V, S = DefaultHashBuilder> {
    buckets: Vec<Link<K, V>>,
    len: usize,
    hash_builder: S,
}

impl<K, V, S> Debug for HashTable<K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Clone for HashTable<K, V, S>
where
    K: Clone,
    V: Clone,
    S: Clone,
{
    /// Deep-copies every entry into a fresh bucket array of the same capacity.
    ///
    /// Chains are rebuilt from their heads, so the copy generally iterates in a
    /// different order than the original.
    fn clone(&self) -> Self {
        let mut buckets = empty_buckets(self.capacity());

        for (index, head) in self.buckets.iter().enumerate() {
            let mut node = head.as_deref();
            while let Some(current) = node {
                let slot = &mut buckets[index];
                let next = slot.take();
                *slot = Some(Box::new(Node {
                    hash: current.hash,
                    key: current.key.clone(),
                    value: current.value.clone(),
                    next,
                }));
                node = current.next.as_deref();
            }
        }

        Self {
            buckets,
            len: self.len,
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<K, V, S> Drop for HashTable<K, V, S> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V, S> HashTable<K, V, S> {
    /// Creates a new table with [`DEFAULT_TABLE_SIZE`] buckets and the given
    /// hasher builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates a new table with at least `capacity` buckets and the given
    /// hasher builder.
    ///
    /// The bucket count is rounded up to a power of two. A request of zero
    /// yields [`DEFAULT_TABLE_SIZE`] buckets.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds [`MAX_TABLE_SIZE`].
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_TABLE_SIZE
        } else {
            canonical_size(capacity)
        };

        Self {
            buckets: empty_buckets(capacity),
            len: 0,
            hash_builder,
        }
    }

    /// Returns the number of buckets.
    ///
    /// Zero after [`clear_storage`](HashTable::clear_storage).
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the number of entries in the table.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table contains no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns a reference to the table's hasher builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Returns the end position shared by every cursor of every table.
    ///
    /// Equivalent to [`End`]; provided so loops can read
    /// `while cursor != table.end()`.
    pub fn end(&self) -> End {
        End
    }

    /// Returns a read-only cursor at the first entry, or at the end if the
    /// table is empty.
    pub fn begin(&self) -> Cursor<'_, K, V, S> {
        Cursor::begin(self)
    }

    /// Returns an erase-safe cursor at the first entry, or at the end if the
    /// table is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::End;
    /// use chain_hash::HashTable;
    ///
    /// let mut table: HashTable<u32, u32> = (0..10).map(|n| (n, n * n)).collect();
    ///
    /// let mut cursor = table.begin_mut();
    /// while cursor != End {
    ///     if cursor.key().is_some_and(|k| k % 2 == 0) {
    ///         cursor.erase();
    ///     } else {
    ///         cursor.move_next();
    ///     }
    /// }
    ///
    /// assert_eq!(table.sorted_toc(), [1, 3, 5, 7, 9]);
    /// # }
    /// ```
    pub fn begin_mut(&mut self) -> CursorMut<'_, K, V, S> {
        CursorMut::begin(self)
    }

    /// Returns an iterator over the entries in bucket order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            node: None,
            remaining: self.len,
        }
    }

    /// Returns an iterator over the entries with mutable access to the values.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            buckets: self.buckets.iter_mut(),
            node: None,
            remaining: self.len,
        }
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Returns an iterator over mutable references to the values.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Removes every entry, yielding them as owned pairs.
    ///
    /// The bucket array is kept at its current capacity.
    pub fn drain(&mut self) -> Drain<'_, K, V> {
        let capacity = self.capacity();
        let buckets = core::mem::replace(&mut self.buckets, empty_buckets(capacity));
        let remaining = core::mem::replace(&mut self.len, 0);

        Drain {
            inner: IntoIter {
                buckets: buckets.into_iter(),
                chain: None,
                remaining,
            },
            _marker: PhantomData,
        }
    }

    /// Returns the table of contents: every key, in iteration order.
    pub fn toc(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.keys().cloned().collect()
    }

    /// Returns the table of contents sorted by key.
    ///
    /// Unlike [`toc`](HashTable::toc), the result does not depend on capacity,
    /// insertion order or resize history.
    pub fn sorted_toc(&self) -> Vec<K>
    where
        K: Clone + Ord,
    {
        let mut toc = self.toc();
        toc.sort_unstable();
        toc
    }

    /// Returns every entry ordered by key.
    pub fn sorted(&self) -> Vec<(&K, &V)>
    where
        K: Ord,
    {
        let mut entries: Vec<_> = self.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Keeps only the entries for which `keep` returns `true`.
    ///
    /// Entries are visited once each, in iteration order. Kept entries keep
    /// their chain order.
    pub fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        let mut removed = 0;
        for head in self.buckets.iter_mut() {
            let mut rest = head.take();
            let mut tail = head;
            while let Some(mut node) = rest {
                rest = node.next.take();
                if keep(&node.key, &mut node.value) {
                    tail = &mut tail.insert(node).next;
                } else {
                    removed += 1;
                }
            }
        }
        self.len -= removed;
    }

    /// Removes all entries, keeping the bucket array.
    pub fn clear(&mut self) {
        for head in self.buckets.iter_mut() {
            drop_chain(head.take());
        }
        self.len = 0;
    }

    /// Removes all entries and releases the bucket array.
    ///
    /// Equivalent to [`clear`](HashTable::clear) followed by `resize(0)`. The
    /// table stays usable and sizes itself again on the next insertion.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashTable;
    ///
    /// let mut table: HashTable<i32, i32> = HashTable::new();
    /// table.insert(1, 1);
    /// table.clear_storage();
    /// assert_eq!(table.capacity(), 0);
    ///
    /// table.insert(2, 2);
    /// assert!(table.capacity() > 0);
    /// # }
    /// ```
    pub fn clear_storage(&mut self) {
        self.clear();
        self.resize(0);
    }

    /// Resizes the bucket array to the canonical size of `new_size`.
    ///
    /// Every entry is moved (not copied) into the new array by its cached
    /// hash; the old array is released only after the move completes. A
    /// non-empty table is never resized below [`MIN_TABLE_SIZE`], so the
    /// key-value mapping is always preserved. Resizing changes iteration
    /// order.
    ///
    /// # Panics
    ///
    /// Panics if `new_size` exceeds [`MAX_TABLE_SIZE`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashTable;
    ///
    /// let mut table: HashTable<i32, i32> = (0..100).map(|n| (n, n)).collect();
    /// let before = table.clone();
    ///
    /// table.resize(4);
    /// assert_eq!(table.capacity(), 4);
    /// assert_eq!(table, before);
    /// # }
    /// ```
    pub fn resize(&mut self, new_size: usize) {
        let mut new_capacity = canonical_size(new_size);
        if self.len > 0 {
            new_capacity = new_capacity.max(MIN_TABLE_SIZE);
        }

        let old_capacity = self.capacity();
        if new_capacity == old_capacity {
            return;
        }

        log::debug!(
            "resizing hash table from {} to {} buckets ({} entries)",
            old_capacity,
            new_capacity,
            self.len
        );

        let mut buckets = empty_buckets(new_capacity);
        let mask = new_capacity.wrapping_sub(1);
        for head in self.buckets.iter_mut() {
            let mut link = head.take();
            while let Some(mut node) = link {
                link = node.next.take();
                let slot = &mut buckets[node.hash as usize & mask];
                node.next = slot.take();
                *slot = Some(node);
            }
        }

        self.buckets = buckets;
    }

    /// Shrinks the bucket array to roughly twice the number of entries.
    ///
    /// The new capacity is the canonical size of `2 * len`, never below
    /// [`MIN_TABLE_SIZE`]. Does nothing if that would not reduce the capacity.
    pub fn shrink(&mut self) {
        let target = canonical_size(self.len.saturating_mul(2).min(MAX_TABLE_SIZE))
            .max(MIN_TABLE_SIZE);

        if target < self.capacity() {
            log::debug!(
                "shrinking hash table from {} to {} buckets",
                self.capacity(),
                target
            );
            self.resize(target);
        }
    }

    /// Moves the contents of `other` into this table and leaves `other`
    /// empty, without backing storage.
    ///
    /// The hasher builders are exchanged along with the entries, since cached
    /// hashes are only meaningful to the builder that produced them.
    pub fn transfer(&mut self, other: &mut Self) {
        log::debug!(
            "transferring {} entries ({} buckets) between hash tables",
            other.len,
            other.capacity()
        );

        self.clear();
        self.buckets = core::mem::take(&mut other.buckets);
        self.len = core::mem::replace(&mut other.len, 0);
        core::mem::swap(&mut self.hash_builder, &mut other.hash_builder);
    }

    /// Returns chain and bucket statistics.
    #[cfg(any(test, feature = "stats"))]
    pub fn stats(&self) -> TableStats {
        let mut histogram = alloc::vec![0usize; 1];
        let mut used_buckets = 0;
        let mut max_chain = 0;

        for head in self.buckets.iter() {
            let mut length = 0;
            let mut node = head.as_deref();
            while let Some(current) = node {
                length += 1;
                node = current.next.as_deref();
            }

            if length > 0 {
                used_buckets += 1;
            }
            max_chain = max_chain.max(length);
            if histogram.len() <= length {
                histogram.resize(length + 1, 0);
            }
            histogram[length] += 1;
        }

        TableStats {
            len: self.len,
            capacity: self.capacity(),
            used_buckets,
            max_chain,
            load_factor: if self.buckets.is_empty() {
                0.0
            } else {
                self.len as f64 / self.capacity() as f64
            },
            histogram,
        }
    }

    #[inline]
    fn bucket_index(&self, hash: u64) -> usize {
        assert!(
            !self.buckets.is_empty(),
            "hash index requested from a table without backing storage"
        );
        hash as usize & (self.buckets.len() - 1)
    }

    pub(crate) fn heads(&self) -> &[Link<K, V>] {
        &self.buckets
    }

    /// The bucket heads and the entry count, borrowed apart so a cursor can
    /// hold a link slot and still keep the count current.
    pub(crate) fn heads_mut(&mut self) -> (&mut [Link<K, V>], &mut usize) {
        (self.buckets.as_mut_slice(), &mut self.len)
    }

    fn node_at_mut(&mut self, bucket: usize, depth: usize) -> Option<&mut Node<K, V>> {
        link_at_mut(self.buckets.get_mut(bucket)?, depth)?.as_deref_mut()
    }

    /// Detaches the node at `depth` in `bucket`, splicing its successor into
    /// its place.
    fn unlink(&mut self, bucket: usize, depth: usize) -> Option<Box<Node<K, V>>> {
        let slot = link_at_mut(self.buckets.get_mut(bucket)?, depth)?;
        let mut node = slot.take()?;
        *slot = node.next.take();
        self.len -= 1;
        Some(node)
    }

    /// Links a new node at the head of its chain, growing the table first if
    /// the insertion would push it past the load factor. Returns the bucket
    /// the node landed in; the node is at depth 0.
    fn link_new(&mut self, hash: u64, key: K, value: V) -> usize {
        let capacity = self.capacity();
        if capacity == 0 {
            self.resize(MIN_TABLE_SIZE);
        } else if capacity < MAX_TABLE_SIZE && exceeds_load_factor(self.len + 1, capacity) {
            log::trace!(
                "hash table load factor exceeded at {} entries, doubling {} buckets",
                self.len + 1,
                capacity
            );
            self.resize(capacity * 2);
        }

        let bucket = self.bucket_index(hash);
        let slot = &mut self.buckets[bucket];
        let next = slot.take();
        *slot = Some(Box::new(Node {
            hash,
            key,
            value,
            next,
        }));
        self.len += 1;

        bucket
    }
}

impl<K, V, S> HashTable<K, V, S>
where
    S: BuildHasher + Default,
{
    /// Creates a new table with [`DEFAULT_TABLE_SIZE`] buckets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashTable;
    /// use chain_hash::hash_table::DEFAULT_TABLE_SIZE;
    ///
    /// let table: HashTable<String, i32> = HashTable::new();
    /// assert!(table.is_empty());
    /// assert_eq!(table.capacity(), DEFAULT_TABLE_SIZE);
    /// # }
    /// ```
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates a new table with at least `capacity` buckets.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S> HashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    /// Builds a table from parallel lists of keys and values.
    ///
    /// Pairs are inserted in list order with [`insert`](HashTable::insert)
    /// semantics, so the first occurrence of a repeated key wins.
    ///
    /// # Panics
    ///
    /// Panics if the lists differ in length.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashTable;
    ///
    /// let table: HashTable<&str, i32> = HashTable::from_lists(vec!["x", "y"], vec![10, 20]);
    /// assert_eq!(table["x"], 10);
    /// assert_eq!(table["y"], 20);
    /// # }
    /// ```
    pub fn from_lists(keys: Vec<K>, values: Vec<V>) -> Self {
        assert!(
            keys.len() == values.len(),
            "size of key list ({}) and element list ({}) differ",
            keys.len(),
            values.len()
        );

        let mut table = Self::with_capacity(keys.len().saturating_mul(2).min(MAX_TABLE_SIZE));
        for (key, value) in keys.into_iter().zip(values) {
            table.insert(key, value);
        }
        table
    }
}

impl<K, V, S> HashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn make_hash<Q>(&self, key: &Q) -> u64
    where
        Q: Hash + ?Sized,
    {
        self.hash_builder.hash_one(key)
    }

    /// Bucket index of `key` within the current capacity.
    ///
    /// # Panics
    ///
    /// Panics if the table has no backing storage.
    #[inline]
    pub fn hash_key_index<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.bucket_index(self.make_hash(key))
    }

    /// Locates `key` as a (bucket, depth) pair.
    fn locate<Q>(&self, hash: u64, key: &Q) -> Option<(usize, usize)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.len == 0 {
            return None;
        }

        let bucket = self.bucket_index(hash);
        let mut node = self.buckets[bucket].as_deref();
        let mut depth = 0;
        while let Some(current) = node {
            if current.hash == hash && current.key.borrow() == key {
                return Some((bucket, depth));
            }
            node = current.next.as_deref();
            depth += 1;
        }

        None
    }

    fn find_node<Q>(&self, key: &Q) -> Option<(usize, &Node<K, V>)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.len == 0 {
            return None;
        }

        let hash = self.make_hash(key);
        let bucket = self.bucket_index(hash);
        let mut node = self.buckets[bucket].as_deref();
        while let Some(current) = node {
            if current.hash == hash && current.key.borrow() == key {
                return Some((bucket, current));
            }
            node = current.next.as_deref();
        }

        None
    }

    fn find_node_mut<Q>(&mut self, hash: u64, key: &Q) -> Option<&mut Node<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if self.len == 0 {
            return None;
        }

        let bucket = self.bucket_index(hash);
        let mut node = self.buckets[bucket].as_deref_mut();
        while let Some(current) = node {
            if current.hash == hash && current.key.borrow() == key {
                return Some(current);
            }
            node = current.next.as_deref_mut();
        }

        None
    }

    /// The single primitive behind [`insert`](HashTable::insert) and
    /// [`set`](HashTable::set).
    fn set_impl(&mut self, key: K, value: V, policy: InsertPolicy) -> bool {
        let hash = self.make_hash(&key);
        if let Some(node) = self.find_node_mut(hash, &key) {
            return match policy {
                InsertPolicy::Protect => false,
                InsertPolicy::Overwrite => {
                    node.value = value;
                    true
                }
            };
        }

        self.link_new(hash, key, value);
        true
    }

    /// Inserts a new entry, leaving any existing entry untouched.
    ///
    /// Returns `false` (without mutating the table) if `key` is already
    /// present. A newly inserted key becomes the head of its bucket's chain.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashTable;
    ///
    /// let mut table: HashTable<&str, i32> = HashTable::new();
    /// assert!(table.insert("k", 1));
    /// assert!(!table.insert("k", 2));
    /// assert_eq!(table["k"], 1);
    /// # }
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> bool {
        self.set_impl(key, value, InsertPolicy::Protect)
    }

    /// Inserts an entry, overwriting the value of an existing key in place.
    ///
    /// An overwritten entry keeps its position in its chain. Always returns
    /// `true`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashTable;
    ///
    /// let mut table: HashTable<&str, i32> = HashTable::new();
    /// assert!(table.set("k", 1));
    /// assert!(table.set("k", 2));
    /// assert_eq!(table["k"], 2);
    /// assert_eq!(table.len(), 1);
    /// # }
    /// ```
    pub fn set(&mut self, key: K, value: V) -> bool {
        self.set_impl(key, value, InsertPolicy::Overwrite)
    }

    /// Inserts every entry of `other` that is not already present.
    pub fn insert_all<S2>(&mut self, other: &HashTable<K, V, S2>)
    where
        K: Clone,
        V: Clone,
    {
        for (key, value) in other.iter() {
            self.insert(key.clone(), value.clone());
        }
    }

    /// Sets every entry of `other`, overwriting values of keys already present.
    pub fn set_all<S2>(&mut self, other: &HashTable<K, V, S2>)
    where
        K: Clone,
        V: Clone,
    {
        for (key, value) in other.iter() {
            self.set(key.clone(), value.clone());
        }
    }

    /// Returns `true` if the table contains `key`.
    pub fn found<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_node(key).is_some()
    }

    /// Returns `true` if the table contains `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.found(key)
    }

    /// Returns a cursor at the entry for `key`, or a cursor equal to [`End`]
    /// if the key is absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::End;
    /// use chain_hash::HashTable;
    ///
    /// let table: HashTable<&str, i32> = [("b", 2)].into_iter().collect();
    /// assert_eq!(table.find("b").value(), Some(&2));
    /// assert!(table.find("z") == End);
    /// # }
    /// ```
    pub fn find<Q>(&self, key: &Q) -> Cursor<'_, K, V, S>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(key);
        match self.locate(hash, key) {
            Some((bucket, depth)) => Cursor::at(self, bucket, depth),
            None => Cursor::end(self),
        }
    }

    /// Returns an erase-safe cursor at the entry for `key`, or a cursor at the
    /// end if the key is absent.
    pub fn find_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, K, V, S>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(key);
        match self.locate(hash, key) {
            Some((bucket, depth)) => CursorMut::at(self, bucket, depth),
            None => CursorMut::end(self),
        }
    }

    /// Returns a reference to the value for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_node(key).map(|(_, node)| &node.value)
    }

    /// Returns a mutable reference to the value for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(key);
        self.find_node_mut(hash, key).map(|node| &mut node.value)
    }

    /// Returns the value for `key`, inserting `V::default()` first if the key
    /// is absent.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let hash = self.make_hash(&key);
        let (bucket, depth) = match self.locate(hash, &key) {
            Some(position) => position,
            None => (self.link_new(hash, key, V::default()), 0),
        };

        match self.node_at_mut(bucket, depth) {
            Some(node) => &mut node.value,
            None => unreachable!("entry located at bucket {bucket} depth {depth} is missing"),
        }
    }

    /// Removes `key` and returns its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key` and returns the stored key and value.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.make_hash(key);
        let (bucket, depth) = self.locate(hash, key)?;
        let node = self.unlink(bucket, depth)?;
        let Node { key, value, .. } = *node;
        Some((key, value))
    }

    /// Erases the entry for `key`. Returns `false` if the key was absent.
    pub fn erase<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove_entry(key).is_some()
    }

    /// Erases every listed key, returning how many were actually present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # #[cfg(any(feature = "std", feature = "foldhash"))]
    /// # {
    /// use chain_hash::HashTable;
    ///
    /// let mut table: HashTable<String, i32> = HashTable::new();
    /// table.insert("a".to_string(), 1);
    /// assert_eq!(table.erase_keys(["a", "z"]), 1);
    /// assert!(table.is_empty());
    /// # }
    /// ```
    pub fn erase_keys<'q, Q, I>(&mut self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'q Q>,
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized + 'q,
    {
        let mut removed = 0;
        for key in keys {
            if self.erase(key) {
                removed += 1;
            }
        }
        removed
    }

    /// Erases every key present in `other`, returning how many were removed.
    ///
    /// The value type and hasher of `other` are arbitrary. The smaller of the
    /// two tables drives the traversal.
    pub fn erase_table_keys<V2, S2>(&mut self, other: &HashTable<K, V2, S2>) -> usize
    where
        S2: BuildHasher,
    {
        let before = self.len;
        if other.len() < self.len {
            for key in other.keys() {
                self.erase(key);
            }
        } else {
            self.retain(|key, _| !other.found(key));
        }
        before - self.len
    }
}

impl<K, V, S> PartialEq for HashTable<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    /// Tables are equal if they hold the same keys mapped to equal values,
    /// independent of capacity and chain order.
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K, V, S> Eq for HashTable<K, V, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S> Index<&Q> for HashTable<K, V, S>
where
    K: Hash + Eq + Borrow<Q>,
    Q: Hash + Eq + ?Sized,
    S: BuildHasher,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present in the table.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("key not found in hash table")
    }
}

impl<K, V, S> Default for HashTable<K, V, S>
where
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> Extend<(K, V)> for HashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Sets every pair, so later pairs overwrite earlier ones with equal keys.
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        let mut table = Self::with_capacity(lower.saturating_mul(2).min(MAX_TABLE_SIZE));
        table.extend(iter);
        table
    }
}

impl<K, V, S> IntoIterator for HashTable<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(mut self) -> IntoIter<K, V> {
        let buckets = core::mem::take(&mut self.buckets);
        let remaining = core::mem::replace(&mut self.len, 0);
        IntoIter {
            buckets: buckets.into_iter(),
            chain: None,
            remaining,
        }
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashTable<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut HashTable<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

/// An iterator over the entries of a [`HashTable`].
///
/// This struct is created by the [`iter`] method on [`HashTable`].
///
/// [`iter`]: HashTable::iter
pub struct Iter<'a, K, V> {
    buckets: core::slice::Iter<'a, Link<K, V>>,
    node: Option<&'a Node<K, V>>,
    remaining: usize,
}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            buckets: self.buckets.clone(),
            node: self.node,
            remaining: self.remaining,
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.node {
                self.node = node.next.as_deref();
                self.remaining -= 1;
                return Some((&node.key, &node.value));
            }
            self.node = self.buckets.next()?.as_deref();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

/// A mutable iterator over the entries of a [`HashTable`].
pub struct IterMut<'a, K, V> {
    buckets: core::slice::IterMut<'a, Link<K, V>>,
    node: Option<&'a mut Node<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.node.take() {
                let Node {
                    key, value, next, ..
                } = node;
                self.node = next.as_deref_mut();
                self.remaining -= 1;
                let key: &'a K = key;
                return Some((key, value));
            }
            self.node = self.buckets.next()?.as_deref_mut();
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
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
        self.inner.next().map(|(k, _)| k)
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
        self.inner.next().map(|(_, v)| v)
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
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

/// An owning iterator over the entries of a [`HashTable`].
pub struct IntoIter<K, V> {
    buckets: alloc::vec::IntoIter<Link<K, V>>,
    chain: Link<K, V>,
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(mut node) = self.chain.take() {
                self.chain = node.next.take();
                self.remaining -= 1;
                let Node { key, value, .. } = *node;
                return Some((key, value));
            }
            self.chain = self.buckets.next()?;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<K, V> Drop for IntoIter<K, V> {
    fn drop(&mut self) {
        for _ in &mut *self {}
    }
}

/// A draining iterator over the entries of a [`HashTable`].
///
/// This struct is created by the [`drain`] method on [`HashTable`]. The table
/// is already empty when the iterator is created; entries not yielded are
/// dropped with the iterator.
///
/// [`drain`]: HashTable::drain
pub struct Drain<'a, K, V> {
    inner: IntoIter<K, V>,
    _marker: PhantomData<&'a mut Node<K, V>>,
}

impl<K, V> Iterator for Drain<'_, K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Drain<'_, K, V> {}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::string::ToString;
    use alloc::vec;
    use core::hash::BuildHasherDefault;
    use core::hash::Hasher;

    use rand::Rng;
    use rand::SeedableRng;
    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use rand::rngs::SmallRng;
    use siphasher::sip::SipHasher;

    use super::*;

    #[derive(Clone)]
    struct SipHashBuilder {
        k0: u64,
        k1: u64,
    }

    impl Default for SipHashBuilder {
        fn default() -> Self {
            let mut rng = OsRng;
            Self {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }
    }

    impl BuildHasher for SipHashBuilder {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    /// Sends every key to the same bucket.
    #[derive(Default)]
    struct ConstantHasher;

    impl Hasher for ConstantHasher {
        fn finish(&self) -> u64 {
            0
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    type Colliding = BuildHasherDefault<ConstantHasher>;

    fn reachable<K, V, S>(table: &HashTable<K, V, S>) -> usize {
        let mut count = 0;
        for head in table.buckets.iter() {
            let mut node = head.as_deref();
            while let Some(current) = node {
                count += 1;
                node = current.next.as_deref();
            }
        }
        count
    }

    fn check_placement<K, V, S>(table: &HashTable<K, V, S>) {
        let mask = table.capacity().wrapping_sub(1);
        for (index, head) in table.buckets.iter().enumerate() {
            let mut node = head.as_deref();
            while let Some(current) = node {
                assert_eq!(current.hash as usize & mask, index);
                node = current.next.as_deref();
            }
        }
    }

    #[test]
    fn canonical_sizes() {
        assert_eq!(canonical_size(0), 0);
        assert_eq!(canonical_size(1), 1);
        assert_eq!(canonical_size(3), 4);
        assert_eq!(canonical_size(64), 64);
        assert_eq!(canonical_size(65), 128);
        assert_eq!(canonical_size(MAX_TABLE_SIZE), MAX_TABLE_SIZE);
    }

    #[test]
    #[should_panic(expected = "exceeds the maximum table size")]
    fn canonical_size_above_maximum_panics() {
        canonical_size(MAX_TABLE_SIZE + 1);
    }

    #[test]
    fn construction_capacities() {
        let table: HashTable<u64, u64, SipHashBuilder> = HashTable::new();
        assert_eq!(table.capacity(), DEFAULT_TABLE_SIZE);

        let table: HashTable<u64, u64, SipHashBuilder> = HashTable::with_capacity(0);
        assert_eq!(table.capacity(), DEFAULT_TABLE_SIZE);

        let table: HashTable<u64, u64, SipHashBuilder> = HashTable::with_capacity(1000);
        assert_eq!(table.capacity(), 1024);
        assert!(table.is_empty());
    }

    #[test]
    fn insert_and_find() {
        let mut table: HashTable<u64, i32, SipHashBuilder> = HashTable::with_capacity(1);
        for k in 0..32u64 {
            assert!(table.insert(k, (k as i32) * 2));
            assert_eq!(table.get(&k), Some(&((k as i32) * 2)), "{:#?}", table);
        }
        assert_eq!(table.len(), 32);

        for k in 0..32u64 {
            let cursor = table.find(&k);
            assert!(cursor != End);
            assert_eq!(cursor.key(), Some(&k));
            assert_eq!(cursor.value(), Some(&((k as i32) * 2)));
        }

        assert!(table.find(&999).is_end());
        assert!(!table.found(&999));
    }

    #[test]
    fn insert_protects_and_set_overwrites() {
        let mut table: HashTable<String, i32, SipHashBuilder> = HashTable::new();

        assert!(table.insert("k".to_string(), 1));
        assert!(!table.insert("k".to_string(), 2));
        assert_eq!(table["k"], 1);

        assert!(table.set("s".to_string(), 1));
        assert!(table.set("s".to_string(), 2));
        assert_eq!(table["s"], 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn set_keeps_chain_position() {
        let mut table: HashTable<u64, u64, Colliding> = HashTable::new();
        for k in 0..5 {
            table.insert(k, k);
        }
        let order: Vec<u64> = table.keys().copied().collect();
        table.set(2, 200);
        let after: Vec<u64> = table.keys().copied().collect();
        assert_eq!(order, after);
        assert_eq!(table[&2], 200);
    }

    #[test]
    fn newest_entry_heads_its_chain() {
        let mut table: HashTable<u64, u64, Colliding> = HashTable::with_capacity(1024);
        for k in 0..10 {
            table.insert(k, k);
        }
        let keys: Vec<u64> = table.keys().copied().collect();
        assert_eq!(keys, (0..10).rev().collect::<Vec<_>>());
        assert_eq!(table.stats().max_chain, 10);
    }

    #[test]
    fn scenario_small_initial_capacity() {
        let mut table: HashTable<String, i32, SipHashBuilder> = HashTable::with_capacity(1);
        assert_eq!(table.capacity(), 1);

        table.insert("a".to_string(), 1);
        table.insert("b".to_string(), 2);
        table.insert("c".to_string(), 3);

        assert!(table.capacity() >= 4);
        assert_eq!(table.len(), 3);
        assert_eq!(table.find("b").value(), Some(&2));
        assert_eq!(table.sorted_toc(), vec!["a", "b", "c"]);
    }

    #[test]
    fn scenario_parallel_lists() {
        let from_lists: HashTable<&str, i32, SipHashBuilder> =
            HashTable::from_lists(vec!["x", "y"], vec![10, 20]);

        let mut sequential: HashTable<&str, i32, SipHashBuilder> = HashTable::new();
        sequential.insert("x", 10);
        sequential.insert("y", 20);

        assert_eq!(from_lists, sequential);
    }

    #[test]
    fn from_lists_keeps_first_duplicate() {
        let table: HashTable<&str, i32, SipHashBuilder> =
            HashTable::from_lists(vec!["x", "x"], vec![1, 2]);
        assert_eq!(table.len(), 1);
        assert_eq!(table["x"], 1);
    }

    #[test]
    #[should_panic(expected = "size of key list (2) and element list (1) differ")]
    fn from_lists_length_mismatch_panics() {
        let _: HashTable<&str, i32, SipHashBuilder> =
            HashTable::from_lists(vec!["x", "y"], vec![10]);
    }

    #[test]
    fn scenario_erase_listed_keys() {
        let mut table: HashTable<String, i32, SipHashBuilder> = HashTable::new();
        table.insert("a".to_string(), 1);
        assert_eq!(table.erase_keys(["a", "z"]), 1);
        assert!(table.is_empty());
        assert_eq!(table.erase_keys(["a"]), 0);
    }

    #[test]
    fn erase_table_keys_either_direction() {
        let mut table: HashTable<u64, u64, SipHashBuilder> = (0..100).map(|k| (k, k)).collect();

        let small: HashTable<u64, (), SipHashBuilder> = [(4, ()), (6, ()), (500, ())]
            .into_iter()
            .collect();
        assert_eq!(table.erase_table_keys(&small), 2);
        assert_eq!(table.len(), 98);

        let large: HashTable<u64, &str, Colliding> =
            (0..1000).map(|k| (k * 2, "even")).collect();
        assert_eq!(table.erase_table_keys(&large), 48);
        assert!(table.keys().all(|k| k % 2 == 1));
    }

    #[test]
    fn erase_by_key() {
        let mut table: HashTable<u64, u64, SipHashBuilder> = HashTable::new();
        table.insert(1, 10);
        table.insert(2, 20);

        assert!(table.erase(&1));
        assert!(!table.erase(&1));
        assert_eq!(table.remove(&2), Some(20));
        assert_eq!(table.remove(&2), None);
        assert!(table.is_empty());
    }

    #[test]
    fn erase_in_middle_of_chain() {
        let mut table: HashTable<u64, u64, Colliding> = HashTable::new();
        for k in 0..6 {
            table.insert(k, k);
        }

        assert!(table.erase(&3));
        assert!(table.erase(&0));
        assert!(table.erase(&5));
        assert_eq!(table.sorted_toc(), vec![1, 2, 4]);
        assert_eq!(reachable(&table), table.len());
    }

    #[test]
    fn erase_during_iteration_visits_every_key_once() {
        for n in [0usize, 1, 2, 3, 7, 64, 129, 500, 1000] {
            let mut table: HashTable<usize, usize, SipHashBuilder> =
                HashTable::with_capacity(n.max(1));
            for k in 0..n {
                table.set(k, k);
            }

            let mut visited = Vec::with_capacity(n);
            let mut cursor = table.begin_mut();
            while cursor != End {
                let (key, _) = cursor.remove().unwrap();
                visited.push(key);
            }
            assert!(!cursor.erase());

            visited.sort_unstable();
            assert_eq!(visited, (0..n).collect::<Vec<_>>());
            assert!(table.is_empty());
            assert_eq!(reachable(&table), 0);
        }
    }

    #[test]
    fn erase_during_iteration_with_collisions() {
        let mut table: HashTable<u64, u64, Colliding> = HashTable::new();
        for k in 0..50 {
            table.insert(k, k);
        }

        let mut visited = 0;
        let mut cursor = table.begin_mut();
        while cursor != End {
            visited += 1;
            if cursor.key().is_some_and(|k| k % 3 == 0) {
                assert!(cursor.erase());
            } else {
                cursor.move_next();
            }
        }

        assert_eq!(visited, 50);
        assert_eq!(table.len(), 33);
        assert!(table.keys().all(|k| k % 3 != 0));
    }

    #[test]
    fn retain_keeps_matching_entries() {
        let mut table: HashTable<u64, u64, SipHashBuilder> = (0..200).map(|k| (k, k)).collect();
        table.retain(|k, v| {
            *v += 1;
            k % 4 == 0
        });
        assert_eq!(table.len(), 50);
        assert!(table.iter().all(|(k, v)| k % 4 == 0 && *v == k + 1));
    }

    #[test]
    fn resize_preserves_mapping() {
        let mut rng = SmallRng::from_os_rng();
        let mut table: HashTable<u64, u64, SipHashBuilder> = HashTable::new();
        for _ in 0..300 {
            let k = rng.random_range(0..10_000);
            table.set(k, k * 3);
        }
        let snapshot = table.clone();

        for new_size in [0usize, 1, 2, 3, 17, 128, 1000, 4096, 64] {
            table.resize(new_size);
            assert_eq!(table, snapshot, "after resize({new_size})");
            assert!(table.capacity().is_power_of_two());
            assert!(table.capacity() >= MIN_TABLE_SIZE);
            assert_eq!(reachable(&table), table.len());
            check_placement(&table);
        }
    }

    #[test]
    fn resize_of_empty_table_to_zero_releases_storage() {
        let mut table: HashTable<u64, u64, SipHashBuilder> = HashTable::new();
        table.resize(0);
        assert_eq!(table.capacity(), 0);
        assert!(table.find(&1).is_end());
        assert!(!table.erase(&1));

        table.insert(1, 1);
        assert_eq!(table.capacity(), MIN_TABLE_SIZE);
        assert_eq!(table[&1], 1);
    }

    #[test]
    #[should_panic(expected = "without backing storage")]
    fn hash_key_index_requires_storage() {
        let mut table: HashTable<u64, u64, SipHashBuilder> = HashTable::new();
        table.clear_storage();
        table.hash_key_index(&1);
    }

    #[test]
    fn hash_key_index_masks_hash() {
        let table: HashTable<u64, u64, SipHashBuilder> = HashTable::with_capacity(64);
        for k in 0..100 {
            let expected = table.hasher().hash_one(k) as usize & 63;
            assert_eq!(table.hash_key_index(&k), expected);
        }
    }

    #[test]
    fn growth_doubles_capacity() {
        let mut table: HashTable<u64, u64, SipHashBuilder> = HashTable::with_capacity(8);
        for k in 0..6 {
            table.insert(k, k);
        }
        assert_eq!(table.capacity(), 8);
        table.insert(6, 6);
        assert_eq!(table.capacity(), 16);
        for k in 7..12 {
            table.insert(k, k);
        }
        assert_eq!(table.capacity(), 16);
        table.insert(12, 12);
        assert_eq!(table.capacity(), 32);
        check_placement(&table);
    }

    #[test]
    fn shrink_reclaims_buckets() {
        let mut table: HashTable<u64, u64, SipHashBuilder> = HashTable::with_capacity(1024);
        for k in 0..10 {
            table.insert(k, k);
        }
        let snapshot = table.clone();

        table.shrink();
        assert_eq!(table.capacity(), 32);
        assert_eq!(table, snapshot);

        table.shrink();
        assert_eq!(table.capacity(), 32);

        table.clear();
        table.shrink();
        assert_eq!(table.capacity(), MIN_TABLE_SIZE);
    }

    #[test]
    fn clear_keeps_storage() {
        let mut table: HashTable<u64, String, SipHashBuilder> = HashTable::with_capacity(256);
        for k in 0..100 {
            table.insert(k, k.to_string());
        }
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 256);
        assert_eq!(table.iter().count(), 0);
        assert!(table.begin() == End);
    }

    #[test]
    fn clear_storage_releases_buckets() {
        let mut table: HashTable<u64, String, SipHashBuilder> = HashTable::with_capacity(256);
        table.insert(1, "one".to_string());
        table.clear_storage();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 0);
        assert_eq!(table.iter().count(), 0);

        table.set(2, "two".to_string());
        assert_eq!(table.get(&2).map(String::as_str), Some("two"));
    }

    #[test]
    fn equality_ignores_capacity_and_order() {
        let state = SipHashBuilder::default();
        let mut forward: HashTable<u64, u64, SipHashBuilder> =
            HashTable::with_capacity_and_hasher(4, state.clone());
        let mut backward: HashTable<u64, u64, SipHashBuilder> =
            HashTable::with_capacity_and_hasher(4096, state);

        for k in 0..100 {
            forward.insert(k, k + 1);
        }
        for k in (0..100).rev() {
            backward.insert(k, k + 1);
        }
        assert_eq!(forward, backward);

        backward.set(50, 0);
        assert_ne!(forward, backward);

        backward.set(50, 51);
        backward.erase(&99);
        assert_ne!(forward, backward);
    }

    #[test]
    fn clone_is_deep() {
        let mut original: HashTable<u64, String, SipHashBuilder> = HashTable::new();
        for k in 0..40 {
            original.insert(k, k.to_string());
        }

        let mut copy = original.clone();
        assert_eq!(copy, original);
        assert_eq!(copy.capacity(), original.capacity());

        copy.set(1, "changed".to_string());
        copy.erase(&2);
        assert_eq!(original[&1], "1");
        assert_eq!(original[&2], "2");
        assert_eq!(copy.len(), 39);
    }

    #[test]
    fn transfer_empties_source() {
        let mut source: HashTable<u64, u64, SipHashBuilder> = (0..20).map(|k| (k, k)).collect();
        let snapshot = source.clone();
        let mut target: HashTable<u64, u64, SipHashBuilder> = HashTable::new();
        target.insert(1000, 1000);

        target.transfer(&mut source);
        assert_eq!(target, snapshot);
        assert!(source.is_empty());
        assert_eq!(source.capacity(), 0);

        source.insert(1, 1);
        assert_eq!(source[&1], 1);
    }

    #[test]
    fn get_or_insert_default_creates_entry() {
        let mut table: HashTable<String, Vec<i32>, SipHashBuilder> = HashTable::with_capacity(1);
        table.get_or_insert_default("a".to_string()).push(1);
        table.get_or_insert_default("a".to_string()).push(2);
        table.get_or_insert_default("b".to_string()).push(3);

        assert_eq!(table["a"], vec![1, 2]);
        assert_eq!(table["b"], vec![3]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn index_of_missing_key_panics() {
        let table: HashTable<u64, u64, SipHashBuilder> = HashTable::new();
        let _value: u64 = table[&1];
    }

    #[test]
    fn insert_all_and_set_all() {
        let mut table: HashTable<u64, u64, SipHashBuilder> = HashTable::new();
        table.insert(1, 1);

        let other: HashTable<u64, u64, Colliding> = [(1, 100), (2, 200)].into_iter().collect();
        table.insert_all(&other);
        assert_eq!(table[&1], 1);
        assert_eq!(table[&2], 200);

        table.set_all(&other);
        assert_eq!(table[&1], 100);
    }

    #[test]
    fn sorted_views() {
        let table: HashTable<u64, char, SipHashBuilder> =
            [(3, 'c'), (1, 'a'), (2, 'b')].into_iter().collect();
        assert_eq!(table.sorted_toc(), vec![1, 2, 3]);
        assert_eq!(table.sorted(), vec![(&1, &'a'), (&2, &'b'), (&3, &'c')]);

        let mut toc = table.toc();
        toc.sort_unstable();
        assert_eq!(toc, table.sorted_toc());
    }

    #[test]
    fn iterators_cover_all_entries() {
        let mut table: HashTable<u64, u64, SipHashBuilder> = (0..50).map(|k| (k, k)).collect();

        assert_eq!(table.iter().len(), 50);
        assert_eq!(table.keys().sum::<u64>(), (0..50).sum());

        for (_, v) in table.iter_mut() {
            *v *= 2;
        }
        for v in table.values_mut() {
            *v += 1;
        }
        assert!(table.iter().all(|(k, v)| *v == k * 2 + 1));
        assert_eq!(table.values().count(), 50);

        let mut owned: Vec<(u64, u64)> = table.into_iter().collect();
        owned.sort_unstable();
        assert_eq!(owned.len(), 50);
        assert_eq!(owned[10], (10, 21));
    }

    #[test]
    fn drain_empties_but_keeps_capacity() {
        let mut table: HashTable<u64, String, SipHashBuilder> = HashTable::with_capacity(512);
        for k in 0..100 {
            table.insert(k, k.to_string());
        }

        let mut drain = table.drain();
        assert_eq!(drain.len(), 100);
        let first = drain.next();
        assert!(first.is_some());
        drop(drain);

        assert!(table.is_empty());
        assert_eq!(table.capacity(), 512);
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn cursor_walks_every_entry() {
        let table: HashTable<u64, u64, SipHashBuilder> = (0..300).map(|k| (k, k)).collect();

        let mut seen = Vec::new();
        let mut cursor = table.begin();
        while cursor != table.end() {
            seen.push(*cursor.key().unwrap());
            cursor.move_next();
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..300).collect::<Vec<_>>());
        assert!(cursor.key().is_none());

        cursor.move_next();
        assert!(cursor == End);
    }

    #[test]
    fn cursor_equality_compares_positions() {
        let table: HashTable<u64, u64, SipHashBuilder> = (0..10).map(|k| (k, k)).collect();
        assert!(table.find(&3) == table.find(&3));
        assert!(table.find(&3) != table.find(&4));
        assert!(table.find(&42) == table.find(&43));
        assert!(End == table.find(&42));
    }

    #[test]
    fn find_mut_modifies_and_erases() {
        let mut table: HashTable<u64, u64, SipHashBuilder> = (0..10).map(|k| (k, k)).collect();

        {
            let mut cursor = table.find_mut(&4);
            *cursor.value_mut().unwrap() = 40;
        }
        assert_eq!(table[&4], 40);

        {
            let mut cursor = table.find_mut(&5);
            assert_eq!(cursor.remove(), Some((5, 5)));
        }
        assert!(!table.found(&5));

        let mut cursor = table.find_mut(&5);
        assert!(cursor.is_end());
        assert!(!cursor.erase());
    }

    #[test]
    fn count_invariant_random_ops() {
        let mut rng = SmallRng::from_os_rng();
        let mut table: HashTable<u32, u32, SipHashBuilder> = HashTable::with_capacity(1);
        let mut model = hashbrown::HashMap::new();

        for _ in 0..5_000 {
            let key = rng.random_range(0..512u32);
            let value = rng.random::<u32>();
            match rng.random_range(0..5) {
                0 => {
                    let inserted = table.insert(key, value);
                    assert_eq!(inserted, !model.contains_key(&key));
                    model.entry(key).or_insert(value);
                }
                1 => {
                    assert!(table.set(key, value));
                    model.insert(key, value);
                }
                2 => {
                    assert_eq!(table.erase(&key), model.remove(&key).is_some());
                }
                3 => {
                    assert_eq!(table.get(&key), model.get(&key));
                }
                _ => {
                    if rng.random_bool(0.05) {
                        table.resize(rng.random_range(0..2048));
                    }
                }
            }

            assert_eq!(table.len(), model.len());
        }

        assert_eq!(reachable(&table), table.len());
        assert_eq!(table.iter().count(), table.len());
        check_placement(&table);
        for (k, v) in model.iter() {
            assert_eq!(table.get(k), Some(v));
        }
    }

    #[test]
    fn long_collision_chain_drops_without_overflow() {
        let mut table: HashTable<u64, u64, Colliding> = HashTable::with_capacity(16);
        for k in 0..100_000 {
            table.link_new(0, k, k);
        }
        assert_eq!(table.len(), 100_000);
        drop(table);
    }

    #[test]
    fn retain_on_single_long_chain() {
        let mut table: HashTable<u64, u64, Colliding> = HashTable::with_capacity(16);
        for k in 0..100_000 {
            table.link_new(0, k, k);
        }

        let mut calls = 0;
        table.retain(|k, v| {
            calls += 1;
            *v += 1;
            k % 2 == 0
        });

        assert_eq!(calls, 100_000);
        assert_eq!(table.len(), 50_000);
        assert_eq!(reachable(&table), 50_000);
        // Survivors keep their newest-first chain order.
        assert!(table.keys().copied().eq((0..100_000).rev().filter(|k| k % 2 == 0)));
        assert!(table.iter().all(|(k, v)| *v == k + 1));
    }

    #[test]
    fn erase_table_keys_on_single_long_chain() {
        let mut table: HashTable<u64, u64, Colliding> = HashTable::with_capacity(16);
        for k in 0..100_000 {
            table.link_new(0, k, k);
        }
        let odd: HashTable<u64, (), SipHashBuilder> =
            (0..100_000).map(|k| (2 * k + 1, ())).collect();

        assert_eq!(table.erase_table_keys(&odd), 50_000);
        assert_eq!(table.len(), 50_000);
        assert!(table.keys().all(|k| k % 2 == 0));
    }

    #[test]
    fn stats_report_chains() {
        let mut table: HashTable<u64, u64, Colliding> = HashTable::with_capacity(8);
        for k in 0..3 {
            table.insert(k, k);
        }
        let stats = table.stats();
        assert_eq!(stats.len, 3);
        assert_eq!(stats.capacity, 8);
        assert_eq!(stats.used_buckets, 1);
        assert_eq!(stats.max_chain, 3);
        assert_eq!(stats.histogram, vec![7, 0, 0, 1]);
        assert!((stats.mean_chain() - 3.0).abs() < f64::EPSILON);
        assert!(stats.to_string().contains("longest chain 3"));
    }

    #[test]
    fn debug_formats_as_map() {
        let table: HashTable<u64, &str, SipHashBuilder> = [(1, "one")].into_iter().collect();
        assert_eq!(alloc::format!("{:?}", table), "{1: \"one\"}");
    }
}
