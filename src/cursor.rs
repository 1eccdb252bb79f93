//! Positions within a [`HashTable`].
//!
//! A [`Cursor`] is a read-only position that walks the table in bucket order,
//! following each chain from its head. A [`CursorMut`] additionally allows
//! erasing the entry it points at; erasing moves it to the logical next
//! entry, so a single loop can visit and remove every entry.
//!
//! Both compare against [`End`], a zero-sized marker for the past-the-end
//! position that needs no table to construct.

use core::fmt::Debug;
use core::iter::Enumerate;
use core::marker::PhantomData;
use core::slice;

use crate::hash_table::HashTable;
use crate::hash_table::Link;
use crate::hash_table::Node;

/// The past-the-end position of every table.
///
/// Any cursor that has walked off the last entry, or that was returned by a
/// failed lookup, compares equal to `End`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct End;

/// A reference to a link slot: a bucket head or a node's `next` field.
///
/// Implemented for shared and unique references so both cursors step through
/// chains with the same code.
trait ChainLink: Sized {
    fn is_occupied(&self) -> bool;

    /// The link after the node held here, if that link holds a node too.
    fn successor(self) -> Option<Self>;

    fn descend(mut self, depth: usize) -> Option<Self> {
        for _ in 0..depth {
            self = self.successor()?;
        }
        Some(self)
    }
}

impl<K, V> ChainLink for &Link<K, V> {
    #[inline]
    fn is_occupied(&self) -> bool {
        self.is_some()
    }

    #[inline]
    fn successor(self) -> Option<Self> {
        let node = self.as_deref()?;
        node.next.is_some().then_some(&node.next)
    }
}

impl<K, V> ChainLink for &mut Link<K, V> {
    #[inline]
    fn is_occupied(&self) -> bool {
        self.is_some()
    }

    #[inline]
    fn successor(self) -> Option<Self> {
        let node = self.as_deref_mut()?;
        if node.next.is_some() {
            Some(&mut node.next)
        } else {
            None
        }
    }
}

type Heads<'a, K, V> = Enumerate<slice::Iter<'a, Link<K, V>>>;
type HeadsMut<'a, K, V> = Enumerate<slice::IterMut<'a, Link<K, V>>>;
type SharedPosition<'a, K, V> = Position<&'a Link<K, V>, Heads<'a, K, V>>;
type UniquePosition<'a, K, V> = Position<&'a mut Link<K, V>, HeadsMut<'a, K, V>>;

/// Where a cursor rests: the occupied link slot of the current entry plus the
/// bucket heads not yet visited.
///
/// Stepping along a chain follows one link and stepping between chains pulls
/// heads from `heads`, so a full walk touches each node and bucket once.
#[derive(Clone)]
struct Position<L, I> {
    slot: Option<L>,
    heads: I,
    bucket: usize,
    capacity: usize,
    /// Links followed plus bucket heads examined.
    #[cfg(test)]
    steps: usize,
}

impl<L, I> Position<L, I>
where
    L: ChainLink,
    I: Iterator<Item = (usize, L)>,
{
    fn end(heads: I, capacity: usize) -> Self {
        Self {
            slot: None,
            heads,
            bucket: capacity,
            capacity,
            #[cfg(test)]
            steps: 0,
        }
    }

    fn begin(heads: I, capacity: usize) -> Self {
        let mut position = Self::end(heads, capacity);
        position.seek_occupied();
        position
    }

    /// The entry `depth` links down the chain of `bucket`.
    fn at(heads: I, capacity: usize, bucket: usize, depth: usize) -> Self {
        let mut position = Self::end(heads, capacity);
        let slot = position
            .heads
            .nth(bucket)
            .and_then(|(_, head)| head.descend(depth));
        if let Some(slot) = slot.filter(ChainLink::is_occupied) {
            position.slot = Some(slot);
            position.bucket = bucket;
        }
        position
    }

    #[inline]
    fn is_end(&self) -> bool {
        self.slot.is_none()
    }

    /// Moves to the chain successor, or to the head of the next non-empty
    /// bucket. Does nothing at the end.
    fn advance(&mut self) {
        let Some(slot) = self.slot.take() else {
            return;
        };

        #[cfg(test)]
        {
            self.steps += 1;
        }

        match slot.successor() {
            Some(next) => self.slot = Some(next),
            None => self.seek_occupied(),
        }
    }

    /// Rests on the first occupied head left in `heads`, or at the end.
    fn seek_occupied(&mut self) {
        self.slot = None;
        self.bucket = self.capacity;
        for (bucket, head) in self.heads.by_ref() {
            #[cfg(test)]
            {
                self.steps += 1;
            }

            if head.is_occupied() {
                self.bucket = bucket;
                self.slot = Some(head);
                return;
            }
        }
    }
}

/// A read-only position within a [`HashTable`].
///
/// Created by [`HashTable::begin`] and [`HashTable::find`].
pub struct Cursor<'a, K, V, S> {
    position: SharedPosition<'a, K, V>,
    _table: PhantomData<&'a HashTable<K, V, S>>,
}

impl<K, V, S> Clone for Cursor<'_, K, V, S> {
    fn clone(&self) -> Self {
        Self {
            position: self.position.clone(),
            _table: PhantomData,
        }
    }
}

impl<K, V, S> Debug for Cursor<'_, K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.node() {
            Some(node) => f
                .debug_struct("Cursor")
                .field("bucket", &self.position.bucket)
                .field("key", &node.key)
                .field("value", &node.value)
                .finish(),
            None => f.debug_tuple("Cursor").field(&End).finish(),
        }
    }
}

impl<'a, K, V, S> Cursor<'a, K, V, S> {
    fn with_position(position: SharedPosition<'a, K, V>) -> Self {
        Self {
            position,
            _table: PhantomData,
        }
    }

    pub(crate) fn begin(table: &'a HashTable<K, V, S>) -> Self {
        let heads = table.heads();
        Self::with_position(Position::begin(heads.iter().enumerate(), heads.len()))
    }

    pub(crate) fn at(table: &'a HashTable<K, V, S>, bucket: usize, depth: usize) -> Self {
        let heads = table.heads();
        Self::with_position(Position::at(
            heads.iter().enumerate(),
            heads.len(),
            bucket,
            depth,
        ))
    }

    pub(crate) fn end(table: &'a HashTable<K, V, S>) -> Self {
        let heads = table.heads();
        Self::with_position(Position::end(heads.iter().enumerate(), heads.len()))
    }

    #[inline]
    fn node(&self) -> Option<&'a Node<K, V>> {
        self.position.slot.and_then(Option::as_deref)
    }

    /// Returns `true` if the cursor is past the last entry.
    pub fn is_end(&self) -> bool {
        self.position.is_end()
    }

    /// The key at the cursor, or `None` at the end.
    pub fn key(&self) -> Option<&'a K> {
        self.node().map(|node| &node.key)
    }

    /// The value at the cursor, or `None` at the end.
    pub fn value(&self) -> Option<&'a V> {
        self.node().map(|node| &node.value)
    }

    /// The key and value at the cursor, or `None` at the end.
    pub fn entry(&self) -> Option<(&'a K, &'a V)> {
        self.node().map(|node| (&node.key, &node.value))
    }

    /// Index of the bucket holding the current entry.
    ///
    /// Equal to the table's capacity at the end.
    pub fn bucket(&self) -> usize {
        self.position.bucket
    }

    /// Advances to the next entry.
    ///
    /// Follows the current chain first, then scans the following buckets for
    /// the next non-empty one. Does nothing at the end.
    pub fn move_next(&mut self) {
        self.position.advance();
    }
}

impl<K, V, S> PartialEq for Cursor<'_, K, V, S> {
    /// Cursors are equal if they point at the same entry, or are both at the
    /// end.
    fn eq(&self, other: &Self) -> bool {
        match (self.node(), other.node()) {
            (Some(a), Some(b)) => core::ptr::eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<K, V, S> PartialEq<End> for Cursor<'_, K, V, S> {
    fn eq(&self, _: &End) -> bool {
        self.is_end()
    }
}

impl<K, V, S> PartialEq<Cursor<'_, K, V, S>> for End {
    fn eq(&self, cursor: &Cursor<'_, K, V, S>) -> bool {
        cursor.is_end()
    }
}

/// An erase-safe position within a [`HashTable`].
///
/// Holds the table mutably for its lifetime. Created by
/// [`HashTable::begin_mut`] and [`HashTable::find_mut`].
///
/// # Examples
///
/// ```rust
/// # #[cfg(any(feature = "std", feature = "foldhash"))]
/// # {
/// use chain_hash::End;
/// use chain_hash::HashTable;
///
/// let mut table: HashTable<u32, u32> = (0..100).map(|n| (n, n)).collect();
///
/// let mut cursor = table.begin_mut();
/// let mut visited = 0;
/// while cursor != End {
///     visited += 1;
///     cursor.erase();
/// }
///
/// assert_eq!(visited, 100);
/// assert!(table.is_empty());
/// # }
/// ```
pub struct CursorMut<'a, K, V, S> {
    position: UniquePosition<'a, K, V>,
    len: &'a mut usize,
    _table: PhantomData<&'a mut HashTable<K, V, S>>,
}

impl<K, V, S> Debug for CursorMut<'_, K, V, S>
where
    K: Debug,
    V: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.node() {
            Some(node) => f
                .debug_struct("CursorMut")
                .field("bucket", &self.position.bucket)
                .field("key", &node.key)
                .field("value", &node.value)
                .finish(),
            None => f.debug_tuple("CursorMut").field(&End).finish(),
        }
    }
}

impl<'a, K, V, S> CursorMut<'a, K, V, S> {
    fn with_position(
        table: &'a mut HashTable<K, V, S>,
        place: impl FnOnce(HeadsMut<'a, K, V>, usize) -> UniquePosition<'a, K, V>,
    ) -> Self {
        let (heads, len) = table.heads_mut();
        let capacity = heads.len();
        Self {
            position: place(heads.iter_mut().enumerate(), capacity),
            len,
            _table: PhantomData,
        }
    }

    pub(crate) fn begin(table: &'a mut HashTable<K, V, S>) -> Self {
        Self::with_position(table, Position::begin)
    }

    pub(crate) fn at(table: &'a mut HashTable<K, V, S>, bucket: usize, depth: usize) -> Self {
        Self::with_position(table, |heads, capacity| {
            Position::at(heads, capacity, bucket, depth)
        })
    }

    pub(crate) fn end(table: &'a mut HashTable<K, V, S>) -> Self {
        Self::with_position(table, Position::end)
    }

    #[inline]
    fn node(&self) -> Option<&Node<K, V>> {
        self.position.slot.as_deref().and_then(Option::as_deref)
    }

    /// Returns `true` if the cursor is past the last entry.
    pub fn is_end(&self) -> bool {
        self.position.is_end()
    }

    /// The key at the cursor, or `None` at the end.
    pub fn key(&self) -> Option<&K> {
        self.node().map(|node| &node.key)
    }

    /// The value at the cursor, or `None` at the end.
    pub fn value(&self) -> Option<&V> {
        self.node().map(|node| &node.value)
    }

    /// The key and value at the cursor, or `None` at the end.
    pub fn entry(&self) -> Option<(&K, &V)> {
        self.node().map(|node| (&node.key, &node.value))
    }

    /// A mutable reference to the value at the cursor, or `None` at the end.
    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.entry_mut().map(|(_, value)| value)
    }

    /// The key and a mutable reference to the value at the cursor, or `None`
    /// at the end.
    pub fn entry_mut(&mut self) -> Option<(&K, &mut V)> {
        self.position
            .slot
            .as_deref_mut()
            .and_then(Option::as_deref_mut)
            .map(|node| (&node.key, &mut node.value))
    }

    /// Advances to the next entry. Does nothing at the end.
    pub fn move_next(&mut self) {
        self.position.advance();
    }

    /// Removes the entry at the cursor and returns it.
    ///
    /// The cursor moves to the entry that followed the removed one: its chain
    /// successor if there is one, otherwise the head of the next non-empty
    /// bucket, otherwise the end. Returns `None`, leaving the table
    /// untouched, if the cursor is at the end.
    pub fn remove(&mut self) -> Option<(K, V)> {
        let slot = self.position.slot.take()?;
        let Some(mut node) = slot.take() else {
            unreachable!("cursor rests on an empty link")
        };

        // The successor now occupies the removed node's slot.
        *slot = node.next.take();
        *self.len -= 1;
        if slot.is_some() {
            self.position.slot = Some(slot);
        } else {
            self.position.seek_occupied();
        }

        let Node { key, value, .. } = *node;
        Some((key, value))
    }

    /// Erases the entry at the cursor, moving to the entry that followed it.
    ///
    /// Returns `false` if the cursor was already at the end.
    pub fn erase(&mut self) -> bool {
        self.remove().is_some()
    }
}

impl<K, V, S> PartialEq<End> for CursorMut<'_, K, V, S> {
    fn eq(&self, _: &End) -> bool {
        self.is_end()
    }
}

impl<K, V, S> PartialEq<CursorMut<'_, K, V, S>> for End {
    fn eq(&self, cursor: &CursorMut<'_, K, V, S>) -> bool {
        cursor.is_end()
    }
}
