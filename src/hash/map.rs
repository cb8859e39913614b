use super::{HashCursor, HashCursorMut, HashNode, PairKey, SparseHashSet};
use crate::{
    error::SparseResult,
    memory::{GrowableHashMemory, HashMemory},
};
use std::{
    borrow::Borrow,
    fmt,
    hash::{BuildHasher, Hash, RandomState},
};

/// Unordered map with stable entry indices: a [`SparseHashSet`] of `(K, V)`
/// pairs keyed by the first half.
pub struct SparseHashMap<K, V, M = GrowableHashMemory<HashNode<(K, V)>>, S = RandomState>
where
    M: HashMemory<HashNode<(K, V)>>,
{
    set: SparseHashSet<(K, V), M, S, PairKey>,
}

impl<K, V, M: HashMemory<HashNode<(K, V)>>, S: Default> SparseHashMap<K, V, M, S> {
    pub fn new() -> Self {
        Self {
            set: SparseHashSet::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            set: SparseHashSet::with_capacity(capacity),
        }
    }
}

impl<K, V, M: HashMemory<HashNode<(K, V)>>, S> SparseHashMap<K, V, M, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            set: SparseHashSet::with_hasher(hasher),
        }
    }

    /// The underlying set of pairs, including its bucket layer.
    #[inline]
    pub fn as_set(&self) -> &SparseHashSet<(K, V), M, S, PairKey> {
        &self.set
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.set.capacity()
    }

    /// Entry at `index`, if live.
    pub fn at(&self, index: usize) -> Option<(&K, &V)> {
        self.set.at(index).map(|(k, v)| (k, v))
    }

    pub fn at_mut(&mut self, index: usize) -> Option<(&K, &mut V)> {
        self.set
            .data
            .get_mut(index)
            .map(|node| (&node.value.0, &mut node.value.1))
    }

    pub fn remove_at(&mut self, index: usize) -> (K, V) {
        self.set.remove_at(index)
    }

    pub fn reserve(&mut self, capacity: usize) {
        self.set.reserve(capacity);
    }

    pub fn shrink(&mut self) {
        self.set.shrink();
    }

    pub fn compact(&mut self) -> bool {
        self.set.compact()
    }

    pub fn rehash(&mut self) {
        self.set.rehash();
    }

    pub fn clear(&mut self) {
        self.set.clear();
    }

    pub fn release(&mut self) {
        self.set.release();
    }

    pub fn retain(&mut self, mut f: impl FnMut(&K, &mut V) -> bool) {
        let mut cursor = self.set.cursor_begin_mut();

        while cursor.is_valid() {
            let (key, value) = cursor.value_mut();

            if f(key, value) {
                cursor.move_next();
            } else {
                cursor.erase_and_move_next();
            }
        }
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> {
        self.set.iter().map(|(k, v)| (k, v))
    }

    pub fn iter_mut(&mut self) -> impl DoubleEndedIterator<Item = (&K, &mut V)> {
        self.set
            .data
            .iter_mut()
            .map(|(_, node)| (&node.value.0, &mut node.value.1))
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> {
        self.set.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> {
        self.set.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut V> {
        self.iter_mut().map(|(_, v)| v)
    }

    pub fn cursor_begin(&self) -> HashCursor<'_, (K, V), M, PairKey> {
        self.set.cursor_begin()
    }

    pub fn cursor_end(&self) -> HashCursor<'_, (K, V), M, PairKey> {
        self.set.cursor_end()
    }

    pub fn cursor_begin_overflow(&self) -> HashCursor<'_, (K, V), M, PairKey> {
        self.set.cursor_begin_overflow()
    }

    pub fn cursor_end_overflow(&self) -> HashCursor<'_, (K, V), M, PairKey> {
        self.set.cursor_end_overflow()
    }

    pub fn cursor_begin_mut(&mut self) -> HashCursorMut<'_, (K, V), M, PairKey> {
        self.set.cursor_begin_mut()
    }

    pub fn cursor_end_mut(&mut self) -> HashCursorMut<'_, (K, V), M, PairKey> {
        self.set.cursor_end_mut()
    }

    pub fn cursor_begin_overflow_mut(&mut self) -> HashCursorMut<'_, (K, V), M, PairKey> {
        self.set.cursor_begin_overflow_mut()
    }

    pub fn cursor_end_overflow_mut(&mut self) -> HashCursorMut<'_, (K, V), M, PairKey> {
        self.set.cursor_end_overflow_mut()
    }
}

impl<K, V, M, S> SparseHashMap<K, V, M, S>
where
    K: Hash + Eq,
    M: HashMemory<HashNode<(K, V)>>,
    S: BuildHasher,
{
    #[inline]
    pub fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.set.find(key)
    }

    #[inline]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.set.contains(key)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.set.get(key).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.set.get(key).map(|(k, v)| (k, v))
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.set.find(key)?;
        self.at_mut(index).map(|(_, v)| v)
    }

    /// Inserts or overwrites. Returns the previous value for `key`.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.set.hash_key(&key);

        match self.set.find_with_hash(hash, &key) {
            Some(index) => self
                .at_mut(index)
                .map(|(_, slot)| std::mem::replace(slot, value)),
            None => {
                self.set.add_new(hash, (key, value));
                None
            }
        }
    }

    /// Inserts only if `key` is absent. Returns the entry's index.
    pub fn try_insert(&mut self, key: K, value: V) -> SparseResult<usize> {
        self.set.try_add((key, value))
    }

    /// Value for `key`, inserting `make()` first if absent.
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        let index = match self.set.find(&key) {
            Some(index) => index,
            None => self.set.add((key, make())).0,
        };

        // SAFETY: found or just inserted, so live.
        unsafe { &mut self.set.data.get_unchecked_mut(index).value.1 }
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.set.remove(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.set.remove(key)
    }
}

impl<K, V, M: HashMemory<HashNode<(K, V)>>, S: Default> Default for SparseHashMap<K, V, M, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone, M: HashMemory<HashNode<(K, V)>>, S: Clone> Clone
    for SparseHashMap<K, V, M, S>
{
    fn clone(&self) -> Self {
        Self {
            set: self.set.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, M: HashMemory<HashNode<(K, V)>>, S> fmt::Debug
    for SparseHashMap<K, V, M, S>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, M, S> PartialEq for SparseHashMap<K, V, M, S>
where
    K: Hash + Eq,
    V: PartialEq,
    M: HashMemory<HashNode<(K, V)>>,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.set == other.set
    }
}

impl<K, V, M, S> Extend<(K, V)> for SparseHashMap<K, V, M, S>
where
    K: Hash + Eq,
    M: HashMemory<HashNode<(K, V)>>,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, M, S> FromIterator<(K, V)> for SparseHashMap<K, V, M, S>
where
    K: Hash + Eq,
    M: HashMemory<HashNode<(K, V)>>,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K, V, M: HashMemory<HashNode<(K, V)>>, S> IntoIterator for SparseHashMap<K, V, M, S> {
    type Item = (K, V);
    type IntoIter = super::IntoIter<(K, V), M>;

    fn into_iter(self) -> Self::IntoIter {
        self.set.into_iter()
    }
}
