use super::{HashCursor, HashCursorMut, HashNode, HashType, Identity, KeyExtract};
use crate::{
    error::{SparseError, SparseResult},
    hash,
    memory::{GrowableHashMemory, HashMemory, NPOS},
    sparse::{self, SparseVector},
};
use std::{
    borrow::Borrow,
    fmt,
    hash::{BuildHasher, Hash, RandomState},
    iter::FusedIterator,
    marker::PhantomData,
};

/// Unordered set over a sparse vector with a bucket index on top.
///
/// Elements keep their index until removed, so an index returned by
/// [`add`](SparseHashSet::add) or [`find`](SparseHashSet::find) stays usable
/// across unrelated insertions and removals. `K` picks the lookup key out of
/// each element; `M` picks the storage strategy.
pub struct SparseHashSet<T, M = GrowableHashMemory<HashNode<T>>, S = RandomState, K = Identity>
where
    M: HashMemory<HashNode<T>>,
{
    pub(crate) data: SparseVector<HashNode<T>, M>,
    hasher: S,
    _key: PhantomData<fn() -> K>,
}

impl<T, M: HashMemory<HashNode<T>>, S: Default, K> SparseHashSet<T, M, S, K> {
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut set = Self::new();
        set.reserve(capacity);
        set
    }
}

impl<T, M: HashMemory<HashNode<T>>, S, K> SparseHashSet<T, M, S, K> {
    pub fn with_hasher(hasher: S) -> Self {
        let mut set = Self {
            data: SparseVector::new(),
            hasher,
            _key: PhantomData,
        };
        // fixed and inline strategies start with a bucket already sized
        set.rehash();
        set
    }

    #[inline]
    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    #[inline]
    pub fn sparse_size(&self) -> usize {
        self.data.sparse_size()
    }

    #[inline]
    pub fn hole_size(&self) -> usize {
        self.data.hole_size()
    }

    #[inline]
    pub fn freelist_head(&self) -> usize {
        self.data.freelist_head()
    }

    #[inline]
    pub fn bits(&self) -> &[u64] {
        self.data.bits()
    }

    /// Storage strategy, for inspecting its layout.
    #[inline]
    pub fn memory(&self) -> &M {
        &self.data.memory
    }

    #[inline]
    pub fn has_data(&self, index: usize) -> bool {
        self.data.has_data(index)
    }

    /// Element at `index`, if live.
    #[inline]
    pub fn at(&self, index: usize) -> Option<&T> {
        self.data.get(index).map(|node| &node.value)
    }

    pub fn try_at(&self, index: usize) -> SparseResult<&T> {
        self.data.try_get(index).map(|node| &node.value)
    }

    /// Cached hash of the element at `index`, if live.
    #[inline]
    pub fn hash_at(&self, index: usize) -> Option<HashType> {
        self.data.get(index).map(|node| node.hash)
    }

    /// Bucket heads. Entry `i` starts the chain of elements whose hash masks to `i`.
    #[inline]
    pub fn bucket(&self) -> &[usize] {
        self.data.memory.bucket()
    }

    #[inline]
    pub fn bucket_size(&self) -> usize {
        self.data.memory.bucket_size()
    }

    #[inline]
    pub fn bucket_mask(&self) -> usize {
        self.data.memory.bucket_mask()
    }

    #[inline]
    pub fn bucket_index(&self, hash: HashType) -> usize {
        hash as usize & self.data.memory.bucket_mask()
    }

    /// Next slot in the chain after live slot `index`, or [`NPOS`].
    #[inline]
    pub fn chain_next(&self, index: usize) -> usize {
        assert!(self.data.has_data(index), "SparseHashSet: no element at {index}");
        // SAFETY: checked live.
        unsafe { self.data.slot(index).next }
    }

    // each step below leaves lookups broken until `rebuild` runs

    /// Sizes the bucket array for the current capacity without rebuilding.
    /// Returns `true` if the size changed.
    pub(crate) fn resize_bucket(&mut self) -> bool {
        self.data.memory.resize_bucket()
    }

    pub(crate) fn free_bucket(&mut self) {
        self.data.memory.free_bucket();
    }

    pub(crate) fn clean_bucket(&mut self) {
        hash::clean_bucket(self.data.memory.bucket_mut());
    }

    /// Rethreads all live elements into clean buckets.
    pub(crate) fn build_bucket(&mut self) {
        hash::build_bucket(&mut self.data);
    }

    /// Resizes, cleans and rebuilds the bucket array unconditionally.
    pub fn rehash(&mut self) {
        self.resize_bucket();
        self.rebuild();
    }

    fn rebuild(&mut self) {
        log::trace!(
            "rebuilding {} buckets for {} elements",
            self.bucket_size(),
            self.len()
        );
        self.clean_bucket();
        self.build_bucket();
    }

    /// Rebuilds only when the bucket size no longer matches the capacity.
    fn sync_bucket(&mut self) {
        if self.resize_bucket() {
            self.rebuild();
        }
    }

    pub fn reserve(&mut self, capacity: usize) {
        self.data.reserve(capacity);
        self.sync_bucket();
    }

    /// Cuts trailing holes and shrinks storage to fit.
    pub fn shrink(&mut self) {
        self.data.shrink();
        self.sync_bucket();
    }

    /// Fills holes from the tail. Invalidates the indices of moved elements.
    pub fn compact(&mut self) -> bool {
        if !self.data.compact() {
            return false;
        }

        self.rehash();
        true
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.clean_bucket();
    }

    /// Drops all elements and gives back all storage.
    pub fn release(&mut self) {
        self.data.release();
        self.free_bucket();
        self.rehash();
    }

    /// Removes the element at `index`.
    ///
    /// # Panics
    /// Panics if slot `index` is not live.
    pub fn remove_at(&mut self, index: usize) -> T {
        assert!(self.data.has_data(index), "SparseHashSet: no element at {index}");
        hash::unlink(&mut self.data, index);
        // SAFETY: checked live.
        unsafe { self.data.remove_at_unchecked(index).value }
    }

    pub fn try_remove_at(&mut self, index: usize) -> SparseResult<T> {
        self.data.try_get(index)?;
        Ok(self.remove_at(index))
    }

    /// Keeps only the elements for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(&T) -> bool) {
        let mut cursor = self.cursor_begin_mut();

        while cursor.is_valid() {
            if f(cursor.value()) {
                cursor.move_next();
            } else {
                cursor.erase_and_move_next();
            }
        }
    }

    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            inner: self.data.iter(),
        }
    }

    /// Live `(index, &T)` pairs in index order.
    pub fn indexed(&self) -> impl DoubleEndedIterator<Item = (usize, &T)> {
        self.data.iter().map(|(index, node)| (index, &node.value))
    }

    pub fn cursor_begin(&self) -> HashCursor<'_, T, M, K> {
        HashCursor::new(self.data.cursor_begin())
    }

    pub fn cursor_end(&self) -> HashCursor<'_, T, M, K> {
        HashCursor::new(self.data.cursor_end())
    }

    pub fn cursor_begin_overflow(&self) -> HashCursor<'_, T, M, K> {
        HashCursor::new(self.data.cursor_begin_overflow())
    }

    pub fn cursor_end_overflow(&self) -> HashCursor<'_, T, M, K> {
        HashCursor::new(self.data.cursor_end_overflow())
    }

    pub fn cursor_begin_mut(&mut self) -> HashCursorMut<'_, T, M, K> {
        HashCursorMut::new(self.data.cursor_begin_mut())
    }

    pub fn cursor_end_mut(&mut self) -> HashCursorMut<'_, T, M, K> {
        HashCursorMut::new(self.data.cursor_end_mut())
    }

    pub fn cursor_begin_overflow_mut(&mut self) -> HashCursorMut<'_, T, M, K> {
        HashCursorMut::new(self.data.cursor_begin_overflow_mut())
    }

    pub fn cursor_end_overflow_mut(&mut self) -> HashCursorMut<'_, T, M, K> {
        HashCursorMut::new(self.data.cursor_end_overflow_mut())
    }
}

impl<T, M, S, K> SparseHashSet<T, M, S, K>
where
    M: HashMemory<HashNode<T>>,
    S: BuildHasher,
    K: KeyExtract<T>,
{
    #[inline]
    pub fn hash_key<Q: Hash + ?Sized>(&self, key: &Q) -> HashType {
        self.hasher.hash_one(key)
    }

    /// Index of the element with a key equal to `key`.
    #[inline]
    pub fn find<Q>(&self, key: &Q) -> Option<usize>
    where
        K::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find_with_hash(self.hash_key(key), key)
    }

    /// [`find`](SparseHashSet::find) with a hash computed by [`hash_key`](SparseHashSet::hash_key).
    pub fn find_with_hash<Q>(&self, hash: HashType, key: &Q) -> Option<usize>
    where
        K::Key: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        if self.bucket_size() == 0 {
            return None;
        }

        let mut index = self.bucket()[self.bucket_index(hash)];

        while index != NPOS {
            // SAFETY: chains only hold live slots.
            let (node, next) = unsafe { (self.data.get_unchecked(index), self.data.slot(index).next) };

            if node.hash == hash && <K::Key as Borrow<Q>>::borrow(K::key(&node.value)) == key {
                return Some(index);
            }

            index = next;
        }

        None
    }

    #[inline]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.find(key).is_some()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        K::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        // SAFETY: find only returns live indices.
        self.find(key).map(|index| unsafe { &self.data.get_unchecked(index).value })
    }

    /// Stores a value whose key is known to be absent.
    pub(crate) fn add_new(&mut self, hash: HashType, value: T) -> usize {
        let index = self.data.add(HashNode { hash, value });

        if self.resize_bucket() {
            self.rebuild();
        } else {
            hash::link(&mut self.data, index);
        }

        index
    }

    /// Inserts `value` unless an equal key is present.
    ///
    /// Returns the element's index and whether it was inserted.
    pub fn add(&mut self, value: T) -> (usize, bool) {
        let hash = self.hash_key(K::key(&value));

        match self.find_with_hash(hash, K::key(&value)) {
            Some(index) => (index, false),
            None => (self.add_new(hash, value), true),
        }
    }

    /// Inserts `value`, replacing the element with an equal key if present.
    pub fn add_or_assign(&mut self, value: T) -> usize {
        let hash = self.hash_key(K::key(&value));

        match self.find_with_hash(hash, K::key(&value)) {
            Some(index) => {
                // SAFETY: find only returns live indices.
                unsafe { self.data.get_unchecked_mut(index).value = value };
                index
            }
            None => self.add_new(hash, value),
        }
    }

    pub fn try_add(&mut self, value: T) -> SparseResult<usize> {
        let hash = self.hash_key(K::key(&value));

        if let Some(index) = self.find_with_hash(hash, K::key(&value)) {
            return Err(SparseError::KeyExists(index));
        }

        if !self.data.can_add() {
            return Err(SparseError::CapacityExceeded {
                capacity: self.data.memory.max_capacity(),
            });
        }

        Ok(self.add_new(hash, value))
    }

    /// Removes and returns the element with a key equal to `key`.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<T>
    where
        K::Key: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let index = self.find(key)?;
        Some(self.remove_at(index))
    }
}

impl<T, M: HashMemory<HashNode<T>>, S: Default, K> Default for SparseHashSet<T, M, S, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, M: HashMemory<HashNode<T>>, S: Clone, K> Clone for SparseHashSet<T, M, S, K> {
    fn clone(&self) -> Self {
        let mut set = Self {
            data: self.data.clone(),
            hasher: self.hasher.clone(),
            _key: PhantomData,
        };

        // bucket heads are derived data: copy them only when the layout is identical
        if !set.data.memory.copy_bucket_from(&self.data.memory) {
            set.rehash();
        }

        set
    }
}

impl<T: fmt::Debug, M: HashMemory<HashNode<T>>, S, K> fmt::Debug for SparseHashSet<T, M, S, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T, M, S, K> PartialEq for SparseHashSet<T, M, S, K>
where
    T: PartialEq,
    M: HashMemory<HashNode<T>>,
    S: BuildHasher,
    K: KeyExtract<T>,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|value| other.get(K::key(value)).is_some_and(|found| found == value))
    }
}

impl<T, M, S, K> Eq for SparseHashSet<T, M, S, K>
where
    T: Eq,
    M: HashMemory<HashNode<T>>,
    S: BuildHasher,
    K: KeyExtract<T>,
{
}

impl<T, M, S, K> Extend<T> for SparseHashSet<T, M, S, K>
where
    M: HashMemory<HashNode<T>>,
    S: BuildHasher,
    K: KeyExtract<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<T, M, S, K> FromIterator<T> for SparseHashSet<T, M, S, K>
where
    M: HashMemory<HashNode<T>>,
    S: BuildHasher + Default,
    K: KeyExtract<T>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// Live elements in index order.
pub struct Iter<'a, T> {
    inner: sparse::Iter<'a, HashNode<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        self.inner.next().map(|(_, node)| &node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, node)| &node.value)
    }
}

impl<T> FusedIterator for Iter<'_, T> {}

/// Owning iterator in index order.
pub struct IntoIter<T, M: HashMemory<HashNode<T>>> {
    inner: sparse::IntoIter<HashNode<T>, M>,
}

impl<T, M: HashMemory<HashNode<T>>> Iterator for IntoIter<T, M> {
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.inner.next().map(|(_, node)| node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T, M: HashMemory<HashNode<T>>, S, K> IntoIterator for SparseHashSet<T, M, S, K> {
    type Item = T;
    type IntoIter = IntoIter<T, M>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            inner: self.data.into_iter(),
        }
    }
}

impl<'a, T, M: HashMemory<HashNode<T>>, S, K> IntoIterator for &'a SparseHashSet<T, M, S, K> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
