use super::{HashNode, HashType, KeyExtract};
use crate::{
    hash,
    memory::HashMemory,
    sparse::{SparseCursor, SparseCursorMut},
};
use std::marker::PhantomData;

/// Forwards the positional surface to `self.inner` unchanged.
macro_rules! forward_cursor_position {
    () => {
        #[inline]
        pub fn index(&self) -> usize {
            self.inner.index()
        }

        #[inline]
        pub fn reach_end(&self) -> bool {
            self.inner.reach_end()
        }

        #[inline]
        pub fn reach_begin(&self) -> bool {
            self.inner.reach_begin()
        }

        #[inline]
        pub fn is_valid(&self) -> bool {
            self.inner.is_valid()
        }

        #[inline]
        pub fn reset_to_begin(&mut self) {
            self.inner.reset_to_begin()
        }

        #[inline]
        pub fn reset_to_end(&mut self) {
            self.inner.reset_to_end()
        }

        #[inline]
        pub fn move_next(&mut self) {
            self.inner.move_next()
        }

        #[inline]
        pub fn move_prev(&mut self) {
            self.inner.move_prev()
        }

        /// # Panics
        /// Panics if the cursor sits at end or rend.
        #[inline]
        pub fn value(&self) -> &T {
            &self.inner.get().value
        }

        /// # Safety
        /// The cursor must be valid.
        #[inline]
        pub unsafe fn value_unchecked(&self) -> &T {
            // SAFETY: forwarded from caller.
            unsafe { &self.inner.get_unchecked().value }
        }

        #[inline]
        pub fn as_ptr(&self) -> *const T {
            self.value()
        }

        /// Hash cached when the element was inserted.
        #[inline]
        pub fn hash(&self) -> HashType {
            self.inner.get().hash
        }
    };
}

/// Read-only cursor over a hash set: positional moves plus key/value/hash access.
pub struct HashCursor<'a, T, M: HashMemory<HashNode<T>>, K> {
    inner: SparseCursor<'a, HashNode<T>, M>,
    _key: PhantomData<fn() -> K>,
}

impl<'a, T, M: HashMemory<HashNode<T>>, K> HashCursor<'a, T, M, K> {
    #[inline]
    pub(crate) fn new(inner: SparseCursor<'a, HashNode<T>, M>) -> Self {
        Self {
            inner,
            _key: PhantomData,
        }
    }

    forward_cursor_position!();

    /// Element under the cursor, for the container's full lifetime.
    #[inline]
    pub fn get_ref(&self) -> &'a T {
        &self.inner.get_ref().value
    }
}

impl<'a, T, M: HashMemory<HashNode<T>>, K: KeyExtract<T>> HashCursor<'a, T, M, K> {
    #[inline]
    pub fn key(&self) -> &K::Key {
        K::key(self.value())
    }
}

impl<T, M: HashMemory<HashNode<T>>, K> Clone for HashCursor<'_, T, M, K> {
    fn clone(&self) -> Self {
        Self::new(self.inner.clone())
    }
}

/// Mutable cursor over a hash set. Erasing unlinks the element from its chain
/// before the slot goes back to the free list.
pub struct HashCursorMut<'a, T, M: HashMemory<HashNode<T>>, K> {
    inner: SparseCursorMut<'a, HashNode<T>, M>,
    _key: PhantomData<fn() -> K>,
}

impl<'a, T, M: HashMemory<HashNode<T>>, K> HashCursorMut<'a, T, M, K> {
    #[inline]
    pub(crate) fn new(inner: SparseCursorMut<'a, HashNode<T>, M>) -> Self {
        Self {
            inner,
            _key: PhantomData,
        }
    }

    forward_cursor_position!();

    /// Mutable access to the element. Its key must stay unchanged, the cached
    /// hash is not recomputed.
    #[inline]
    pub fn value_mut(&mut self) -> &mut T {
        &mut self.inner.get_mut().value
    }

    /// # Panics
    /// Panics if the cursor sits at end or rend.
    pub fn erase_and_move_next(&mut self) -> T {
        assert!(self.is_valid(), "cursor: erasing through invalid cursor");
        let index = self.index();
        hash::unlink(self.inner.vector_mut(), index);
        // SAFETY: checked valid, unlinking leaves the slot live.
        unsafe { self.inner.erase_and_move_next_unchecked().value }
    }

    /// # Panics
    /// Panics if the cursor sits at end or rend.
    pub fn erase_and_move_prev(&mut self) -> T {
        assert!(self.is_valid(), "cursor: erasing through invalid cursor");
        let index = self.index();
        hash::unlink(self.inner.vector_mut(), index);
        // SAFETY: checked valid, unlinking leaves the slot live.
        unsafe { self.inner.erase_and_move_prev_unchecked().value }
    }
}

impl<'a, T, M: HashMemory<HashNode<T>>, K: KeyExtract<T>> HashCursorMut<'a, T, M, K> {
    #[inline]
    pub fn key(&self) -> &K::Key {
        K::key(self.value())
    }
}
