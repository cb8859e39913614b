//! Positional cursors over a sparse vector.
//!
//! A cursor is `(container, index)` moving between three states: at a live
//! slot, at end (`index == sparse_size`) or at rend (`index == NPOS`).
//! The overflow constructors park a cursor on end/rend so that the first
//! `move_prev`/`move_next` steps onto the last/first element.

use super::SparseVector;
use crate::{
    bit_array,
    memory::{NPOS, SparseMemory},
};

/// Index state shared by every cursor flavour. Knows nothing about payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BitPosition {
    index: usize,
}

impl BitPosition {
    #[inline]
    pub(crate) const fn at(index: usize) -> Self {
        Self { index }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.index
    }

    /// First live slot, or end.
    #[inline]
    pub(crate) fn begin(bits: &[u64], sparse_size: usize) -> Self {
        Self::at(bit_array::find_next(bits, 0, sparse_size).unwrap_or(sparse_size))
    }

    /// Last live slot, or rend.
    #[inline]
    pub(crate) fn end(bits: &[u64], sparse_size: usize) -> Self {
        let index = match sparse_size {
            0 => NPOS,
            size => bit_array::find_prev(bits, size - 1).unwrap_or(NPOS),
        };
        Self::at(index)
    }

    #[inline]
    pub(crate) fn reach_end(self, sparse_size: usize) -> bool {
        self.index == sparse_size
    }

    #[inline]
    pub(crate) fn reach_begin(self) -> bool {
        self.index == NPOS
    }

    #[inline]
    pub(crate) fn is_valid(self, sparse_size: usize) -> bool {
        !self.reach_begin() && !self.reach_end(sparse_size)
    }

    #[inline]
    pub(crate) fn move_next(&mut self, bits: &[u64], sparse_size: usize) {
        debug_assert!(!self.reach_end(sparse_size), "cursor: move_next past end");

        let start = if self.reach_begin() { 0 } else { self.index + 1 };
        self.index = bit_array::find_next(bits, start, sparse_size).unwrap_or(sparse_size);
    }

    #[inline]
    pub(crate) fn move_prev(&mut self, bits: &[u64], sparse_size: usize) {
        debug_assert!(!self.reach_begin(), "cursor: move_prev past rend");

        let start = self.index.min(sparse_size);
        self.index = match start.checked_sub(1) {
            Some(start) => bit_array::find_prev(bits, start).unwrap_or(NPOS),
            None => NPOS,
        };
    }
}

/// Generates the positional half of a cursor over `self.vector`.
macro_rules! impl_cursor_position {
    () => {
        #[inline]
        pub fn index(&self) -> usize {
            self.position.index()
        }

        #[inline]
        pub fn reach_end(&self) -> bool {
            self.position.reach_end(self.vector.sparse_size())
        }

        #[inline]
        pub fn reach_begin(&self) -> bool {
            self.position.reach_begin()
        }

        #[inline]
        pub fn is_valid(&self) -> bool {
            self.position.is_valid(self.vector.sparse_size())
        }

        #[inline]
        pub fn reset_to_begin(&mut self) {
            self.position = BitPosition::begin(self.vector.bits(), self.vector.sparse_size());
        }

        #[inline]
        pub fn reset_to_end(&mut self) {
            self.position = BitPosition::end(self.vector.bits(), self.vector.sparse_size());
        }

        /// Steps to the next live slot, or to end.
        #[inline]
        pub fn move_next(&mut self) {
            self.position
                .move_next(self.vector.bits(), self.vector.sparse_size());
        }

        /// Steps to the previous live slot, or to rend.
        #[inline]
        pub fn move_prev(&mut self) {
            self.position
                .move_prev(self.vector.bits(), self.vector.sparse_size());
        }

        /// # Panics
        /// Panics if the cursor sits at end or rend.
        #[inline]
        pub fn get(&self) -> &T {
            assert!(self.is_valid(), "cursor: dereferencing invalid cursor");
            // SAFETY: checked valid.
            unsafe { self.get_unchecked() }
        }

        /// # Safety
        /// The cursor must be valid.
        #[inline]
        pub unsafe fn get_unchecked(&self) -> &T {
            debug_assert!(self.is_valid(), "cursor: dereferencing invalid cursor");
            // SAFETY: a valid cursor always sits on a live slot.
            unsafe { self.vector.get_unchecked(self.position.index()) }
        }

        #[inline]
        pub fn as_ptr(&self) -> *const T {
            self.get()
        }
    };
}

/// Read-only cursor.
pub struct SparseCursor<'a, T, M: SparseMemory<T>> {
    vector: &'a SparseVector<T, M>,
    position: BitPosition,
}

impl<'a, T, M: SparseMemory<T>> SparseCursor<'a, T, M> {
    #[inline]
    fn new(vector: &'a SparseVector<T, M>, position: BitPosition) -> Self {
        Self { vector, position }
    }

    pub fn begin(vector: &'a SparseVector<T, M>) -> Self {
        Self::new(vector, BitPosition::begin(vector.bits(), vector.sparse_size()))
    }

    pub fn end(vector: &'a SparseVector<T, M>) -> Self {
        Self::new(vector, BitPosition::end(vector.bits(), vector.sparse_size()))
    }

    pub fn begin_overflow(vector: &'a SparseVector<T, M>) -> Self {
        Self::new(vector, BitPosition::at(NPOS))
    }

    pub fn end_overflow(vector: &'a SparseVector<T, M>) -> Self {
        Self::new(vector, BitPosition::at(vector.sparse_size()))
    }

    impl_cursor_position!();

    /// Element under the cursor, for the container's full lifetime.
    #[inline]
    pub fn get_ref(&self) -> &'a T {
        assert!(self.is_valid(), "cursor: dereferencing invalid cursor");
        // SAFETY: a valid cursor always sits on a live slot.
        unsafe { self.vector.get_unchecked(self.position.index()) }
    }
}

impl<T, M: SparseMemory<T>> Clone for SparseCursor<'_, T, M> {
    fn clone(&self) -> Self {
        Self::new(self.vector, self.position)
    }
}

/// Cursor that can mutate and erase under itself.
pub struct SparseCursorMut<'a, T, M: SparseMemory<T>> {
    vector: &'a mut SparseVector<T, M>,
    position: BitPosition,
}

impl<'a, T, M: SparseMemory<T>> SparseCursorMut<'a, T, M> {
    #[inline]
    fn new(vector: &'a mut SparseVector<T, M>, position: BitPosition) -> Self {
        Self { vector, position }
    }

    pub fn begin(vector: &'a mut SparseVector<T, M>) -> Self {
        let position = BitPosition::begin(vector.bits(), vector.sparse_size());
        Self::new(vector, position)
    }

    pub fn end(vector: &'a mut SparseVector<T, M>) -> Self {
        let position = BitPosition::end(vector.bits(), vector.sparse_size());
        Self::new(vector, position)
    }

    pub fn begin_overflow(vector: &'a mut SparseVector<T, M>) -> Self {
        Self::new(vector, BitPosition::at(NPOS))
    }

    pub fn end_overflow(vector: &'a mut SparseVector<T, M>) -> Self {
        let position = BitPosition::at(vector.sparse_size());
        Self::new(vector, position)
    }

    impl_cursor_position!();

    /// # Panics
    /// Panics if the cursor sits at end or rend.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        assert!(self.is_valid(), "cursor: dereferencing invalid cursor");
        // SAFETY: checked valid.
        unsafe { self.get_unchecked_mut() }
    }

    /// # Safety
    /// The cursor must be valid.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self) -> &mut T {
        debug_assert!(self.is_valid(), "cursor: dereferencing invalid cursor");
        // SAFETY: a valid cursor always sits on a live slot.
        unsafe { self.vector.get_unchecked_mut(self.position.index()) }
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.get_mut()
    }

    #[inline]
    pub(crate) fn vector_mut(&mut self) -> &mut SparseVector<T, M> {
        self.vector
    }

    /// Frees the current slot and steps to the next live one, or to end.
    ///
    /// The cleared occupancy bit makes the scan skip the erased slot.
    ///
    /// # Panics
    /// Panics if the cursor sits at end or rend.
    pub fn erase_and_move_next(&mut self) -> T {
        assert!(self.is_valid(), "cursor: erasing through invalid cursor");
        // SAFETY: checked valid.
        unsafe { self.erase_and_move_next_unchecked() }
    }

    /// # Safety
    /// The cursor must be valid.
    pub unsafe fn erase_and_move_next_unchecked(&mut self) -> T {
        debug_assert!(self.is_valid(), "cursor: erasing through invalid cursor");

        // SAFETY: a valid cursor always sits on a live slot.
        let value = unsafe { self.vector.remove_at_unchecked(self.position.index()) };
        self.move_next();
        value
    }

    /// Frees the current slot and steps to the previous live one, or to rend.
    ///
    /// # Panics
    /// Panics if the cursor sits at end or rend.
    pub fn erase_and_move_prev(&mut self) -> T {
        assert!(self.is_valid(), "cursor: erasing through invalid cursor");
        // SAFETY: checked valid.
        unsafe { self.erase_and_move_prev_unchecked() }
    }

    /// # Safety
    /// The cursor must be valid.
    pub unsafe fn erase_and_move_prev_unchecked(&mut self) -> T {
        debug_assert!(self.is_valid(), "cursor: erasing through invalid cursor");

        // SAFETY: a valid cursor always sits on a live slot.
        let value = unsafe { self.vector.remove_at_unchecked(self.position.index()) };
        self.move_prev();
        value
    }
}

impl<T, M: SparseMemory<T>> SparseVector<T, M> {
    #[inline]
    pub fn cursor_begin(&self) -> SparseCursor<'_, T, M> {
        SparseCursor::begin(self)
    }

    #[inline]
    pub fn cursor_end(&self) -> SparseCursor<'_, T, M> {
        SparseCursor::end(self)
    }

    #[inline]
    pub fn cursor_begin_overflow(&self) -> SparseCursor<'_, T, M> {
        SparseCursor::begin_overflow(self)
    }

    #[inline]
    pub fn cursor_end_overflow(&self) -> SparseCursor<'_, T, M> {
        SparseCursor::end_overflow(self)
    }

    #[inline]
    pub fn cursor_begin_mut(&mut self) -> SparseCursorMut<'_, T, M> {
        SparseCursorMut::begin(self)
    }

    #[inline]
    pub fn cursor_end_mut(&mut self) -> SparseCursorMut<'_, T, M> {
        SparseCursorMut::end(self)
    }

    #[inline]
    pub fn cursor_begin_overflow_mut(&mut self) -> SparseCursorMut<'_, T, M> {
        SparseCursorMut::begin_overflow(self)
    }

    #[inline]
    pub fn cursor_end_overflow_mut(&mut self) -> SparseCursorMut<'_, T, M> {
        SparseCursorMut::end_overflow(self)
    }
}
