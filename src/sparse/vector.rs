use crate::{
    bit_array::{self, BitCursor},
    error::{SparseError, SparseResult},
    memory::{GrowableMemory, NPOS, Slot, SparseMemory},
};
use std::{fmt, marker::PhantomData, mem, ptr};

/// Array with stable indices and O(1) removal.
///
/// Removing an element leaves a hole that is threaded onto an intrusive free
/// list and handed out again by the next [`add`](SparseVector::add). Live
/// indices are tracked by an occupancy bit array, so
/// `len() == sparse_size() - hole_size()` always holds.
pub struct SparseVector<T, M: SparseMemory<T> = GrowableMemory<T>> {
    pub(crate) memory: M,
    sparse_size: usize,
    hole_size: usize,
    freelist_head: usize,
    _marker: PhantomData<T>,
}

impl<T, M: SparseMemory<T>> SparseVector<T, M> {
    pub fn new() -> Self {
        Self {
            memory: M::default(),
            sparse_size: 0,
            hole_size: 0,
            freelist_head: NPOS,
            _marker: PhantomData,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut vector = Self::new();
        vector.reserve(capacity);
        vector
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.sparse_size - self.hole_size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// High-water mark: one past the highest slot ever handed out.
    #[inline]
    pub fn sparse_size(&self) -> usize {
        self.sparse_size
    }

    /// Number of free slots below [`sparse_size`](SparseVector::sparse_size).
    #[inline]
    pub fn hole_size(&self) -> usize {
        self.hole_size
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.memory.capacity()
    }

    /// Index the next [`add`](SparseVector::add) reuses, or [`NPOS`].
    #[inline]
    pub fn freelist_head(&self) -> usize {
        self.freelist_head
    }

    #[inline]
    pub fn bits(&self) -> &[u64] {
        self.memory.bits()
    }

    /// Whether slot `index` holds a live element.
    #[inline]
    pub fn has_data(&self, index: usize) -> bool {
        index < self.sparse_size && bit_array::get(self.memory.bits(), index)
    }

    /// # Safety
    /// `index` must be below the sparse size.
    #[inline]
    pub(crate) unsafe fn slot(&self, index: usize) -> &Slot<T> {
        debug_assert!(index < self.sparse_size, "SparseVector: slot out of bounds");
        // SAFETY: caller guarantees index < sparse_size <= capacity.
        unsafe { &*self.memory.slots().add(index) }
    }

    /// # Safety
    /// `index` must be below the sparse size.
    #[inline]
    pub(crate) unsafe fn slot_mut(&mut self, index: usize) -> &mut Slot<T> {
        debug_assert!(index < self.sparse_size, "SparseVector: slot out of bounds");
        // SAFETY: caller guarantees index < sparse_size <= capacity.
        unsafe { &mut *self.memory.slots_mut().add(index) }
    }

    /// Element at `index` without checking occupancy.
    ///
    /// # Safety
    /// Slot `index` must be live.
    #[inline]
    pub unsafe fn get_unchecked(&self, index: usize) -> &T {
        debug_assert!(self.has_data(index), "SparseVector: no element at {index}");
        // SAFETY: caller guarantees the slot is live.
        unsafe { self.slot(index).data.assume_init_ref() }
    }

    /// # Safety
    /// Slot `index` must be live.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(self.has_data(index), "SparseVector: no element at {index}");
        // SAFETY: caller guarantees the slot is live.
        unsafe { self.slot_mut(index).data.assume_init_mut() }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        // SAFETY: checked live.
        self.has_data(index).then(|| unsafe { self.get_unchecked(index) })
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if self.has_data(index) {
            // SAFETY: checked live.
            Some(unsafe { self.get_unchecked_mut(index) })
        } else {
            None
        }
    }

    fn check(&self, index: usize) -> SparseResult<()> {
        if index >= self.sparse_size {
            return Err(SparseError::IndexOutOfBounds {
                index,
                sparse_size: self.sparse_size,
            });
        }

        if !bit_array::get(self.memory.bits(), index) {
            return Err(SparseError::NotLive(index));
        }

        Ok(())
    }

    pub fn try_get(&self, index: usize) -> SparseResult<&T> {
        self.check(index)?;
        // SAFETY: checked live.
        Ok(unsafe { self.get_unchecked(index) })
    }

    pub fn try_get_mut(&mut self, index: usize) -> SparseResult<&mut T> {
        self.check(index)?;
        // SAFETY: checked live.
        Ok(unsafe { self.get_unchecked_mut(index) })
    }

    /// Grows storage so `required` slots fit.
    fn reserve_for(&mut self, required: usize) {
        if required > self.memory.capacity() {
            let capacity = self.memory.grow_capacity(required);
            self.memory.realloc_storage(capacity, self.sparse_size);
        }
    }

    /// Ensures capacity for at least `capacity` slots in total.
    pub fn reserve(&mut self, capacity: usize) {
        if capacity > self.memory.capacity() {
            self.memory.realloc_storage(capacity, self.sparse_size);
        }
    }

    /// Whether the next [`add`](SparseVector::add) fits without growing past
    /// the strategy's limit.
    #[inline]
    pub fn can_add(&self) -> bool {
        self.hole_size > 0 || self.sparse_size < self.memory.max_capacity()
    }

    /// Claims a slot for a new element, reusing the most recently freed hole
    /// before growing. The slot's `next` is reset to [`NPOS`].
    fn claim_slot(&mut self) -> usize {
        let index = if self.hole_size > 0 {
            let index = self.freelist_head;
            // SAFETY: the free list only holds indices below sparse_size.
            self.freelist_head = unsafe { self.slot(index).next };
            self.hole_size -= 1;
            index
        } else {
            self.reserve_for(self.sparse_size + 1);
            self.sparse_size += 1;
            self.sparse_size - 1
        };

        // SAFETY: index < sparse_size <= capacity; written through a raw place
        // because a freshly appended slot is still uninitialized.
        unsafe { (*self.memory.slots_mut().add(index)).next = NPOS };
        index
    }

    /// Inserts `value` and returns its index.
    ///
    /// # Panics
    /// Panics if a fixed-capacity strategy is full.
    pub fn add(&mut self, value: T) -> usize {
        let index = self.claim_slot();

        // SAFETY: index < sparse_size and the slot is free.
        unsafe { self.slot_mut(index).data.write(value) };
        bit_array::set(self.memory.bits_mut(), index, true);

        index
    }

    pub fn try_add(&mut self, value: T) -> SparseResult<usize> {
        if !self.can_add() {
            return Err(SparseError::CapacityExceeded {
                capacity: self.memory.max_capacity(),
            });
        }

        Ok(self.add(value))
    }

    /// Returns slot `index` to the free list without touching its payload.
    ///
    /// # Safety
    /// Slot `index` must be live and its payload already moved out or dropped.
    pub(crate) unsafe fn free_slot(&mut self, index: usize) {
        bit_array::set(self.memory.bits_mut(), index, false);

        let head = self.freelist_head;
        // SAFETY: caller guarantees index < sparse_size.
        unsafe { self.slot_mut(index).next = head };
        self.freelist_head = index;
        self.hole_size += 1;
    }

    /// Removes and returns the element at `index`. Other indices stay valid.
    ///
    /// # Panics
    /// Panics if slot `index` is not live.
    pub fn remove_at(&mut self, index: usize) -> T {
        assert!(self.has_data(index), "SparseVector: no element at {index}");

        // SAFETY: checked live.
        unsafe { self.remove_at_unchecked(index) }
    }

    /// # Safety
    /// Slot `index` must be live.
    pub unsafe fn remove_at_unchecked(&mut self, index: usize) -> T {
        debug_assert!(self.has_data(index), "SparseVector: no element at {index}");

        // SAFETY: caller guarantees the slot is live, it is freed right after.
        unsafe {
            let value = self.slot(index).data.assume_init_read();
            self.free_slot(index);
            value
        }
    }

    pub fn try_remove_at(&mut self, index: usize) -> SparseResult<T> {
        self.check(index)?;
        // SAFETY: checked live.
        Ok(unsafe { self.remove_at_unchecked(index) })
    }

    /// Keeps only the elements for which `f` returns `true`.
    pub fn retain(&mut self, mut f: impl FnMut(usize, &mut T) -> bool) {
        let mut cursor = self.cursor_begin_mut();

        while cursor.is_valid() {
            let index = cursor.index();

            if f(index, cursor.get_mut()) {
                cursor.move_next();
            } else {
                cursor.erase_and_move_next();
            }
        }
    }

    fn drop_live(&mut self) {
        if !mem::needs_drop::<T>() {
            return;
        }

        let mut next = bit_array::find_next(self.memory.bits(), 0, self.sparse_size);

        while let Some(index) = next {
            // SAFETY: bit set means the slot is live, counters are reset by the caller.
            unsafe { ptr::drop_in_place(self.slot_mut(index).data.as_mut_ptr()) };
            next = bit_array::find_next(self.memory.bits(), index + 1, self.sparse_size);
        }
    }

    /// Drops every element and resets the counters, keeping capacity.
    pub fn clear(&mut self) {
        let sparse_size = self.sparse_size;
        self.drop_live();

        let words = bit_array::bit_words(sparse_size);
        bit_array::set_all(&mut self.memory.bits_mut()[..words], false);

        self.sparse_size = 0;
        self.hole_size = 0;
        self.freelist_head = NPOS;
    }

    /// Drops every element and gives back all storage.
    pub fn release(&mut self) {
        self.clear();
        self.memory.free_storage();
    }

    /// Rethreads the free list over every hole below the sparse size, lowest
    /// index first.
    fn rebuild_freelist(&mut self) {
        self.freelist_head = NPOS;
        self.hole_size = 0;

        for index in (0..self.sparse_size).rev() {
            if !bit_array::get(self.memory.bits(), index) {
                let head = self.freelist_head;
                // SAFETY: index < sparse_size.
                unsafe { self.slot_mut(index).next = head };
                self.freelist_head = index;
                self.hole_size += 1;
            }
        }
    }

    /// Cuts trailing holes and shrinks capacity to the sparse size.
    pub fn shrink(&mut self) {
        let bits = self.memory.bits();
        let sparse_size = match self.sparse_size {
            0 => 0,
            size => bit_array::find_prev(bits, size - 1).map_or(0, |last| last + 1),
        };

        if sparse_size != self.sparse_size {
            self.sparse_size = sparse_size;
            self.rebuild_freelist();
        }

        if self.memory.capacity() > sparse_size {
            self.memory.realloc_storage(sparse_size, sparse_size);
        }
    }

    /// Moves trailing elements into holes until none remain.
    ///
    /// Invalidates the indices of moved elements. Returns `true` if anything moved.
    pub fn compact(&mut self) -> bool {
        if self.hole_size == 0 {
            return false;
        }

        let live = self.len();
        let mut moved = 0;
        let mut hole = 0;
        let mut tail = self.sparse_size;

        loop {
            let bits = self.memory.bits();
            let Some(free) = bit_array::find_next_unset(bits, hole, live) else {
                break;
            };
            // a hole below `live` guarantees a live element above it
            let Some(last) = bit_array::find_prev(bits, tail - 1) else {
                break;
            };

            // SAFETY: free < live <= last < sparse_size, distinct slots.
            unsafe {
                let slots = self.memory.slots_mut();
                ptr::copy_nonoverlapping(&raw const (*slots.add(last)).data, &raw mut (*slots.add(free)).data, 1);
            }

            let bits = self.memory.bits_mut();
            bit_array::set(bits, free, true);
            bit_array::set(bits, last, false);

            moved += 1;
            hole = free + 1;
            tail = last;
        }

        log::debug!(
            "sparse compact: moved {moved}, sparse size {} -> {live}",
            self.sparse_size
        );

        self.sparse_size = live;
        self.hole_size = 0;
        self.freelist_head = NPOS;

        moved > 0
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            bits: BitCursor::new(self.memory.bits(), self.sparse_size),
            slots: self.memory.slots(),
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        let slots = self.memory.slots_mut();
        IterMut {
            bits: BitCursor::new(self.memory.bits(), self.sparse_size),
            slots,
            _marker: PhantomData,
        }
    }
}

impl<T, M: SparseMemory<T>> Default for SparseVector<T, M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, M: SparseMemory<T>> Drop for SparseVector<T, M> {
    fn drop(&mut self) {
        self.drop_live();
    }
}

impl<T: Clone, M: SparseMemory<T>> Clone for SparseVector<T, M> {
    fn clone(&self) -> Self {
        let mut out = Self::new();
        out.reserve(self.sparse_size);

        for index in 0..self.sparse_size {
            // SAFETY: index < sparse_size of both; `out` counters stay zero until
            // every slot is written, so a panicking clone only leaks.
            unsafe {
                let src = self.slot(index);
                let dst = out.memory.slots_mut().add(index);
                (*dst).next = src.next;

                if bit_array::get(self.memory.bits(), index) {
                    (*dst).data.write(src.data.assume_init_ref().clone());
                    bit_array::set(out.memory.bits_mut(), index, true);
                }
            }
        }

        out.sparse_size = self.sparse_size;
        out.hole_size = self.hole_size;
        out.freelist_head = self.freelist_head;
        out
    }
}

impl<T: fmt::Debug, M: SparseMemory<T>> fmt::Debug for SparseVector<T, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T, M: SparseMemory<T>> Extend<T> for SparseVector<T, M> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        let (lower, _) = iter.size_hint();
        self.reserve_for(self.sparse_size + lower.saturating_sub(self.hole_size));

        for value in iter {
            self.add(value);
        }
    }
}

impl<T, M: SparseMemory<T>> FromIterator<T> for SparseVector<T, M> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vector = Self::new();
        vector.extend(iter);
        vector
    }
}

/// Live `(index, &T)` pairs in index order.
pub struct Iter<'a, T> {
    bits: BitCursor<'a>,
    slots: *const Slot<T>,
    _marker: PhantomData<&'a T>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (usize, &'a T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let index = self.bits.next()?;
        // SAFETY: the bit is set, so the slot is live for 'a.
        Some((index, unsafe { (*self.slots.add(index)).data.assume_init_ref() }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.bits.size_hint()
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        let index = self.bits.next_back()?;
        // SAFETY: the bit is set, so the slot is live for 'a.
        Some((index, unsafe { (*self.slots.add(index)).data.assume_init_ref() }))
    }
}

/// Live `(index, &mut T)` pairs in index order.
pub struct IterMut<'a, T> {
    bits: BitCursor<'a>,
    slots: *mut Slot<T>,
    _marker: PhantomData<&'a mut T>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = (usize, &'a mut T);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let index = self.bits.next()?;
        // SAFETY: the bit is set and each index is yielded once.
        Some((index, unsafe { (*self.slots.add(index)).data.assume_init_mut() }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.bits.size_hint()
    }
}

impl<T> DoubleEndedIterator for IterMut<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        let index = self.bits.next_back()?;
        // SAFETY: the bit is set and each index is yielded once.
        Some((index, unsafe { (*self.slots.add(index)).data.assume_init_mut() }))
    }
}

/// Owning iterator over live `(index, T)` pairs.
pub struct IntoIter<T, M: SparseMemory<T>> {
    vector: SparseVector<T, M>,
    next: usize,
}

impl<T, M: SparseMemory<T>> Iterator for IntoIter<T, M> {
    type Item = (usize, T);

    fn next(&mut self) -> Option<Self::Item> {
        let index = bit_array::find_next(self.vector.bits(), self.next, self.vector.sparse_size)?;
        self.next = index + 1;
        // SAFETY: the bit is set.
        Some((index, unsafe { self.vector.remove_at_unchecked(index) }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.vector.len(), Some(self.vector.len()))
    }
}

impl<T, M: SparseMemory<T>> IntoIterator for SparseVector<T, M> {
    type Item = (usize, T);
    type IntoIter = IntoIter<T, M>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            vector: self,
            next: 0,
        }
    }
}

impl<'a, T, M: SparseMemory<T>> IntoIterator for &'a SparseVector<T, M> {
    type Item = (usize, &'a T);
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, M: SparseMemory<T>> IntoIterator for &'a mut SparseVector<T, M> {
    type Item = (usize, &'a mut T);
    type IntoIter = IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}
