use super::{
    HashMemory, NPOS, Slot, SparseMemory, allocator::RawBuffer, calc_bucket_size,
    delegate_sparse_memory,
};
use crate::{
    bit_array::bit_words,
    memory::{Allocator, DefaultAllocator},
};

/// Heap slot storage that grows on demand.
pub struct GrowableMemory<T, A: Allocator = DefaultAllocator> {
    slots: RawBuffer<Slot<T>, A>,
    bits: RawBuffer<u64, A>,
}

impl<T, A: Allocator> Default for GrowableMemory<T, A> {
    fn default() -> Self {
        Self {
            slots: RawBuffer::new(),
            bits: RawBuffer::new(),
        }
    }
}

impl<T, A: Allocator> SparseMemory<T> for GrowableMemory<T, A> {
    #[inline]
    fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    #[inline]
    fn slots(&self) -> *const Slot<T> {
        self.slots.as_ptr()
    }

    #[inline]
    fn slots_mut(&mut self) -> *mut Slot<T> {
        self.slots.as_mut_ptr()
    }

    #[inline]
    fn bits(&self) -> &[u64] {
        // SAFETY: every word is zeroed when allocated.
        unsafe { self.bits.as_slice() }
    }

    #[inline]
    fn bits_mut(&mut self) -> &mut [u64] {
        // SAFETY: every word is zeroed when allocated.
        unsafe { self.bits.as_mut_slice() }
    }

    fn realloc_storage(&mut self, capacity: usize, keep: usize) {
        debug_assert!(keep <= capacity && keep <= self.capacity());

        let old_words = self.bits.capacity();
        self.slots.resize(capacity);
        self.bits.resize(bit_words(capacity));
        self.bits.fill_from(old_words, 0);
    }

    fn free_storage(&mut self) {
        self.slots.free();
        self.bits.free();
    }
}

/// [`GrowableMemory`] plus a heap bucket array sized from the current capacity.
pub struct GrowableHashMemory<T, A: Allocator = DefaultAllocator> {
    base: GrowableMemory<T, A>,
    bucket: RawBuffer<usize, A>,
}

impl<T, A: Allocator> Default for GrowableHashMemory<T, A> {
    fn default() -> Self {
        Self {
            base: GrowableMemory::default(),
            bucket: RawBuffer::new(),
        }
    }
}

impl<T, A: Allocator> SparseMemory<T> for GrowableHashMemory<T, A> {
    delegate_sparse_memory!(base);
}

impl<T, A: Allocator> HashMemory<T> for GrowableHashMemory<T, A> {
    #[inline]
    fn bucket(&self) -> &[usize] {
        // SAFETY: new bucket entries are initialized when the bucket grows.
        unsafe { self.bucket.as_slice() }
    }

    #[inline]
    fn bucket_mut(&mut self) -> &mut [usize] {
        // SAFETY: new bucket entries are initialized when the bucket grows.
        unsafe { self.bucket.as_mut_slice() }
    }

    fn resize_bucket(&mut self) -> bool {
        let size = calc_bucket_size(self.base.capacity());

        if size == self.bucket.capacity() {
            return false;
        }

        let old = self.bucket.capacity();
        log::trace!("growable bucket resize: {old} -> {size}");

        self.bucket.resize(size);
        self.bucket.fill_from(old, NPOS);
        true
    }

    fn free_bucket(&mut self) {
        self.bucket.free();
    }

    fn copy_bucket_from(&mut self, _src: &Self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::CopyAllocator;

    fn grows_and_frees<A: Allocator>() {
        let mut memory = GrowableHashMemory::<u32, A>::default();
        assert_eq!(memory.capacity(), 0);
        assert!(!memory.resize_bucket());
        assert_eq!(memory.bucket_size(), 0);

        memory.realloc_storage(3, 0);
        assert!(memory.resize_bucket());
        assert_eq!(memory.bucket_size(), 1);
        assert_eq!(memory.bucket_mask(), 0);

        memory.bits_mut()[0] = 0b101;
        memory.realloc_storage(100, 3);
        assert_eq!(memory.bits(), &[0b101, 0]);
        assert!(memory.resize_bucket());
        assert_eq!(memory.bucket_size(), 64);
        assert_eq!(memory.bucket_mask(), 63);
        assert!(memory.bucket().iter().all(|&head| head == NPOS));

        memory.realloc_storage(101, 3);
        assert!(!memory.resize_bucket());

        memory.free_bucket();
        memory.free_bucket();
        assert_eq!(memory.bucket_size(), 0);

        memory.free_storage();
        assert_eq!(memory.capacity(), 0);
        assert!(memory.bits().is_empty());
    }

    #[test]
    fn realloc_allocator() {
        grows_and_frees::<DefaultAllocator>();
    }

    #[test]
    fn copy_allocator() {
        grows_and_frees::<CopyAllocator>();
    }
}
