use super::{HashMemory, NPOS, Slot, SparseMemory, calc_bucket_size, delegate_sparse_memory};
use crate::bit_array::bit_words;
use std::mem::MaybeUninit;

/// Inline slot storage for exactly `N` slots. Never allocates, never grows.
///
/// `W` must equal `bit_words(N)`; the [`fixed_vector!`](crate::fixed_vector)
/// family of macros fills it in.
pub struct FixedMemory<T, const N: usize, const W: usize> {
    slots: [MaybeUninit<Slot<T>>; N],
    bits: [u64; W],
}

impl<T, const N: usize, const W: usize> Default for FixedMemory<T, N, W> {
    fn default() -> Self {
        const { assert!(W == bit_words(N), "FixedMemory: W must be bit_words(N)") };

        Self {
            slots: [const { MaybeUninit::uninit() }; N],
            bits: [0; W],
        }
    }
}

impl<T, const N: usize, const W: usize> SparseMemory<T> for FixedMemory<T, N, W> {
    #[inline]
    fn capacity(&self) -> usize {
        N
    }

    #[inline]
    fn max_capacity(&self) -> usize {
        N
    }

    #[inline]
    fn grow_capacity(&self, required: usize) -> usize {
        required
    }

    #[inline]
    fn slots(&self) -> *const Slot<T> {
        self.slots.as_ptr().cast()
    }

    #[inline]
    fn slots_mut(&mut self) -> *mut Slot<T> {
        self.slots.as_mut_ptr().cast()
    }

    #[inline]
    fn bits(&self) -> &[u64] {
        &self.bits
    }

    #[inline]
    fn bits_mut(&mut self) -> &mut [u64] {
        &mut self.bits
    }

    fn realloc_storage(&mut self, capacity: usize, _keep: usize) {
        assert!(
            capacity <= N,
            "fixed storage holds {N} slots, {capacity} requested"
        );
    }

    fn free_storage(&mut self) {}
}

/// [`FixedMemory`] plus an inline bucket array of `B` heads.
///
/// `B` must equal `calc_bucket_size(N)`.
pub struct FixedHashMemory<T, const N: usize, const W: usize, const B: usize> {
    base: FixedMemory<T, N, W>,
    bucket: [usize; B],
}

impl<T, const N: usize, const W: usize, const B: usize> Default for FixedHashMemory<T, N, W, B> {
    fn default() -> Self {
        const { assert!(B == calc_bucket_size(N), "FixedHashMemory: B must be calc_bucket_size(N)") };

        Self {
            base: FixedMemory::default(),
            bucket: [NPOS; B],
        }
    }
}

impl<T, const N: usize, const W: usize, const B: usize> SparseMemory<T>
    for FixedHashMemory<T, N, W, B>
{
    delegate_sparse_memory!(base);
}

impl<T, const N: usize, const W: usize, const B: usize> HashMemory<T>
    for FixedHashMemory<T, N, W, B>
{
    #[inline]
    fn bucket(&self) -> &[usize] {
        &self.bucket
    }

    #[inline]
    fn bucket_mut(&mut self) -> &mut [usize] {
        &mut self.bucket
    }

    #[inline]
    fn resize_bucket(&mut self) -> bool {
        false
    }

    #[inline]
    fn free_bucket(&mut self) {}

    fn copy_bucket_from(&mut self, src: &Self) -> bool {
        self.bucket = src.bucket;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Memory = FixedHashMemory<u8, 8, { bit_words(8) }, { calc_bucket_size(8) }>;

    #[test]
    fn layout_is_fixed() {
        let mut memory = Memory::default();
        assert_eq!(memory.capacity(), 8);
        assert_eq!(memory.bucket_size(), 16);
        assert_eq!(memory.bucket_mask(), 15);

        memory.realloc_storage(4, 0);
        assert!(!memory.resize_bucket());
        assert_eq!(memory.capacity(), 8);

        memory.bucket_mut()[3] = 5;
        let mut copy = Memory::default();
        assert!(copy.copy_bucket_from(&memory));
        assert_eq!(copy.bucket()[3], 5);
    }

    #[test]
    #[should_panic(expected = "fixed storage holds 8 slots")]
    fn growing_past_capacity_is_fatal() {
        let mut memory = Memory::default();
        memory.realloc_storage(9, 8);
    }
}
