//! Storage strategies shared by sparse vectors and sparse hash sets.
//!
//! A strategy owns raw memory only: the slot array, the occupancy words and,
//! for the hash variants, the bucket array. Which slots are live is decided by
//! the container on top; strategies never drop elements.
//!
//! - [`GrowableMemory`] / [`GrowableHashMemory`]: heap storage from an [`Allocator`].
//! - [`FixedMemory`] / [`FixedHashMemory`]: inline storage, capacity fixed at compile time.
//! - [`InlineMemory`] / [`InlineHashMemory`]: inline storage that spills to the heap.

use std::mem::MaybeUninit;

pub mod allocator;
mod fixed;
mod growable;
mod inline;

pub use allocator::{Allocator, CopyAllocator, DefaultAllocator};
pub use fixed::{FixedHashMemory, FixedMemory};
pub use growable::{GrowableHashMemory, GrowableMemory};
pub use inline::{InlineHashMemory, InlineMemory};

/// "No such index". Terminates free lists and bucket chains.
pub const NPOS: usize = usize::MAX;

/// Below this capacity all elements share one bucket.
pub const MIN_HASHED_CAPACITY: usize = 4;

/// Bucket count for `capacity` slots.
///
/// Aims for chains of two elements on average with a floor of 8 buckets.
/// Always zero, one or a power of two so lookups can mask instead of divide.
pub const fn calc_bucket_size(capacity: usize) -> usize {
    match capacity {
        0 => 0,
        c if c < MIN_HASHED_CAPACITY => 1,
        c => (c / 2 + 8).next_power_of_two(),
    }
}

/// One element of the slot array.
///
/// A slot is either live (occupancy bit set, `data` initialized, `next` chains
/// it within its bucket) or free (bit clear, `next` links the free list).
pub struct Slot<T> {
    pub(crate) next: usize,
    pub(crate) data: MaybeUninit<T>,
}

/// Raw slot + occupancy storage.
///
/// Every slot below the container's sparse size has an initialized `next`;
/// slots at or above it are never read. Occupancy words past the sparse size
/// are kept clear.
pub trait SparseMemory<T>: Default {
    fn capacity(&self) -> usize;

    /// Largest capacity this strategy can ever reach.
    fn max_capacity(&self) -> usize {
        usize::MAX
    }

    /// Capacity to grow to when `required` slots are needed.
    fn grow_capacity(&self, required: usize) -> usize {
        let capacity = self.capacity();
        required.max(capacity + capacity / 2)
    }

    fn slots(&self) -> *const Slot<T>;

    fn slots_mut(&mut self) -> *mut Slot<T>;

    /// Occupancy words, `bit_words(capacity)` long at least.
    fn bits(&self) -> &[u64];

    fn bits_mut(&mut self) -> &mut [u64];

    /// Changes capacity to `capacity` slots, keeping the first `keep` slots and
    /// all occupancy bits that still fit. New occupancy words are zeroed.
    ///
    /// `keep` never exceeds the new or the old capacity.
    fn realloc_storage(&mut self, capacity: usize, keep: usize);

    /// Drops back to the strategy's empty footprint.
    fn free_storage(&mut self);
}

/// Bucket array layered over slot storage.
///
/// Bucket `i` holds the head of the chain of slots whose hash masks to `i`,
/// or [`NPOS`]. Chain contents are unspecified after any call that changes the
/// bucket size until the owner cleans and rebuilds them.
pub trait HashMemory<T>: SparseMemory<T> {
    fn bucket(&self) -> &[usize];

    fn bucket_mut(&mut self) -> &mut [usize];

    #[inline]
    fn bucket_size(&self) -> usize {
        self.bucket().len()
    }

    #[inline]
    fn bucket_mask(&self) -> usize {
        self.bucket_size().wrapping_sub(1)
    }

    /// Sizes the bucket array for the current capacity.
    /// Returns `true` when the size changed and the chains must be rebuilt.
    fn resize_bucket(&mut self) -> bool;

    /// Releases heap bucket storage. The owner must resize and rebuild before
    /// the next lookup.
    fn free_bucket(&mut self);

    /// Copies `src`'s bucket verbatim when both live in identical storage.
    /// Returns `false` when the caller must resize and rebuild instead.
    fn copy_bucket_from(&mut self, src: &Self) -> bool;
}

/// Forwards [`SparseMemory`] to the `base` field of a hash strategy.
macro_rules! delegate_sparse_memory {
    ($field:ident) => {
        #[inline]
        fn capacity(&self) -> usize {
            self.$field.capacity()
        }

        #[inline]
        fn max_capacity(&self) -> usize {
            self.$field.max_capacity()
        }

        #[inline]
        fn grow_capacity(&self, required: usize) -> usize {
            self.$field.grow_capacity(required)
        }

        #[inline]
        fn slots(&self) -> *const $crate::memory::Slot<T> {
            self.$field.slots()
        }

        #[inline]
        fn slots_mut(&mut self) -> *mut $crate::memory::Slot<T> {
            self.$field.slots_mut()
        }

        #[inline]
        fn bits(&self) -> &[u64] {
            self.$field.bits()
        }

        #[inline]
        fn bits_mut(&mut self) -> &mut [u64] {
            self.$field.bits_mut()
        }

        #[inline]
        fn realloc_storage(&mut self, capacity: usize, keep: usize) {
            self.$field.realloc_storage(capacity, keep)
        }

        #[inline]
        fn free_storage(&mut self) {
            self.$field.free_storage()
        }
    };
}

pub(crate) use delegate_sparse_memory;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_size_heuristic() {
        assert_eq!(calc_bucket_size(0), 0);
        assert_eq!(calc_bucket_size(1), 1);
        assert_eq!(calc_bucket_size(3), 1);
        assert_eq!(calc_bucket_size(4), 16);
        assert_eq!(calc_bucket_size(16), 16);
        assert_eq!(calc_bucket_size(17), 16);
        assert_eq!(calc_bucket_size(18), 32);
        assert_eq!(calc_bucket_size(100), 64);
        assert_eq!(calc_bucket_size(1000), 512);
    }
}
