//! Hash index over a sparse vector.
//!
//! Each live slot stores its element with the hash computed at insertion; the
//! slot's `next` field chains it into the bucket its hash masks to. Free slots
//! reuse the same field for the free list.

use crate::{
    bit_array,
    memory::{HashMemory, NPOS},
    sparse::SparseVector,
};
use std::hash::Hash;

mod cursor;
mod map;
mod set;

pub use cursor::{HashCursor, HashCursorMut};
pub use map::SparseHashMap;
pub use set::{IntoIter, Iter, SparseHashSet};
pub use xsparse_macros::Keyed;

#[cfg(test)]
mod tests;

/// Cached hash type.
pub type HashType = u64;

/// Payload of a hashed slot.
#[derive(Clone, Debug)]
pub struct HashNode<T> {
    pub hash: HashType,
    pub value: T,
}

/// Types that carry their own lookup key.
///
/// `#[derive(Keyed)]` implements it for a struct with one `#[key]` field.
pub trait Keyed {
    type Key: Hash + Eq;

    fn key(&self) -> &Self::Key;
}

/// How a container finds the key of an element.
pub trait KeyExtract<T> {
    type Key: Hash + Eq + ?Sized;

    fn key(value: &T) -> &Self::Key;
}

/// The element is its own key.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl<T: Hash + Eq> KeyExtract<T> for Identity {
    type Key = T;

    #[inline]
    fn key(value: &T) -> &T {
        value
    }
}

/// The first half of a `(K, V)` pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct PairKey;

impl<K: Hash + Eq, V> KeyExtract<(K, V)> for PairKey {
    type Key = K;

    #[inline]
    fn key(value: &(K, V)) -> &K {
        &value.0
    }
}

/// Delegates to [`Keyed`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ByKeyed;

impl<T: Keyed> KeyExtract<T> for ByKeyed {
    type Key = T::Key;

    #[inline]
    fn key(value: &T) -> &T::Key {
        value.key()
    }
}

/// Resets every bucket head to [`NPOS`].
#[inline]
pub(crate) fn clean_bucket(bucket: &mut [usize]) {
    bucket.fill(NPOS);
}

/// Threads every live slot into its bucket in one ascending pass.
///
/// Slots are pushed onto the front of their chain, so a chain lists its
/// slots in descending index order. Buckets must be clean beforehand.
pub(crate) fn build_bucket<T, M: HashMemory<HashNode<T>>>(data: &mut SparseVector<HashNode<T>, M>) {
    let sparse_size = data.sparse_size();
    let memory = &mut data.memory;

    if memory.bucket_size() == 0 {
        debug_assert!(sparse_size == 0 || bit_array::find_next(memory.bits(), 0, sparse_size).is_none());
        return;
    }

    let mask = memory.bucket_mask();
    let mut next = bit_array::find_next(memory.bits(), 0, sparse_size);

    while let Some(index) = next {
        // SAFETY: the bit is set, so the slot is live and below capacity.
        let hash = unsafe { (*memory.slots().add(index)).data.assume_init_ref().hash };
        let bucket_index = hash as usize & mask;
        let head = memory.bucket()[bucket_index];

        // SAFETY: as above.
        unsafe { (*memory.slots_mut().add(index)).next = head };
        memory.bucket_mut()[bucket_index] = index;

        next = bit_array::find_next(memory.bits(), index + 1, sparse_size);
    }
}

/// Pushes live slot `index` onto the front of its chain.
pub(crate) fn link<T, M: HashMemory<HashNode<T>>>(data: &mut SparseVector<HashNode<T>, M>, index: usize) {
    // SAFETY: caller passes a live slot.
    let hash = unsafe { data.get_unchecked(index).hash };
    let bucket_index = hash as usize & data.memory.bucket_mask();
    let head = data.memory.bucket()[bucket_index];

    // SAFETY: live slot.
    unsafe { data.slot_mut(index).next = head };
    data.memory.bucket_mut()[bucket_index] = index;
}

/// Removes live slot `index` from its chain. The slot itself stays live.
pub(crate) fn unlink<T, M: HashMemory<HashNode<T>>>(data: &mut SparseVector<HashNode<T>, M>, index: usize) {
    debug_assert!(data.has_data(index), "unlink: no element at {index}");

    // SAFETY: caller passes a live slot; chains only hold live slots.
    unsafe {
        let hash = data.get_unchecked(index).hash;
        let after = data.slot(index).next;
        let bucket_index = hash as usize & data.memory.bucket_mask();

        let head = data.memory.bucket()[bucket_index];
        if head == index {
            data.memory.bucket_mut()[bucket_index] = after;
            return;
        }

        let mut prev = head;
        while prev != NPOS {
            let next = data.slot(prev).next;

            if next == index {
                data.slot_mut(prev).next = after;
                return;
            }

            prev = next;
        }
    }

    debug_assert!(false, "unlink: slot {index} missing from its chain");
}
