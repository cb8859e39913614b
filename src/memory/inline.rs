use super::{
    HashMemory, NPOS, Slot, SparseMemory, allocator::RawBuffer, calc_bucket_size,
    delegate_sparse_memory,
};
use crate::{
    bit_array::bit_words,
    memory::{Allocator, DefaultAllocator},
};
use std::{mem::MaybeUninit, ptr};

enum SlotStorage<T, const N: usize, const W: usize, A: Allocator> {
    Inline {
        slots: [MaybeUninit<Slot<T>>; N],
        bits: [u64; W],
    },
    Heap {
        slots: RawBuffer<Slot<T>, A>,
        bits: RawBuffer<u64, A>,
    },
}

impl<T, const N: usize, const W: usize, A: Allocator> SlotStorage<T, N, W, A> {
    fn inline() -> Self {
        SlotStorage::Inline {
            slots: [const { MaybeUninit::uninit() }; N],
            bits: [0; W],
        }
    }
}

/// Slot storage for up to `N` slots inline, spilling to the heap beyond that.
///
/// `W` must equal `bit_words(N)`.
pub struct InlineMemory<T, const N: usize, const W: usize, A: Allocator = DefaultAllocator> {
    storage: SlotStorage<T, N, W, A>,
}

impl<T, const N: usize, const W: usize, A: Allocator> InlineMemory<T, N, W, A> {
    /// Whether the slots currently live in the inline buffer.
    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.storage, SlotStorage::Inline { .. })
    }

    fn spill(&mut self, capacity: usize, keep: usize) {
        let mut heap_slots = RawBuffer::<Slot<T>, A>::with_capacity(capacity);
        let mut heap_bits = RawBuffer::<u64, A>::with_capacity(bit_words(capacity));
        heap_bits.fill_from(0, 0);

        if let SlotStorage::Inline { slots, bits } = &self.storage {
            // SAFETY: keep <= N < capacity, regions are distinct.
            unsafe {
                ptr::copy_nonoverlapping(slots.as_ptr().cast(), heap_slots.as_mut_ptr(), keep);
                heap_bits.as_mut_slice()[..W].copy_from_slice(bits);
            }
        }

        log::trace!("inline slot storage spilled to heap: {N} -> {capacity}");

        self.storage = SlotStorage::Heap {
            slots: heap_slots,
            bits: heap_bits,
        };
    }

    fn restore(&mut self, keep: usize) {
        let mut inline = SlotStorage::inline();

        if let (
            SlotStorage::Heap { slots, bits },
            SlotStorage::Inline {
                slots: inline_slots,
                bits: inline_bits,
            },
        ) = (&self.storage, &mut inline)
        {
            // SAFETY: keep <= N, occupancy words are always initialized.
            unsafe {
                ptr::copy_nonoverlapping(slots.as_ptr(), inline_slots.as_mut_ptr().cast(), keep);
                let words = bits.as_slice();
                let shared = words.len().min(W);
                inline_bits[..shared].copy_from_slice(&words[..shared]);
            }

            log::trace!("heap slot storage restored inline: {} -> {N}", slots.capacity());
        }

        // the old heap buffers are released by their own Drop
        self.storage = inline;
    }
}

impl<T, const N: usize, const W: usize, A: Allocator> Default for InlineMemory<T, N, W, A> {
    fn default() -> Self {
        const { assert!(W == bit_words(N), "InlineMemory: W must be bit_words(N)") };

        Self {
            storage: SlotStorage::inline(),
        }
    }
}

impl<T, const N: usize, const W: usize, A: Allocator> SparseMemory<T>
    for InlineMemory<T, N, W, A>
{
    #[inline]
    fn capacity(&self) -> usize {
        match &self.storage {
            SlotStorage::Inline { .. } => N,
            SlotStorage::Heap { slots, .. } => slots.capacity(),
        }
    }

    #[inline]
    fn slots(&self) -> *const Slot<T> {
        match &self.storage {
            SlotStorage::Inline { slots, .. } => slots.as_ptr().cast(),
            SlotStorage::Heap { slots, .. } => slots.as_ptr(),
        }
    }

    #[inline]
    fn slots_mut(&mut self) -> *mut Slot<T> {
        match &mut self.storage {
            SlotStorage::Inline { slots, .. } => slots.as_mut_ptr().cast(),
            SlotStorage::Heap { slots, .. } => slots.as_mut_ptr(),
        }
    }

    #[inline]
    fn bits(&self) -> &[u64] {
        match &self.storage {
            SlotStorage::Inline { bits, .. } => &bits[..],
            // SAFETY: heap words are zeroed when allocated.
            SlotStorage::Heap { bits, .. } => unsafe { bits.as_slice() },
        }
    }

    #[inline]
    fn bits_mut(&mut self) -> &mut [u64] {
        match &mut self.storage {
            SlotStorage::Inline { bits, .. } => &mut bits[..],
            // SAFETY: heap words are zeroed when allocated.
            SlotStorage::Heap { bits, .. } => unsafe { bits.as_mut_slice() },
        }
    }

    fn realloc_storage(&mut self, capacity: usize, keep: usize) {
        debug_assert!(keep <= capacity && keep <= self.capacity());

        match (self.is_inline(), capacity <= N) {
            (true, true) => {}
            (true, false) => self.spill(capacity, keep),
            (false, true) => self.restore(keep),
            (false, false) => {
                if let SlotStorage::Heap { slots, bits } = &mut self.storage {
                    let old_words = bits.capacity();
                    slots.resize(capacity);
                    bits.resize(bit_words(capacity));
                    bits.fill_from(old_words, 0);
                }
            }
        }
    }

    fn free_storage(&mut self) {
        if !self.is_inline() {
            self.storage = SlotStorage::inline();
        }
    }
}

enum BucketStorage<const B: usize, A: Allocator> {
    Inline([usize; B]),
    Heap(RawBuffer<usize, A>),
}

/// [`InlineMemory`] plus a bucket array that is inline (`B` heads) while the
/// slots are inline and on the heap once they spill.
///
/// `B` must equal `calc_bucket_size(N)`.
pub struct InlineHashMemory<
    T,
    const N: usize,
    const W: usize,
    const B: usize,
    A: Allocator = DefaultAllocator,
> {
    base: InlineMemory<T, N, W, A>,
    bucket: BucketStorage<B, A>,
}

impl<T, const N: usize, const W: usize, const B: usize, A: Allocator>
    InlineHashMemory<T, N, W, B, A>
{
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.base.is_inline()
    }

    #[inline]
    pub fn is_bucket_inline(&self) -> bool {
        matches!(self.bucket, BucketStorage::Inline(_))
    }
}

impl<T, const N: usize, const W: usize, const B: usize, A: Allocator> Default
    for InlineHashMemory<T, N, W, B, A>
{
    fn default() -> Self {
        const { assert!(B == calc_bucket_size(N), "InlineHashMemory: B must be calc_bucket_size(N)") };

        Self {
            base: InlineMemory::default(),
            bucket: BucketStorage::Inline([NPOS; B]),
        }
    }
}

impl<T, const N: usize, const W: usize, const B: usize, A: Allocator> SparseMemory<T>
    for InlineHashMemory<T, N, W, B, A>
{
    delegate_sparse_memory!(base);
}

impl<T, const N: usize, const W: usize, const B: usize, A: Allocator> HashMemory<T>
    for InlineHashMemory<T, N, W, B, A>
{
    #[inline]
    fn bucket(&self) -> &[usize] {
        match &self.bucket {
            BucketStorage::Inline(bucket) => &bucket[..],
            // SAFETY: heap heads are initialized when allocated.
            BucketStorage::Heap(bucket) => unsafe { bucket.as_slice() },
        }
    }

    #[inline]
    fn bucket_mut(&mut self) -> &mut [usize] {
        match &mut self.bucket {
            BucketStorage::Inline(bucket) => &mut bucket[..],
            // SAFETY: heap heads are initialized when allocated.
            BucketStorage::Heap(bucket) => unsafe { bucket.as_mut_slice() },
        }
    }

    fn resize_bucket(&mut self) -> bool {
        let capacity = self.base.capacity();

        if capacity <= N {
            if self.is_bucket_inline() {
                return false;
            }

            log::trace!("bucket restored inline: {B} heads");
            self.bucket = BucketStorage::Inline([NPOS; B]);
            return true;
        }

        let size = calc_bucket_size(capacity);

        if let BucketStorage::Heap(bucket) = &mut self.bucket {
            let old = bucket.capacity();

            if old == size {
                return false;
            }

            log::trace!("heap bucket resize: {old} -> {size}");
            bucket.resize(size);
            bucket.fill_from(old, NPOS);
            return true;
        }

        log::trace!("bucket spilled to heap: {B} -> {size}");
        // inline heads are dropped, the owner rebuilds every chain
        let mut bucket = RawBuffer::with_capacity(size);
        bucket.fill_from(0, NPOS);
        self.bucket = BucketStorage::Heap(bucket);
        true
    }

    fn free_bucket(&mut self) {
        if !self.is_bucket_inline() {
            self.bucket = BucketStorage::Inline([NPOS; B]);
        }
    }

    fn copy_bucket_from(&mut self, src: &Self) -> bool {
        match (&mut self.bucket, &src.bucket) {
            (BucketStorage::Inline(dst), BucketStorage::Inline(src)) => {
                *dst = *src;
                true
            }
            _ => false,
        }
    }
}
