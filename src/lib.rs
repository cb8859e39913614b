//! Sparse containers: a hole-tolerant vector whose indices stay stable across
//! removals, and hash sets/maps layered on top of it.
//!
//! Storage is a type parameter. [`memory::GrowableMemory`] lives on the heap,
//! [`memory::FixedMemory`] holds a compile-time number of slots inline, and
//! [`memory::InlineMemory`] starts inline and spills to the heap. The
//! `*_vector!`, `*_set!` and `*_map!` macros spell out the const parameters
//! the fixed and inline strategies need.

extern crate self as xsparse;

pub mod bit_array;
pub mod hash;
pub mod memory;
pub mod sparse;

mod error;


pub use bit_array::bit_words;
pub use error::{SparseError, SparseResult};
pub use hash::{
    ByKeyed, HashCursor, HashCursorMut, HashNode, HashType, Identity, KeyExtract, Keyed, PairKey,
    SparseHashMap, SparseHashSet,
};
pub use memory::{NPOS, calc_bucket_size};
pub use sparse::{SparseCursor, SparseCursorMut, SparseVector};

pub type GrowableVector<T> = SparseVector<T, memory::GrowableMemory<T>>;
pub type GrowableHashSet<T> = SparseHashSet<T, memory::GrowableHashMemory<HashNode<T>>>;
pub type GrowableHashMap<K, V> = SparseHashMap<K, V, memory::GrowableHashMemory<HashNode<(K, V)>>>;

/// `SparseVector<T>` with `N` inline slots and no heap fallback.
#[macro_export]
macro_rules! fixed_vector {
    ($t:ty, $n:expr) => {
        $crate::SparseVector<$t, $crate::memory::FixedMemory<$t, { $n }, { $crate::bit_words($n) }>>
    };
}

/// `SparseVector<T>` with `N` inline slots that spills to the heap.
#[macro_export]
macro_rules! inline_vector {
    ($t:ty, $n:expr) => {
        $crate::SparseVector<$t, $crate::memory::InlineMemory<$t, { $n }, { $crate::bit_words($n) }>>
    };
    ($t:ty, $n:expr, $alloc:ty) => {
        $crate::SparseVector<
            $t,
            $crate::memory::InlineMemory<$t, { $n }, { $crate::bit_words($n) }, $alloc>,
        >
    };
}

/// Hash set over `N` inline slots and an inline bucket array.
///
/// Optional trailing arguments pick the hasher and the key extractor.
#[macro_export]
macro_rules! fixed_set {
    ($t:ty, $n:expr) => {
        $crate::fixed_set!($t, $n, ::std::hash::RandomState, $crate::Identity)
    };
    ($t:ty, $n:expr, $s:ty, $k:ty) => {
        $crate::SparseHashSet<
            $t,
            $crate::memory::FixedHashMemory<
                $crate::HashNode<$t>,
                { $n },
                { $crate::bit_words($n) },
                { $crate::calc_bucket_size($n) },
            >,
            $s,
            $k,
        >
    };
}

/// Hash set that keeps slots and buckets inline up to `N` elements.
#[macro_export]
macro_rules! inline_set {
    ($t:ty, $n:expr) => {
        $crate::inline_set!($t, $n, ::std::hash::RandomState, $crate::Identity)
    };
    ($t:ty, $n:expr, $s:ty, $k:ty) => {
        $crate::SparseHashSet<
            $t,
            $crate::memory::InlineHashMemory<
                $crate::HashNode<$t>,
                { $n },
                { $crate::bit_words($n) },
                { $crate::calc_bucket_size($n) },
            >,
            $s,
            $k,
        >
    };
}

/// Hash map over `N` inline slots and an inline bucket array.
///
/// An optional trailing argument picks the hasher.
#[macro_export]
macro_rules! fixed_map {
    ($k:ty, $v:ty, $n:expr) => {
        $crate::fixed_map!($k, $v, $n, ::std::hash::RandomState)
    };
    ($k:ty, $v:ty, $n:expr, $s:ty) => {
        $crate::SparseHashMap<
            $k,
            $v,
            $crate::memory::FixedHashMemory<
                $crate::HashNode<($k, $v)>,
                { $n },
                { $crate::bit_words($n) },
                { $crate::calc_bucket_size($n) },
            >,
            $s,
        >
    };
}

/// Hash map that keeps slots and buckets inline up to `N` entries.
#[macro_export]
macro_rules! inline_map {
    ($k:ty, $v:ty, $n:expr) => {
        $crate::inline_map!($k, $v, $n, ::std::hash::RandomState)
    };
    ($k:ty, $v:ty, $n:expr, $s:ty) => {
        $crate::SparseHashMap<
            $k,
            $v,
            $crate::memory::InlineHashMemory<
                $crate::HashNode<($k, $v)>,
                { $n },
                { $crate::bit_words($n) },
                { $crate::calc_bucket_size($n) },
            >,
            $s,
        >
    };
}
