use std::{
    alloc::{self, Layout},
    marker::PhantomData,
    ptr::{self, NonNull},
};

#[cold]
fn capacity_overflow() -> ! {
    panic!("capacity overflow")
}

#[inline]
fn array_layout<T>(count: usize) -> Layout {
    Layout::array::<T>(count).unwrap_or_else(|_| capacity_overflow())
}

/// Compile-time allocation policy used by the heap-backed storage strategies.
///
/// All methods are associated functions: an allocator is a type, not a value,
/// so containers pay nothing to carry one around. Allocation failure is fatal
/// and routed to [`alloc::handle_alloc_error`].
pub trait Allocator {
    /// Whether [`Allocator::realloc`] is a native in-place reallocation.
    const SUPPORTS_REALLOC: bool;

    /// Allocates uninitialized storage for `count` values of `T`.
    fn alloc<T>(count: usize) -> NonNull<T>;

    /// Releases storage previously returned by this allocator.
    ///
    /// # Safety
    /// `ptr` must come from this allocator with exactly `count` items.
    unsafe fn free<T>(ptr: NonNull<T>, count: usize);

    /// Moves an allocation to a new size, keeping the first `min(old, new)` items.
    ///
    /// The default is alloc + copy + free.
    ///
    /// # Safety
    /// `ptr` must come from this allocator with exactly `old` items, both sizes non-zero.
    unsafe fn realloc<T>(ptr: NonNull<T>, old: usize, new: usize) -> NonNull<T> {
        let new_ptr = Self::alloc::<T>(new);

        // SAFETY: both regions are live and distinct, caller guarantees `old` items.
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), new_ptr.as_ptr(), old.min(new));
            Self::free(ptr, old);
        }

        new_ptr
    }

    /// Resizes an allocation from `old` to `new` items, hiding whether the
    /// allocator reallocates natively. Either size may be zero.
    ///
    /// # Safety
    /// `ptr` must be dangling when `old == 0`, or come from this allocator
    /// with exactly `old` items otherwise.
    unsafe fn resize<T>(ptr: NonNull<T>, old: usize, new: usize) -> NonNull<T> {
        match (old, new) {
            (_, _) if old == new => ptr,
            (0, _) => Self::alloc(new),
            (_, 0) => {
                // SAFETY: forwarded from caller.
                unsafe { Self::free(ptr, old) };
                NonNull::dangling()
            }
            // SAFETY: forwarded from caller, both sizes are non-zero.
            _ => unsafe { Self::realloc(ptr, old, new) },
        }
    }
}

/// The global allocator with native `realloc`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAllocator;

impl Allocator for DefaultAllocator {
    const SUPPORTS_REALLOC: bool = true;

    fn alloc<T>(count: usize) -> NonNull<T> {
        let layout = array_layout::<T>(count);

        if layout.size() == 0 {
            return NonNull::dangling();
        }

        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc::alloc(layout) };

        match NonNull::new(ptr) {
            Some(ptr) => ptr.cast(),
            None => alloc::handle_alloc_error(layout),
        }
    }

    unsafe fn free<T>(ptr: NonNull<T>, count: usize) {
        let layout = array_layout::<T>(count);

        if layout.size() != 0 {
            // SAFETY: caller guarantees ptr was allocated with this layout.
            unsafe { alloc::dealloc(ptr.as_ptr().cast(), layout) };
        }
    }

    unsafe fn realloc<T>(ptr: NonNull<T>, old: usize, new: usize) -> NonNull<T> {
        let old_layout = array_layout::<T>(old);
        let new_layout = array_layout::<T>(new);

        if old_layout.size() == 0 {
            return Self::alloc(new);
        }

        if new_layout.size() == 0 {
            // SAFETY: forwarded from caller.
            unsafe { Self::free(ptr, old) };
            return NonNull::dangling();
        }

        // SAFETY: caller guarantees ptr was allocated with old_layout.
        let new_ptr = unsafe { alloc::realloc(ptr.as_ptr().cast(), old_layout, new_layout.size()) };

        match NonNull::new(new_ptr) {
            Some(ptr) => ptr.cast(),
            None => alloc::handle_alloc_error(new_layout),
        }
    }
}

/// The global allocator restricted to alloc/free, so every resize goes
/// through alloc + copy + free.
#[derive(Clone, Copy, Debug, Default)]
pub struct CopyAllocator;

impl Allocator for CopyAllocator {
    const SUPPORTS_REALLOC: bool = false;

    #[inline]
    fn alloc<T>(count: usize) -> NonNull<T> {
        DefaultAllocator::alloc(count)
    }

    #[inline]
    unsafe fn free<T>(ptr: NonNull<T>, count: usize) {
        // SAFETY: forwarded from caller.
        unsafe { DefaultAllocator::free(ptr, count) }
    }
}

/// Owned, uninitialized heap buffer of `cap` items.
///
/// Never drops its items, only the allocation. Owners track which items are live.
pub(crate) struct RawBuffer<T, A: Allocator> {
    ptr: NonNull<T>,
    cap: usize,
    _marker: PhantomData<(T, A)>,
}

// SAFETY: RawBuffer uniquely owns its allocation.
unsafe impl<T: Send, A: Allocator> Send for RawBuffer<T, A> {}
// SAFETY: shared access only hands out shared pointers.
unsafe impl<T: Sync, A: Allocator> Sync for RawBuffer<T, A> {}

impl<T, A: Allocator> RawBuffer<T, A> {
    pub(crate) const fn new() -> Self {
        Self {
            ptr: NonNull::dangling(),
            cap: 0,
            _marker: PhantomData,
        }
    }

    pub(crate) fn with_capacity(cap: usize) -> Self {
        let mut buffer = Self::new();
        buffer.resize(cap);
        buffer
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.cap
    }

    #[inline]
    pub(crate) fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Resizes to exactly `cap` items. Items past the old capacity are uninitialized.
    pub(crate) fn resize(&mut self, cap: usize) {
        if cap == self.cap {
            return;
        }

        // SAFETY: ptr/cap always describe an allocation from A (or dangling with cap 0).
        self.ptr = unsafe { A::resize(self.ptr, self.cap, cap) };
        self.cap = cap;
    }

    pub(crate) fn free(&mut self) {
        self.resize(0);
    }
}

impl<T: Copy, A: Allocator> RawBuffer<T, A> {
    /// # Safety
    /// All `cap` items must be initialized.
    #[inline]
    pub(crate) unsafe fn as_slice(&self) -> &[T] {
        // SAFETY: caller guarantees initialization, ptr is valid for cap items.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.cap) }
    }

    /// # Safety
    /// All `cap` items must be initialized.
    #[inline]
    pub(crate) unsafe fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: caller guarantees initialization, ptr is valid for cap items.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.cap) }
    }

    /// Writes `value` into items `[from, cap)`.
    pub(crate) fn fill_from(&mut self, from: usize, value: T) {
        for i in from..self.cap {
            // SAFETY: i < cap.
            unsafe { self.ptr.as_ptr().add(i).write(value) };
        }
    }
}

impl<T, A: Allocator> Drop for RawBuffer<T, A> {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resize_keeps_prefix<A: Allocator>() {
        let mut buffer = RawBuffer::<u32, A>::with_capacity(4);
        buffer.fill_from(0, 7);
        buffer.resize(16);
        buffer.fill_from(4, 9);

        let items = unsafe { buffer.as_slice() };
        assert_eq!(&items[..4], &[7; 4]);
        assert_eq!(&items[4..], &[9; 12]);

        buffer.resize(2);
        assert_eq!(unsafe { buffer.as_slice() }, &[7, 7]);

        buffer.free();
        assert_eq!(buffer.capacity(), 0);
    }

    #[test]
    fn realloc_path_keeps_prefix() {
        resize_keeps_prefix::<DefaultAllocator>();
    }

    #[test]
    fn copy_path_keeps_prefix() {
        resize_keeps_prefix::<CopyAllocator>();
    }

    #[test]
    fn zero_sized_requests_do_not_allocate() {
        let ptr = DefaultAllocator::alloc::<u64>(0);
        assert_eq!(ptr, NonNull::dangling());

        let mut buffer = RawBuffer::<(), DefaultAllocator>::with_capacity(32);
        assert_eq!(buffer.capacity(), 32);
        buffer.free();
    }
}
