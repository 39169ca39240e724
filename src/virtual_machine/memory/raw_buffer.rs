//! Growable native buffer of fixed-width words.
//!
//! [`RawPackedBuffer`] owns one contiguous block obtained from the global
//! allocator. Capacity grows by exactly the amount a push needs (no doubling)
//! and shrinks by one element on removal. The logical length is tracked
//! separately from capacity and only the logical elements are ever exposed.
//!
//! This is the only module that touches raw pointers; everything else goes
//! through [`RawPackedBuffer::as_slice`] and [`RawPackedBuffer::as_mut_slice`].
//!
//! # Alignment
//!
//! The block is aligned to the element size or the element alignment,
//! whichever is larger, rounded up to a power of two.

use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;

/// Capacity used by [`RawPackedBuffer::default`].
pub const DEFAULT_CAPACITY: usize = 4;

pub struct RawPackedBuffer<T: Copy> {
    ptr: NonNull<T>,
    len: usize,
    capacity: usize,
    _marker: PhantomData<T>,
}

#[cold]
fn capacity_overflow() -> ! {
    panic!("raw packed buffer capacity overflow");
}

impl<T: Copy> RawPackedBuffer<T> {
    /// Alignment of the allocated block.
    pub const ALIGNMENT: usize = {
        let size = mem::size_of::<T>();
        let align = mem::align_of::<T>();
        if size > align {
            size.next_power_of_two()
        } else {
            align
        }
    };

    /// Creates a buffer with room for `initial_capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics for zero-sized `T` or if the requested size overflows.
    pub fn new(initial_capacity: usize) -> Self {
        assert!(
            mem::size_of::<T>() != 0,
            "zero-sized elements are not supported"
        );
        let mut buffer = Self {
            ptr: NonNull::dangling(),
            len: 0,
            capacity: 0,
            _marker: PhantomData,
        };
        buffer.reallocate(initial_capacity);
        buffer
    }

    /// Number of logical elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of elements the block can hold without reallocating.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends one element, growing capacity by exactly one when full.
    pub fn push(&mut self, value: T) {
        if self.len == self.capacity {
            self.reallocate(self.grown_capacity(1));
        }
        // SAFETY: `len < capacity` after the reallocation above, so the slot is
        // inside the allocated block.
        unsafe { self.ptr.as_ptr().add(self.len).write(value) };
        self.len += 1;
    }

    /// Appends all `values`.
    ///
    /// When they do not fit in the free capacity, capacity grows by exactly
    /// the missing amount.
    pub fn push_many(&mut self, values: &[T]) {
        let free = self.capacity - self.len;
        if values.len() > free {
            self.reallocate(self.grown_capacity(values.len() - free));
        }
        // SAFETY: `len + values.len() <= capacity` after the reallocation above,
        // and `values` cannot alias our exclusively owned block.
        unsafe {
            ptr::copy_nonoverlapping(
                values.as_ptr(),
                self.ptr.as_ptr().add(self.len),
                values.len(),
            );
        }
        self.len += values.len();
    }

    /// Removes the element at `index`, shifting later elements left.
    ///
    /// Capacity shrinks by exactly one. Returns `None` if `index` is out of
    /// bounds.
    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        if index >= self.len {
            return None;
        }
        // SAFETY: `index < len`, so both the read and the shifted range
        // `[index + 1, len)` are initialized elements of the block.
        let value = unsafe {
            let base = self.ptr.as_ptr();
            let value = base.add(index).read();
            ptr::copy(base.add(index + 1), base.add(index), self.len - index - 1);
            value
        };
        self.len -= 1;
        self.reallocate(self.capacity - 1);
        Some(value)
    }

    /// Logical elements, never including unused capacity.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` elements are initialized; a dangling pointer
        // is valid for a zero-length slice.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Mutable view of the logical elements.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: see `as_slice`; `&mut self` guarantees exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Releases the block now instead of at end of scope.
    pub fn dispose(self) {
        drop(self);
    }

    fn grown_capacity(&self, additional: usize) -> usize {
        self.capacity
            .checked_add(additional)
            .unwrap_or_else(|| capacity_overflow())
    }

    fn layout(capacity: usize) -> Layout {
        mem::size_of::<T>()
            .checked_mul(capacity)
            .and_then(|size| Layout::from_size_align(size, Self::ALIGNMENT).ok())
            .unwrap_or_else(|| capacity_overflow())
    }

    /// Moves the block to hold exactly `new_capacity` elements.
    ///
    /// Existing elements are preserved. Requires `new_capacity >= len`.
    fn reallocate(&mut self, new_capacity: usize) {
        debug_assert!(new_capacity >= self.len);
        if new_capacity == self.capacity {
            return;
        }

        let new_layout = Self::layout(new_capacity);
        let raw = if self.capacity == 0 {
            // SAFETY: `new_capacity > 0` and `T` is not zero-sized, so the
            // layout has a non-zero size.
            unsafe { alloc::alloc(new_layout) }
        } else if new_capacity == 0 {
            // SAFETY: the block was allocated with `layout(self.capacity)`.
            unsafe { alloc::dealloc(self.ptr.as_ptr().cast(), Self::layout(self.capacity)) };
            self.ptr = NonNull::dangling();
            self.capacity = 0;
            return;
        } else {
            // SAFETY: the block was allocated with `layout(self.capacity)` and
            // the new size is non-zero with the same alignment.
            unsafe {
                alloc::realloc(
                    self.ptr.as_ptr().cast(),
                    Self::layout(self.capacity),
                    new_layout.size(),
                )
            }
        };

        self.ptr = NonNull::new(raw.cast::<T>())
            .unwrap_or_else(|| alloc::handle_alloc_error(new_layout));
        self.capacity = new_capacity;
    }
}

impl<T: Copy> Drop for RawPackedBuffer<T> {
    fn drop(&mut self) {
        if self.capacity != 0 {
            // SAFETY: the block was allocated with `layout(self.capacity)` and
            // is released only here.
            unsafe { alloc::dealloc(self.ptr.as_ptr().cast(), Self::layout(self.capacity)) };
        }
    }
}

impl<T: Copy> Default for RawPackedBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for RawPackedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPackedBuffer")
            .field("capacity", &self.capacity)
            .field("elements", &self.as_slice())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_is_empty_with_requested_capacity() {
        let buffer = RawPackedBuffer::<u64>::new(3);
        assert!(buffer.is_empty());
        assert_eq!(buffer.capacity(), 3);
        assert!(buffer.as_slice().is_empty());
    }

    #[test]
    fn default_capacity() {
        assert_eq!(RawPackedBuffer::<u32>::default().capacity(), DEFAULT_CAPACITY);
    }

    #[test]
    fn push_within_capacity_does_not_grow() {
        let mut buffer = RawPackedBuffer::<u64>::new(2);
        buffer.push(1);
        buffer.push(2);
        assert_eq!(buffer.capacity(), 2);
        assert_eq!(buffer.as_slice(), &[1, 2]);
    }

    #[test]
    fn push_when_full_grows_by_one() {
        let mut buffer = RawPackedBuffer::<u64>::new(1);
        buffer.push(7);
        buffer.push(8);
        assert_eq!(buffer.capacity(), 2);
        buffer.push(9);
        assert_eq!(buffer.capacity(), 3);
        assert_eq!(buffer.as_slice(), &[7, 8, 9]);
    }

    #[test]
    fn push_into_zero_capacity() {
        let mut buffer = RawPackedBuffer::<u32>::new(0);
        assert_eq!(buffer.capacity(), 0);
        buffer.push(5);
        assert_eq!(buffer.capacity(), 1);
        assert_eq!(buffer.as_slice(), &[5]);
    }

    #[test]
    fn push_many_grows_by_exact_overflow() {
        let mut buffer = RawPackedBuffer::<u32>::new(4);
        buffer.push(1);
        buffer.push_many(&[2, 3, 4, 5, 6]);
        // 3 free slots, 5 values: capacity grows by 2
        assert_eq!(buffer.capacity(), 6);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn push_many_fitting_keeps_capacity() {
        let mut buffer = RawPackedBuffer::<u32>::new(4);
        buffer.push_many(&[1, 2, 3]);
        assert_eq!(buffer.capacity(), 4);
        buffer.push_many(&[]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn remove_at_shifts_and_shrinks() {
        let mut buffer = RawPackedBuffer::<u64>::new(4);
        buffer.push_many(&[10, 20, 30, 40]);
        assert_eq!(buffer.remove_at(1), Some(20));
        assert_eq!(buffer.as_slice(), &[10, 30, 40]);
        assert_eq!(buffer.capacity(), 3);
        assert_eq!(buffer.remove_at(2), Some(40));
        assert_eq!(buffer.as_slice(), &[10, 30]);
        assert_eq!(buffer.capacity(), 2);
    }

    #[test]
    fn remove_last_element_releases_block() {
        let mut buffer = RawPackedBuffer::<u64>::new(1);
        buffer.push(1);
        assert_eq!(buffer.remove_at(0), Some(1));
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.is_empty());
        buffer.push(2);
        assert_eq!(buffer.as_slice(), &[2]);
    }

    #[test]
    fn remove_at_out_of_bounds() {
        let mut buffer = RawPackedBuffer::<u64>::new(4);
        buffer.push(1);
        assert_eq!(buffer.remove_at(1), None);
        assert_eq!(buffer.capacity(), 4);
        assert_eq!(buffer.as_slice(), &[1]);
    }

    #[test]
    fn as_mut_slice_updates_in_place() {
        let mut buffer = RawPackedBuffer::<u64>::new(2);
        buffer.push_many(&[1, 2]);
        buffer.as_mut_slice()[1] ^= 0xff;
        assert_eq!(buffer.as_slice(), &[1, 0xfd]);
    }

    #[test]
    fn block_respects_alignment() {
        assert_eq!(RawPackedBuffer::<u64>::ALIGNMENT, 8);
        assert_eq!(RawPackedBuffer::<[u8; 3]>::ALIGNMENT, 4);
        let mut buffer = RawPackedBuffer::<u64>::new(1);
        buffer.push(0);
        let addr = buffer.as_slice().as_ptr() as usize;
        assert_eq!(addr % RawPackedBuffer::<u64>::ALIGNMENT, 0);
    }

    #[test]
    fn dispose_consumes_buffer() {
        let mut buffer = RawPackedBuffer::<u64>::new(8);
        buffer.push_many(&[1, 2, 3]);
        buffer.dispose();
    }

    #[test]
    #[should_panic(expected = "zero-sized")]
    fn zero_sized_elements_rejected() {
        let _ = RawPackedBuffer::<()>::new(1);
    }

    proptest! {
        #[test]
        fn push_many_growth_is_exact(
            capacity in 0usize..16,
            prefix in prop::collection::vec(any::<u64>(), 0..16),
            extra in prop::collection::vec(any::<u64>(), 0..32),
        ) {
            let mut buffer = RawPackedBuffer::<u64>::new(capacity);
            for v in &prefix {
                buffer.push(*v);
            }
            let before = buffer.capacity();
            let free = before - buffer.len();
            buffer.push_many(&extra);

            let expected = if extra.len() > free { before + (extra.len() - free) } else { before };
            prop_assert_eq!(buffer.capacity(), expected);
            prop_assert_eq!(&buffer.as_slice()[..prefix.len()], prefix.as_slice());
            prop_assert_eq!(&buffer.as_slice()[prefix.len()..], extra.as_slice());
        }

        #[test]
        fn remove_at_matches_vec(
            values in prop::collection::vec(any::<u32>(), 1..24),
            index in any::<prop::sample::Index>(),
        ) {
            let mut buffer = RawPackedBuffer::<u32>::new(values.len());
            buffer.push_many(&values);
            let mut expected = values.clone();
            let i = index.index(values.len());

            prop_assert_eq!(buffer.remove_at(i), Some(expected.remove(i)));
            prop_assert_eq!(buffer.as_slice(), expected.as_slice());
            prop_assert_eq!(buffer.capacity(), values.len() - 1);
        }
    }
}
