//! # Pool Allocation
//!
//! Zero-initialising allocation with a matching free.
//!
//! The filter allocates shadow state from a pool supplied by its host
//! (nonpaged pool in a real driver). Allocation failure is an ordinary
//! outcome: [`PoolBox::new_zeroed`] reports it as
//! [`Error::ResourceExhausted`] and leaves nothing behind.

use core::alloc::Layout;
use core::fmt;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

use bytemuck::Zeroable;

use crate::error::{Error, Result};

// =============================================================================
// POOL ALLOCATOR TRAIT
// =============================================================================

/// Source of zero-filled memory blocks
pub trait PoolAllocator: Send + Sync {
    /// Allocate `layout.size()` zeroed bytes aligned to `layout.align()`
    ///
    /// Returns `None` when the pool is exhausted. Zero-sized requests may
    /// be refused.
    fn allocate_zeroed(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Return a block to the pool
    ///
    /// # Safety
    /// `ptr` must come from [`PoolAllocator::allocate_zeroed`] on this same
    /// pool with the same `layout`, and must not be used afterwards.
    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Pool backed by the global allocator
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPool;

impl PoolAllocator for SystemPool {
    fn allocate_zeroed(&self, layout: Layout) -> Option<NonNull<u8>> {
        if layout.size() == 0 {
            return None;
        }
        // SAFETY: layout has a non-zero size.
        NonNull::new(unsafe { alloc::alloc::alloc_zeroed(layout) })
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: caller guarantees ptr/layout came from allocate_zeroed.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

// =============================================================================
// POOL BOX
// =============================================================================

/// Owning pointer to a pool-allocated `T`
///
/// The value starts out all-zero, which [`Zeroable`] guarantees is a valid
/// `T`. Dropping the box drops the value and frees the block through the
/// pool it came from.
pub struct PoolBox<'p, T> {
    ptr: NonNull<T>,
    pool: &'p dyn PoolAllocator,
    _owns: PhantomData<T>,
}

impl<'p, T: Zeroable> PoolBox<'p, T> {
    /// Allocate a zeroed `T` from `pool`
    pub fn new_zeroed(pool: &'p dyn PoolAllocator) -> Result<Self> {
        let ptr = pool
            .allocate_zeroed(Layout::new::<T>())
            .ok_or(Error::ResourceExhausted)?;
        Ok(Self {
            ptr: ptr.cast(),
            pool,
            _owns: PhantomData,
        })
    }
}

impl<'p, T> PoolBox<'p, T> {
    /// Give up ownership without freeing
    ///
    /// Pair with [`PoolBox::from_raw`] on the same pool.
    pub fn into_raw(this: Self) -> NonNull<T> {
        let ptr = this.ptr;
        core::mem::forget(this);
        ptr
    }

    /// Take back ownership of a block released by [`PoolBox::into_raw`]
    ///
    /// # Safety
    /// `ptr` must have come from `into_raw` on a box allocated from `pool`,
    /// and nothing else may own or reference it afterwards.
    pub unsafe fn from_raw(ptr: NonNull<T>, pool: &'p dyn PoolAllocator) -> Self {
        Self {
            ptr,
            pool,
            _owns: PhantomData,
        }
    }

    /// Pool the block belongs to
    pub fn pool(this: &Self) -> &'p dyn PoolAllocator {
        this.pool
    }
}

impl<T> Drop for PoolBox<'_, T> {
    fn drop(&mut self) {
        // SAFETY: the box owns a live, initialised T allocated from `pool`
        // with `Layout::new::<T>()`.
        unsafe {
            ptr::drop_in_place(self.ptr.as_ptr());
            self.pool.free(self.ptr.cast(), Layout::new::<T>());
        }
    }
}

impl<T> Deref for PoolBox<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the box owns a live T.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T> DerefMut for PoolBox<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the box owns a live T and we hold &mut self.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolBox<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// SAFETY: PoolBox owns its T like Box does; the pool reference is Sync.
unsafe impl<T: Send> Send for PoolBox<'_, T> {}
// SAFETY: shared access only hands out &T.
unsafe impl<T: Sync> Sync for PoolBox<'_, T> {}
