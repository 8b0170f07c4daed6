//! # Device Registry
//!
//! The collection of live [`DeviceRecord`]s, keyed by real handle.
//!
//! Records live in pool-allocated nodes threaded on an intrusive doubly
//! linked list, so a record never moves once allocated and linking or
//! unlinking one touches only its neighbours. One [`SpinLock`] guards the
//! list structure; it is held for the link update on insert and remove and
//! for the scan on lookup, never across an allocation or a free.
//!
//! Each node carries a reference count. The list owns one reference; every
//! [`DeviceRef`] handed out by a lookup owns another. A removed record is
//! returned to the pool when the last reference drops, so a lookup racing a
//! destroy never sees freed memory.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::fmt;
use core::ops::Deref;
use core::ptr::NonNull;
use core::sync::atomic::{fence, AtomicUsize, Ordering};

use bytemuck::Zeroable;
use proxykmd_core::{Handle, PoolAllocator, PoolBox, Result, SpinLock};

use super::DeviceRecord;

// =============================================================================
// NODES
// =============================================================================

type NodePtr = NonNull<DeviceNode>;

#[derive(Clone, Copy)]
struct Links {
    prev: Option<NodePtr>,
    next: Option<NodePtr>,
}

/// Pool block holding one record
struct DeviceNode {
    /// Touched only with the registry lock held
    links: UnsafeCell<Links>,
    refs: AtomicUsize,
    record: DeviceRecord,
}

// SAFETY: null `Option<NonNull>` links, a zero counter and a zeroed record
// are all valid.
unsafe impl Zeroable for DeviceNode {}

impl DeviceNode {
    /// # Safety
    /// Registry lock held.
    #[inline]
    unsafe fn links(&self) -> Links {
        unsafe { *self.links.get() }
    }

    /// # Safety
    /// Registry lock held.
    #[inline]
    unsafe fn set_prev(&self, prev: Option<NodePtr>) {
        unsafe { (*self.links.get()).prev = prev }
    }

    /// # Safety
    /// Registry lock held.
    #[inline]
    unsafe fn set_next(&self, next: Option<NodePtr>) {
        unsafe { (*self.links.get()).next = next }
    }
}

// =============================================================================
// LIST
// =============================================================================

/// List head; lives inside the registry lock
struct DeviceList {
    head: Option<NodePtr>,
    tail: Option<NodePtr>,
    len: usize,
}

// SAFETY: the list only holds pointers to pool blocks it owns a reference
// to; all access goes through the registry lock.
unsafe impl Send for DeviceList {}

impl DeviceList {
    const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// # Safety
    /// `node` is live and not on any list.
    unsafe fn push_back(&mut self, node: NodePtr) {
        let n = unsafe { node.as_ref() };
        unsafe {
            n.set_prev(self.tail);
            n.set_next(None);
        }
        match self.tail {
            Some(tail) => unsafe { tail.as_ref().set_next(Some(node)) },
            None => self.head = Some(node),
        }
        self.tail = Some(node);
        self.len += 1;
    }

    /// # Safety
    /// `node` is on this list.
    unsafe fn unlink(&mut self, node: NodePtr) {
        let n = unsafe { node.as_ref() };
        let Links { prev, next } = unsafe { n.links() };
        match prev {
            Some(prev) => unsafe { prev.as_ref().set_next(next) },
            None => self.head = next,
        }
        match next {
            Some(next) => unsafe { next.as_ref().set_prev(prev) },
            None => self.tail = prev,
        }
        unsafe {
            n.set_prev(None);
            n.set_next(None);
        }
        self.len -= 1;
    }

    /// Head-to-tail walk
    fn iter(&self) -> impl Iterator<Item = NodePtr> + '_ {
        // SAFETY: `&self` means the lock is held, and every linked node is live.
        core::iter::successors(self.head, |node| unsafe { node.as_ref().links() }.next)
    }

    fn find(&self, handle: Handle) -> Option<NodePtr> {
        self.iter()
            .find(|node| unsafe { node.as_ref() }.record.real_handle() == handle)
    }

    /// Detach every node, returning the old head of the chain
    fn take_all(&mut self) -> Option<NodePtr> {
        self.tail = None;
        self.len = 0;
        self.head.take()
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Lock-protected collection of live device records
pub struct DeviceRegistry {
    list: SpinLock<DeviceList>,
    pool: Arc<dyn PoolAllocator>,
}

impl DeviceRegistry {
    /// Create an empty registry drawing records from `pool`
    pub fn new(pool: Arc<dyn PoolAllocator>) -> Self {
        Self {
            list: SpinLock::new(DeviceList::new()),
            pool,
        }
    }

    /// Allocate a zeroed record that is not yet visible to lookups
    ///
    /// Dropping the returned [`PendingDevice`] frees it again.
    pub fn allocate(&self) -> Result<PendingDevice<'_>> {
        let node = PoolBox::new_zeroed(&*self.pool)?;
        Ok(PendingDevice {
            node,
            registry: self,
        })
    }

    /// Make a filled-in record visible, appending it after every older one
    pub fn insert(&self, pending: PendingDevice<'_>) {
        debug_assert!(
            core::ptr::eq(pending.registry, self),
            "record inserted into a registry it was not allocated from"
        );

        let node = PoolBox::into_raw(pending.node);
        // SAFETY: the node is ours alone until it is linked.
        unsafe { node.as_ref() }.refs.store(1, Ordering::Relaxed);

        let mut list = self.list.lock();
        #[cfg(feature = "debug")]
        debug_assert!(
            list.find(unsafe { node.as_ref() }.record.real_handle()).is_none(),
            "real handle tracked twice"
        );
        // SAFETY: freshly allocated, not on any list.
        unsafe { list.push_back(node) };
    }

    /// Look up the record whose real handle is `handle`
    ///
    /// Scans in insertion order and returns the first match. `None` is the
    /// ordinary answer for a handle the filter never saw.
    pub fn find_by_handle(&self, handle: Handle) -> Option<DeviceRef<'_>> {
        let list = self.list.lock();
        let node = list.find(handle)?;
        // SAFETY: linked nodes are live while the lock is held.
        unsafe { node.as_ref() }.refs.fetch_add(1, Ordering::Relaxed);
        drop(list);

        #[cfg(feature = "debug")]
        log::trace!(target: crate::diag::LOG_TARGET, "find_by_handle: {} hit", handle);
        Some(DeviceRef {
            node,
            registry: self,
        })
    }

    /// Unlink the record for `handle`
    ///
    /// The list's reference moves into the returned [`DeviceRef`]; the
    /// record goes back to the pool once that and any other outstanding
    /// references are dropped.
    pub fn remove(&self, handle: Handle) -> Option<DeviceRef<'_>> {
        let mut list = self.list.lock();
        let node = list.find(handle)?;
        // SAFETY: found on this list.
        unsafe { list.unlink(node) };
        drop(list);

        Some(DeviceRef {
            node,
            registry: self,
        })
    }

    /// Number of tracked records
    pub fn len(&self) -> usize {
        self.list.lock().len
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Real handles of all tracked records, oldest first
    pub fn handles(&self) -> Vec<Handle> {
        let mut out = Vec::new();
        loop {
            out.reserve(self.len());
            let list = self.list.lock();
            if list.len > out.capacity() {
                // Grew since we sized the buffer; never allocate under the lock.
                continue;
            }
            out.extend(
                list.iter()
                    .map(|node| unsafe { node.as_ref() }.record.real_handle()),
            );
            return out;
        }
    }

    /// Untrack everything, returning how many records were still live
    ///
    /// Used at unload. Records still referenced elsewhere are freed when
    /// those references drop.
    pub fn drain(&self) -> usize {
        let (mut cursor, count) = {
            let mut list = self.list.lock();
            let count = list.len;
            (list.take_all(), count)
        };

        while let Some(node) = cursor {
            // The detached chain is reachable only from here.
            cursor = unsafe { node.as_ref().links() }.next;
            unsafe {
                node.as_ref().set_prev(None);
                node.as_ref().set_next(None);
            }
            drop(DeviceRef {
                node,
                registry: self,
            });
        }
        count
    }

    /// # Safety
    /// Last reference to an unlinked node.
    unsafe fn free(&self, node: NodePtr) {
        drop(unsafe { PoolBox::from_raw(node, &*self.pool) });
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.drain();
    }
}

impl fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// PENDING DEVICE
// =============================================================================

/// A record allocated but not yet inserted
pub struct PendingDevice<'r> {
    node: PoolBox<'r, DeviceNode>,
    registry: &'r DeviceRegistry,
}

impl PendingDevice<'_> {
    /// The record being filled in
    pub fn record(&self) -> &DeviceRecord {
        &self.node.record
    }

    /// Mutable access until insertion
    pub fn record_mut(&mut self) -> &mut DeviceRecord {
        &mut self.node.record
    }
}

impl fmt::Debug for PendingDevice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PendingDevice").field(self.record()).finish()
    }
}

// =============================================================================
// DEVICE REF
// =============================================================================

/// Counted reference to a tracked record
///
/// Borrows the registry, which therefore outlives every reference it hands
/// out.
pub struct DeviceRef<'r> {
    node: NodePtr,
    registry: &'r DeviceRegistry,
}

impl DeviceRef<'_> {
    /// Whether two references name the same record
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.node == b.node
    }
}

impl Deref for DeviceRef<'_> {
    type Target = DeviceRecord;

    fn deref(&self) -> &DeviceRecord {
        // SAFETY: we hold a reference, so the node is live; the record is
        // never written after insertion.
        unsafe { &self.node.as_ref().record }
    }
}

impl Clone for DeviceRef<'_> {
    fn clone(&self) -> Self {
        unsafe { self.node.as_ref() }.refs.fetch_add(1, Ordering::Relaxed);
        Self {
            node: self.node,
            registry: self.registry,
        }
    }
}

impl Drop for DeviceRef<'_> {
    fn drop(&mut self) {
        if unsafe { self.node.as_ref() }.refs.fetch_sub(1, Ordering::Release) == 1 {
            fence(Ordering::Acquire);
            // SAFETY: that was the last reference, and the list's own
            // reference is gone, so the node is unlinked.
            unsafe { self.registry.free(self.node) };
        }
    }
}

impl fmt::Debug for DeviceRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// SAFETY: the record is immutable and the count is atomic.
unsafe impl Send for DeviceRef<'_> {}
// SAFETY: as above.
unsafe impl Sync for DeviceRef<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use proxykmd_core::Error;
    use crate::testing::CountingPool;
    use std::thread;

    fn registry_with_pool() -> (Arc<CountingPool>, DeviceRegistry) {
        let pool = Arc::new(CountingPool::new());
        let registry = DeviceRegistry::new(pool.clone());
        (pool, registry)
    }

    fn track(registry: &DeviceRegistry, real: usize) {
        let mut pending = registry.allocate().unwrap();
        pending.record_mut().set_real_handle(Handle::new(real));
        registry.insert(pending);
    }

    #[test]
    fn test_find_on_empty_registry() {
        let (_, registry) = registry_with_pool();
        assert!(registry.is_empty());
        assert!(registry.find_by_handle(Handle::new(0x1234)).is_none());
    }

    #[test]
    fn test_insert_then_find() {
        let (_, registry) = registry_with_pool();
        track(&registry, 0x10);
        track(&registry, 0x20);

        let found = registry.find_by_handle(Handle::new(0x20)).unwrap();
        assert_eq!(found.real_handle(), Handle::new(0x20));
        assert_eq!(registry.len(), 2);
        assert!(registry.find_by_handle(Handle::new(0x30)).is_none());
    }

    #[test]
    fn test_handles_in_insertion_order() {
        let (_, registry) = registry_with_pool();
        for real in [0x30, 0x10, 0x20] {
            track(&registry, real);
        }
        assert_eq!(
            registry.handles(),
            [0x30, 0x10, 0x20].map(Handle::new).to_vec()
        );
    }

    #[test]
    fn test_dropped_pending_is_freed() {
        let (pool, registry) = registry_with_pool();
        let pending = registry.allocate().unwrap();
        assert_eq!(pool.live(), 1);
        drop(pending);
        assert_eq!(pool.live(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_null_real_handle_is_tracked() {
        let (pool, registry) = registry_with_pool();
        track(&registry, 0x40);
        let pending = registry.allocate().unwrap();
        registry.insert(pending);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.handles(), [Handle::new(0x40), Handle::NULL].to_vec());
        assert!(registry.find_by_handle(Handle::NULL).is_some());
        drop(registry.remove(Handle::NULL));
        assert_eq!(pool.live(), 1);
    }

    #[test]
    fn test_exhausted_pool() {
        let (pool, registry) = registry_with_pool();
        pool.set_exhausted(true);
        assert_eq!(registry.allocate().unwrap_err(), Error::ResourceExhausted);
    }

    #[test]
    fn test_remove_unlinks_middle_and_ends() {
        let (pool, registry) = registry_with_pool();
        for real in 1..=4 {
            track(&registry, real);
        }

        drop(registry.remove(Handle::new(2)).unwrap());
        drop(registry.remove(Handle::new(1)).unwrap());
        drop(registry.remove(Handle::new(4)).unwrap());
        assert_eq!(registry.handles(), [Handle::new(3)].to_vec());
        assert_eq!(pool.live(), 1);

        assert!(registry.remove(Handle::new(2)).is_none());
        track(&registry, 5);
        assert_eq!(registry.handles(), [3, 5].map(Handle::new).to_vec());
    }

    #[test]
    fn test_removed_record_outlives_outstanding_lookup() {
        let (pool, registry) = registry_with_pool();
        track(&registry, 0x77);

        let looked_up = registry.find_by_handle(Handle::new(0x77)).unwrap();
        let removed = registry.remove(Handle::new(0x77)).unwrap();
        assert!(DeviceRef::ptr_eq(&looked_up, &removed));
        assert!(registry.find_by_handle(Handle::new(0x77)).is_none());

        drop(removed);
        assert_eq!(pool.live(), 1);
        assert_eq!(looked_up.real_handle(), Handle::new(0x77));
        drop(looked_up);
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_drain_frees_everything() {
        let (pool, registry) = registry_with_pool();
        for real in 1..=5 {
            track(&registry, real);
        }
        assert_eq!(registry.drain(), 5);
        assert!(registry.is_empty());
        assert_eq!(pool.live(), 0);
        assert_eq!(registry.drain(), 0);
    }

    #[test]
    fn test_drop_returns_records_to_pool() {
        let (pool, registry) = registry_with_pool();
        track(&registry, 1);
        track(&registry, 2);
        drop(registry);
        assert_eq!(pool.live(), 0);
    }

    #[test]
    fn test_concurrent_insert_and_lookup() {
        let (pool, registry) = registry_with_pool();
        const THREADS: usize = 8;
        const PER_THREAD: usize = 64;

        thread::scope(|s| {
            for t in 0..THREADS {
                let registry = &registry;
                s.spawn(move || {
                    for i in 0..PER_THREAD {
                        let real = 1 + t * PER_THREAD + i;
                        track(registry, real);
                        assert!(registry.find_by_handle(Handle::new(real)).is_some());
                    }
                });
            }
        });

        assert_eq!(registry.len(), THREADS * PER_THREAD);
        for real in 1..=THREADS * PER_THREAD {
            let found = registry.find_by_handle(Handle::new(real)).unwrap();
            assert_eq!(found.real_handle(), Handle::new(real));
        }
        assert_eq!(pool.live(), THREADS * PER_THREAD);
    }

    #[test]
    fn test_concurrent_remove_races_lookup() {
        let (pool, registry) = registry_with_pool();
        for real in 1..=256 {
            track(&registry, real);
        }

        thread::scope(|s| {
            s.spawn(|| {
                for real in 1..=256 {
                    drop(registry.remove(Handle::new(real)));
                }
            });
            s.spawn(|| {
                for real in (1..=256).rev() {
                    if let Some(found) = registry.find_by_handle(Handle::new(real)) {
                        assert_eq!(found.real_handle(), Handle::new(real));
                    }
                }
            });
        });

        assert!(registry.is_empty());
        assert_eq!(pool.live(), 0);
    }
}
