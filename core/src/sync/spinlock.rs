//! IRQL-raising spin lock.

use core::fmt;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use spin::{Mutex, MutexGuard};

use super::irql::{interrupt_gate, InterruptGate, Irql};

/// Busy-wait lock usable at `DISPATCH_LEVEL`
///
/// Acquisition raises to [`Irql::Dispatch`] first so the holder cannot be
/// preempted on its own processor, then spins. Not reentrant: acquiring a
/// lock already held by the same processor spins forever.
pub struct SpinLock<T: ?Sized> {
    inner: Mutex<T>,
}

impl<T> SpinLock<T> {
    /// Create a new unlocked lock
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Consume the lock and return the protected value
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ?Sized> SpinLock<T> {
    /// Raise to `DISPATCH_LEVEL` and spin until the lock is ours
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let gate = interrupt_gate();
        let old_irql = gate.raise(Irql::Dispatch);
        SpinLockGuard {
            inner: ManuallyDrop::new(self.inner.lock()),
            gate,
            old_irql,
        }
    }

    /// Single acquisition attempt; IRQL is untouched on failure
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let gate = interrupt_gate();
        let old_irql = gate.raise(Irql::Dispatch);
        match self.inner.try_lock() {
            Some(guard) => Some(SpinLockGuard {
                inner: ManuallyDrop::new(guard),
                gate,
                old_irql,
            }),
            None => {
                gate.lower(old_irql);
                None
            }
        }
    }

    /// Whether some processor currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Exclusive access without locking
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SpinLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock")
            .field("locked", &self.is_locked())
            .finish_non_exhaustive()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

// region: SpinLockGuard

/// Scoped ownership of a [`SpinLock`]
///
/// Dropping the guard releases the lock first, then restores the IRQL that
/// was current before acquisition.
pub struct SpinLockGuard<'a, T: ?Sized> {
    inner: ManuallyDrop<MutexGuard<'a, T>>,
    gate: &'static dyn InterruptGate,
    old_irql: Irql,
}

impl<T: ?Sized> SpinLockGuard<'_, T> {
    /// IRQL that will be restored on release
    pub fn saved_irql(&self) -> Irql {
        self.old_irql
    }
}

impl<T: ?Sized> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        // SAFETY: `inner` is dropped exactly once, here, and never touched again.
        unsafe { ManuallyDrop::drop(&mut self.inner) };
        self.gate.lower(self.old_irql);
    }
}

impl<T: ?Sized> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T: ?Sized> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SpinLockGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{current_irql, install_interrupt_gate};
    use core::cell::Cell;
    use std::sync::Arc;
    use std::thread;
    use std::vec::Vec;

    std::thread_local! {
        static LEVEL: Cell<Irql> = const { Cell::new(Irql::Passive) };
    }

    /// Each test thread stands in for one processor.
    struct ThreadGate;

    impl InterruptGate for ThreadGate {
        fn current(&self) -> Irql {
            LEVEL.with(|l| l.get())
        }

        fn raise(&self, new: Irql) -> Irql {
            LEVEL.with(|l| {
                let old = l.get();
                assert!(new >= old, "raise from {:?} to {:?}", old, new);
                l.set(new);
                old
            })
        }

        fn lower(&self, old: Irql) {
            LEVEL.with(|l| l.set(old));
        }
    }

    static GATE: ThreadGate = ThreadGate;

    fn with_thread_gate() {
        install_interrupt_gate(&GATE);
    }

    #[test]
    fn test_lock_raises_and_restores_irql() {
        with_thread_gate();
        let lock = SpinLock::new(0u32);

        assert_eq!(current_irql(), Irql::Passive);
        {
            let mut guard = lock.lock();
            *guard += 1;
            assert_eq!(current_irql(), Irql::Dispatch);
            assert_eq!(guard.saved_irql(), Irql::Passive);
            assert!(lock.is_locked());
        }
        assert_eq!(current_irql(), Irql::Passive);
        assert!(!lock.is_locked());
        assert_eq!(*lock.lock(), 1);
    }

    #[test]
    fn test_guard_released_on_early_return() {
        with_thread_gate();
        let lock = SpinLock::new(Vec::<u32>::new());

        fn first_even(lock: &SpinLock<Vec<u32>>) -> Option<u32> {
            let guard = lock.lock();
            for v in guard.iter() {
                if v % 2 == 0 {
                    return Some(*v);
                }
            }
            None
        }

        lock.lock().extend([1, 4, 5]);
        assert_eq!(first_even(&lock), Some(4));
        assert!(!lock.is_locked());
        assert_eq!(current_irql(), Irql::Passive);
    }

    #[test]
    fn test_try_lock_contended_leaves_irql_alone() {
        with_thread_gate();
        let lock = SpinLock::new(());
        let held = lock.lock();
        assert_eq!(current_irql(), Irql::Dispatch);
        assert!(lock.try_lock().is_none());
        assert_eq!(current_irql(), Irql::Dispatch);
        drop(held);
        assert_eq!(current_irql(), Irql::Passive);
        assert!(lock.try_lock().is_some());
    }

    #[test]
    fn test_mutual_exclusion() {
        with_thread_gate();
        let lock = Arc::new(SpinLock::new(0u64));
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *lock.lock() += 1;
                    }
                    assert_eq!(current_irql(), Irql::Passive);
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(*lock.lock(), 8000);
    }
}
