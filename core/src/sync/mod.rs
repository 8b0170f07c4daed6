//! # Synchronization
//!
//! Locking for code that may run at raised IRQL.
//!
//! Nothing in here blocks or parks the caller. A [`SpinLock`] raises the
//! processor to [`Irql::Dispatch`] before spinning and drops back to the
//! saved level when its guard goes out of scope, on every exit path.

mod irql;
mod spinlock;

pub use self::irql::{current_irql, install_interrupt_gate, interrupt_gate, InterruptGate, Irql};
pub use self::spinlock::{SpinLock, SpinLockGuard};

/// Debug-assert that the caller may touch pageable memory
///
/// Pageable DDI entry points must be entered below `DISPATCH_LEVEL`.
#[macro_export]
macro_rules! assert_paged_code {
    () => {
        debug_assert!(
            $crate::sync::current_irql() < $crate::sync::Irql::Dispatch,
            "pageable code entered at {:?}",
            $crate::sync::current_irql()
        )
    };
}
