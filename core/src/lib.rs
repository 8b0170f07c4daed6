//! # Proxy KMD Core
//!
//! Foundations shared by every part of the WDDM proxy filter.
//!
//! The filter runs inside the display driver stack, so everything here is
//! `no_std`, never sleeps, and never allocates behind the caller's back.
//!
//! ## Components
//!
//! - **Status**: kernel status codes passed verbatim across the DDI boundary
//! - **Handle**: opaque kernel handles (`HANDLE`)
//! - **Error**: typed failures and their status mapping
//! - **Sync**: IRQL-aware spin lock with scoped release
//! - **Pool**: zero-initialising pool allocation with a matching free
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     proxykmd-core                        │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌─────────────┐  │
//! │  │  Status  │ │  Handle  │ │   Sync   │ │    Pool     │  │
//! │  │ (NTSTATUS│ │ (HANDLE) │ │(SpinLock,│ │(PoolBox,    │  │
//! │  │  + Error)│ │          │ │  Irql)   │ │ SystemPool) │  │
//! │  └──────────┘ └──────────┘ └──────────┘ └─────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(test)]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod error;
pub mod handle;
pub mod pool;
pub mod status;
pub mod sync;

// Re-exports for convenience
pub use error::{Error, Result};
pub use handle::Handle;
pub use pool::{PoolAllocator, PoolBox, SystemPool};
pub use status::NtStatus;
pub use sync::{Irql, SpinLock, SpinLockGuard};
