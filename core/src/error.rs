//! # Error Handling
//!
//! Typed failures for the proxy filter.
//!
//! Error handling follows these rules:
//! - A failure reported by the wrapped miniport is carried verbatim and
//!   handed back with its original status
//! - No panics on DDI paths
//! - Errors are `Copy` and `no_std` compatible
//! - A lookup miss is `Option::None`, not an error

use core::fmt;

use crate::handle::Handle;
use crate::status::NtStatus;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// Filter result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// Filter error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Shadow state could not be allocated
    ResourceExhausted,
    /// The wrapped miniport failed the delegated call
    Delegate(NtStatus),
    /// The handle is not tracked by the filter
    NotFound(Handle),
}

impl Error {
    /// Status to return across the DDI boundary
    ///
    /// [`Error::Delegate`] hands back the miniport's own status untouched.
    pub const fn status(self) -> NtStatus {
        match self {
            Self::ResourceExhausted => NtStatus::NO_MEMORY,
            Self::Delegate(status) => status,
            Self::NotFound(_) => NtStatus::NOT_FOUND,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceExhausted => write!(f, "out of pool memory"),
            Self::Delegate(status) => write!(f, "miniport failed with {}", status),
            Self::NotFound(handle) => write!(f, "handle {} not tracked", handle),
        }
    }
}

// =============================================================================
// ERROR CONVERSION
// =============================================================================

impl From<Error> for NtStatus {
    fn from(e: Error) -> Self {
        e.status()
    }
}
