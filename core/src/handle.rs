//! # Kernel Handles
//!
//! Opaque handle values exchanged with the graphics kernel and the wrapped
//! miniport. The filter never dereferences them; it only stores and
//! compares them.

use core::fmt;

use bytemuck::Zeroable;

/// Opaque kernel handle (`HANDLE`)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Zeroable)]
#[repr(transparent)]
pub struct Handle(usize);

static_assertions::assert_eq_size!(Handle, usize);

impl Handle {
    /// The null handle
    pub const NULL: Self = Self(0);

    /// Wrap a raw handle value
    #[inline]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Raw handle value
    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    /// Check if null
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle(0x{:x})", self.0)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl From<usize> for Handle {
    fn from(raw: usize) -> Self {
        Self(raw)
    }
}
