//! # Status Codes
//!
//! Kernel status values as they cross the DDI boundary.
//!
//! The filter never invents a status for a call it delegated: whatever the
//! wrapped miniport returns is handed back unchanged. The constants here
//! cover only the codes the filter itself produces or tests against.

use core::fmt;

/// Kernel status code (`NTSTATUS`)
///
/// Negative values (warning and error severities) fail `NT_SUCCESS`;
/// success and informational codes pass it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NtStatus(i32);

static_assertions::assert_eq_size!(NtStatus, i32);

impl NtStatus {
    /// `STATUS_SUCCESS`
    pub const SUCCESS: Self = Self(0);
    /// `STATUS_UNSUCCESSFUL`
    pub const UNSUCCESSFUL: Self = Self::from_bits(0xC000_0001);
    /// `STATUS_INVALID_HANDLE`
    pub const INVALID_HANDLE: Self = Self::from_bits(0xC000_0008);
    /// `STATUS_INVALID_PARAMETER`
    pub const INVALID_PARAMETER: Self = Self::from_bits(0xC000_000D);
    /// `STATUS_NO_MEMORY`
    pub const NO_MEMORY: Self = Self::from_bits(0xC000_0017);
    /// `STATUS_NOT_FOUND`
    pub const NOT_FOUND: Self = Self::from_bits(0xC000_0225);

    /// Wrap a raw signed status
    #[inline]
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Wrap a status given as its unsigned bit pattern
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits as i32)
    }

    /// Raw signed value
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Unsigned bit pattern, as printed by kernel debuggers
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0 as u32
    }

    /// `NT_SUCCESS`
    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Inverse of [`NtStatus::is_success`]
    #[inline]
    pub const fn is_error(self) -> bool {
        !self.is_success()
    }
}

impl Default for NtStatus {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl fmt::Debug for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NtStatus(0x{:08x})", self.bits())
    }
}

impl fmt::Display for NtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;

    #[test]
    fn test_success_follows_sign_bit() {
        assert!(NtStatus::SUCCESS.is_success());
        assert!(NtStatus::new(0x0000_0103).is_success()); // STATUS_PENDING
        assert!(NtStatus::from_bits(0x8000_0005).is_error()); // buffer overflow warning
        assert!(NtStatus::NO_MEMORY.is_error());
        assert!(NtStatus::UNSUCCESSFUL.is_error());
    }

    #[test]
    fn test_display_is_hex_bit_pattern() {
        assert_eq!(format!("{}", NtStatus::NO_MEMORY), "0xc0000017");
        assert_eq!(format!("{:?}", NtStatus::SUCCESS), "NtStatus(0x00000000)");
        assert_eq!(NtStatus::NO_MEMORY.bits(), 0xC000_0017);
    }
}
