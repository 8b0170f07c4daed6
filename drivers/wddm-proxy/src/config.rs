//! # Filter Configuration
//!
//! Load-time settings handed to [`crate::ProxyFilter::load`].

use crate::diag::{DebugLevel, DebugScope};

/// Settings fixed for the lifetime of a loaded filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// Verbosity for filter-wide messages and the default for new adapters
    pub debug_level: DebugLevel,
    /// Debug-assert at unload if device records are still tracked
    pub break_on_leak: bool,
}

impl FilterConfig {
    /// Errors only, leaks reported but tolerated
    pub const fn new() -> Self {
        Self {
            debug_level: DebugLevel::Error,
            break_on_leak: false,
        }
    }

    /// Set the verbosity
    pub const fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.debug_level = level;
        self
    }

    /// Set whether leaked records at unload are fatal in debug builds
    pub const fn with_break_on_leak(mut self, enabled: bool) -> Self {
        self.break_on_leak = enabled;
        self
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugScope for FilterConfig {
    fn debug_level(&self) -> DebugLevel {
        self.debug_level
    }
}
