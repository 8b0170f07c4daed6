//! # Diagnostics
//!
//! Leveled trace output routed through the `log` facade.
//!
//! Every message is filtered twice: first by the verbosity configured for
//! the adapter (or the filter) it concerns, then by whatever logger the
//! host installed. Emitting a message never fails the operation that
//! produced it.

#[doc(hidden)]
pub use log as __log;

/// Log target for everything the filter emits
pub const LOG_TARGET: &str = "wddm_proxy";

/// Filter verbosity, from silent to per-call flow tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum DebugLevel {
    /// Nothing
    Off     = 0,
    /// Failures only
    #[default]
    Error   = 1,
    /// Suspicious but tolerated conditions
    Warning = 2,
    /// Lifecycle milestones
    Info    = 3,
    /// Every tracked call
    Flow    = 4,
}

impl DebugLevel {
    /// Whether a message at `message` passes a filter set to `self`
    #[inline]
    pub const fn admits(self, message: DebugLevel) -> bool {
        !matches!(message, DebugLevel::Off) && message as u8 <= self as u8
    }

    /// `log` level used when emitting at this verbosity
    #[inline]
    pub const fn log_level(self) -> log::Level {
        match self {
            DebugLevel::Off | DebugLevel::Error => log::Level::Error,
            DebugLevel::Warning => log::Level::Warn,
            DebugLevel::Info => log::Level::Info,
            DebugLevel::Flow => log::Level::Debug,
        }
    }
}

/// Anything that carries its own verbosity setting
pub trait DebugScope {
    /// Configured verbosity
    fn debug_level(&self) -> DebugLevel;
}

impl<T: DebugScope + ?Sized> DebugScope for &T {
    fn debug_level(&self) -> DebugLevel {
        (**self).debug_level()
    }
}

/// Emit a diagnostic if `$scope`'s verbosity admits `$level`
///
/// ```ignore
/// dbg_print!(adapter, DebugLevel::Error, "failed with {}", status);
/// ```
#[macro_export]
macro_rules! dbg_print {
    ($scope:expr, $level:expr, $($arg:tt)+) => {{
        let level: $crate::diag::DebugLevel = $level;
        if $crate::diag::DebugScope::debug_level(&$scope).admits(level) {
            $crate::diag::__log::log!(
                target: $crate::diag::LOG_TARGET,
                level.log_level(),
                $($arg)+
            );
        }
    }};
}
