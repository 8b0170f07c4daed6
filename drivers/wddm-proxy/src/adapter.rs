//! # Adapter Context
//!
//! The filter's view of one display adapter and the miniport behind it.
//!
//! Adapter enumeration and `DxgkDdiAddDevice`/`StartDevice` handling live
//! outside this crate; whoever performs them builds an [`Adapter`] and
//! passes it to every device-lifecycle call for that adapter.

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use proxykmd_core::{Handle, NtStatus};

use crate::config::FilterConfig;
use crate::ddi::{CreateDeviceArgs, InterfaceVersion};
use crate::diag::{DebugLevel, DebugScope};

// =============================================================================
// MINIPORT TRAIT
// =============================================================================

/// Device-lifecycle entry points of the wrapped miniport
///
/// These are called exactly as the graphics kernel would call them; the
/// filter never alters arguments on the way in and returns the status it
/// gets back unchanged.
pub trait Miniport: Send + Sync {
    /// Interface version negotiated with the graphics kernel
    fn interface_version(&self) -> InterfaceVersion;

    /// `DxgkDdiCreateDevice`
    ///
    /// On success `args.device` holds the miniport's device handle and
    /// `args.info` may have been pointed at a structure the miniport owns.
    fn create_device<'a>(&'a self, adapter: Handle, args: &mut CreateDeviceArgs<'a>) -> NtStatus;

    /// `DxgkDdiDestroyDevice`
    fn destroy_device(&self, device: Handle) -> NtStatus;
}

// =============================================================================
// ADAPTER
// =============================================================================

/// Per-adapter context
pub struct Adapter {
    /// Miniport's adapter handle (`hAdapter` in DDI calls)
    handle: Handle,
    /// The wrapped implementation
    miniport: Arc<dyn Miniport>,
    /// Captured once at attach time
    version: InterfaceVersion,
    /// Verbosity for messages about this adapter
    debug_level: AtomicU8,
}

impl Adapter {
    /// Attach to a miniport adapter
    ///
    /// The negotiated interface version is read once here and used for
    /// every later call on this adapter.
    pub fn new(handle: Handle, miniport: Arc<dyn Miniport>, config: &FilterConfig) -> Self {
        let version = miniport.interface_version();
        Self {
            handle,
            miniport,
            version,
            debug_level: AtomicU8::new(config.debug_level as u8),
        }
    }

    /// Miniport's adapter handle
    #[inline]
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// The wrapped miniport
    #[inline]
    pub fn miniport(&self) -> &dyn Miniport {
        &*self.miniport
    }

    /// Negotiated interface version
    #[inline]
    pub fn interface_version(&self) -> InterfaceVersion {
        self.version
    }

    /// Change the verbosity for this adapter
    pub fn set_debug_level(&self, level: DebugLevel) {
        self.debug_level.store(level as u8, Ordering::Relaxed);
    }
}

impl DebugScope for Adapter {
    fn debug_level(&self) -> DebugLevel {
        match self.debug_level.load(Ordering::Relaxed) {
            0 => DebugLevel::Off,
            1 => DebugLevel::Error,
            2 => DebugLevel::Warning,
            3 => DebugLevel::Info,
            _ => DebugLevel::Flow,
        }
    }
}

impl fmt::Debug for Adapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("handle", &self.handle)
            .field("version", &self.version)
            .field("debug_level", &self.debug_level())
            .finish_non_exhaustive()
    }
}
