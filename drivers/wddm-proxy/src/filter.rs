//! # Filter Lifecycle
//!
//! [`ProxyFilter`] is what a driver entry point builds at load and tears
//! down at unload. It owns the one device registry and hands it to every
//! device-lifecycle call.

use alloc::sync::Arc;
use core::fmt;

use proxykmd_core::{Handle, NtStatus, PoolAllocator};

use crate::adapter::{Adapter, Miniport};
use crate::config::FilterConfig;
use crate::dbg_print;
use crate::ddi::CreateDeviceArgs;
use crate::device::{create_device, destroy_device, DeviceRef, DeviceRegistry};
use crate::diag::{DebugLevel, DebugScope};

/// A loaded proxy filter
pub struct ProxyFilter {
    config: FilterConfig,
    registry: DeviceRegistry,
}

impl ProxyFilter {
    /// Load the filter, drawing device records from `pool`
    pub fn load(config: FilterConfig, pool: Arc<dyn PoolAllocator>) -> Self {
        let filter = Self {
            config,
            registry: DeviceRegistry::new(pool),
        };
        dbg_print!(filter, DebugLevel::Info, "proxy filter loaded ({:?})", config);
        filter
    }

    /// Load-time settings
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// The device registry, for later filter stages
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Build the context for an adapter driven by `miniport`
    pub fn attach_adapter(&self, handle: Handle, miniport: Arc<dyn Miniport>) -> Adapter {
        let adapter = Adapter::new(handle, miniport, &self.config);
        dbg_print!(
            self,
            DebugLevel::Info,
            "adapter {} attached, interface {:?}",
            handle,
            adapter.interface_version()
        );
        adapter
    }

    /// `DxgkDdiCreateDevice`
    pub fn create_device<'a>(&self, adapter: &'a Adapter, args: &mut CreateDeviceArgs<'a>) -> NtStatus {
        create_device(&self.registry, adapter, args)
    }

    /// `DxgkDdiDestroyDevice`
    pub fn destroy_device(&self, adapter: &Adapter, device: Handle) -> NtStatus {
        destroy_device(&self.registry, adapter, device)
    }

    /// Record for the miniport device handle `device`
    pub fn find_device(&self, device: Handle) -> Option<DeviceRef<'_>> {
        self.registry.find_by_handle(device)
    }

    /// Tear down, returning how many devices were never destroyed
    ///
    /// Leaked records are freed here. With `break_on_leak` set, a leak
    /// also trips a debug assertion.
    pub fn unload(self) -> usize {
        let leaked = self.registry.drain();
        if leaked != 0 {
            dbg_print!(
                self,
                DebugLevel::Warning,
                "unload: {} device record(s) still tracked",
                leaked
            );
            if self.config.break_on_leak {
                debug_assert_eq!(leaked, 0, "device records leaked at unload");
            }
        }
        dbg_print!(self, DebugLevel::Info, "proxy filter unloaded");
        leaked
    }
}

impl DebugScope for ProxyFilter {
    fn debug_level(&self) -> DebugLevel {
        self.config.debug_level
    }
}

impl fmt::Debug for ProxyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyFilter")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}
