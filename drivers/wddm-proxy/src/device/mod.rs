//! # Device Tracking
//!
//! Shadow state for every device the wrapped miniport creates.
//!
//! ## Lifecycle
//!
//! ```text
//!  create_device ──► DeviceRegistry::allocate ──► miniport create
//!                                                   │
//!                         failure: record freed ◄───┤
//!                                                   ▼
//!                               DeviceRegistry::insert (tail, under lock)
//!                                                   │
//!  destroy_device ──► miniport destroy ──► DeviceRegistry::remove
//! ```
//!
//! A [`DeviceRecord`] is filled in before it becomes visible and never
//! changes afterwards.

pub mod create;
pub mod destroy;
pub mod registry;

pub use create::create_device;
pub use destroy::destroy_device;
pub use registry::{DeviceRef, DeviceRegistry, PendingDevice};

use bytemuck::Zeroable;
use proxykmd_core::Handle;

use crate::adapter::Adapter;
use crate::ddi::{CreateDeviceArgs, CreateDeviceFlags, DeviceInfo, InterfaceVersion, ProcessBinding};

/// Filter-private shadow of one device
///
/// All-zero is the valid "nothing captured yet" state the pool hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Zeroable)]
#[repr(C)]
pub struct DeviceRecord {
    /// Runtime handle the caller supplied at creation
    shadow: Handle,
    /// Handle the miniport assigned
    real: Handle,
    /// Owning adapter (`hAdapter`)
    adapter: Handle,
    /// Version negotiated on the owning adapter
    version: InterfaceVersion,
    /// Creation flags
    flags: CreateDeviceFlags,
    /// Zero unless the negotiated version defines it
    process: ProcessBinding,
    /// Miniport-owned info copied by value
    info: DeviceInfo,
    /// Whether `info` holds a copy
    has_info: bool,
}

impl DeviceRecord {
    /// Runtime handle the caller supplied at creation
    #[inline]
    pub fn shadow_handle(&self) -> Handle {
        self.shadow
    }

    /// Handle the miniport assigned; the registry key
    #[inline]
    pub fn real_handle(&self) -> Handle {
        self.real
    }

    /// Owning adapter's handle
    #[inline]
    pub fn adapter_handle(&self) -> Handle {
        self.adapter
    }

    /// Creation flags
    #[inline]
    pub fn flags(&self) -> CreateDeviceFlags {
        self.flags
    }

    /// Interface version in force when the device was created
    #[inline]
    pub fn interface_version(&self) -> InterfaceVersion {
        self.version
    }

    /// The WDDM 2.0 process binding, if the version defines it
    #[inline]
    pub fn process_binding(&self) -> Option<ProcessBinding> {
        self.version.supports_process_binding().then_some(self.process)
    }

    /// Raw process binding storage, zero when not captured
    #[inline]
    pub fn process_fields(&self) -> ProcessBinding {
        self.process
    }

    /// Shadow copy of the miniport's device info, if it supplied its own
    #[inline]
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.has_info.then_some(&self.info)
    }

    /// Copy the request side of a create call
    pub(crate) fn capture_request(&mut self, adapter: &Adapter, args: &CreateDeviceArgs<'_>) {
        self.shadow = args.device;
        self.adapter = adapter.handle();
        self.version = adapter.interface_version();
        self.flags = args.flags;
        if let Some(binding) = args.process_binding(self.version) {
            self.process = binding;
        }
    }

    pub(crate) fn set_real_handle(&mut self, real: Handle) {
        self.real = real;
    }

    pub(crate) fn set_device_info(&mut self, info: DeviceInfo) {
        self.info = info;
        self.has_info = true;
    }
}
