//! # DDI Types
//!
//! The slice of the display miniport interface the filter shadows.
//!
//! Layouts follow the kernel headers so a record can be copied out of a
//! miniport-owned structure by value. Fields added in later interface
//! versions are only meaningful when the negotiated
//! [`InterfaceVersion`] says so; [`CreateDeviceArgs::process_binding`]
//! is the one place that decision is made.

use core::fmt;
use core::ptr;

use bitflags::bitflags;
use bytemuck::Zeroable;
use proxykmd_core::Handle;

// =============================================================================
// INTERFACE VERSION
// =============================================================================

/// Negotiated `DXGKDDI_INTERFACE_VERSION`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Zeroable)]
#[repr(transparent)]
pub struct InterfaceVersion(pub u32);

impl InterfaceVersion {
    /// Windows Vista
    pub const VISTA: Self = Self(0x1052);
    /// Windows Vista SP1
    pub const VISTA_SP1: Self = Self(0x1053);
    /// Windows 7 (WDDM 1.1)
    pub const WIN7: Self = Self(0x2005);
    /// Windows 8 (WDDM 1.2)
    pub const WIN8: Self = Self(0x300E);
    /// WDDM 1.3
    pub const WDDM1_3: Self = Self(0x4002);
    /// WDDM 2.0, first version carrying the process binding fields
    pub const WDDM2_0: Self = Self(0x5023);

    /// Whether `Pasid` and `hKmdProcess` are valid in create-device calls
    #[inline]
    pub const fn supports_process_binding(self) -> bool {
        self.0 >= Self::WDDM2_0.0
    }
}

impl fmt::Debug for InterfaceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterfaceVersion(0x{:04x})", self.0)
    }
}

// =============================================================================
// FLAGS
// =============================================================================

bitflags! {
    /// `DXGK_CREATEDEVICEFLAGS`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CreateDeviceFlags: u32 {
        /// Device created by the kernel for its own use
        const SYSTEM_DEVICE = 1 << 0;
        /// Device backing GDI hardware acceleration
        const GDI_DEVICE = 1 << 1;
        /// Device created on behalf of a virtual machine
        const VIRTUAL_MACHINE_DEVICE = 1 << 2;
    }
}

bitflags! {
    /// `DXGK_DEVICEINFOFLAGS`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceInfoFlags: u32 {
        /// DMA buffer size and segment are fixed for the device's lifetime
        const GUARANTEED_DMA_BUFFER_CONTRACT = 1 << 0;
    }
}

// SAFETY: both flag types are a single u32 for which all-zero is `empty()`.
unsafe impl Zeroable for CreateDeviceFlags {}
// SAFETY: as above.
unsafe impl Zeroable for DeviceInfoFlags {}

// =============================================================================
// DEVICE INFO
// =============================================================================

/// `DXGK_DEVICEINFO`: sizing the miniport reports for a new device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Zeroable)]
#[repr(C)]
pub struct DeviceInfo {
    /// Entries in the allocation list
    pub allocation_list_size: u32,
    /// Entries in the patch-location list
    pub patch_location_list_size: u32,
    /// DMA buffer size in bytes
    pub dma_buffer_size: u32,
    /// Segments the DMA buffer may live in
    pub dma_buffer_segment_set: u32,
    /// Driver-private data appended to each DMA buffer
    pub dma_buffer_private_data_size: u32,
    /// Contract flags
    pub flags: DeviceInfoFlags,
}

static_assertions::assert_eq_size!(DeviceInfo, [u32; 6]);

// =============================================================================
// CREATE DEVICE
// =============================================================================

/// The two fields WDDM 2.0 added to device creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Zeroable)]
#[repr(C)]
pub struct ProcessBinding {
    /// Process address space identifier
    pub pasid: u32,
    /// Miniport's handle for the owning process
    pub kmd_process: Handle,
}

/// `DXGKARG_CREATEDEVICE`
///
/// One structure serves as both request and response. On entry `device`
/// holds the runtime's handle for the new device and `info` may point at a
/// caller-owned [`DeviceInfo`]; on success the miniport has overwritten
/// `device` with its own handle and may have pointed `info` at a structure
/// it owns.
#[derive(Debug, Clone, Copy)]
pub struct CreateDeviceArgs<'a> {
    /// In: runtime handle. Out: miniport handle
    pub device: Handle,
    /// Creation flags
    pub flags: CreateDeviceFlags,
    /// Valid only when the negotiated version supports it
    pub process: ProcessBinding,
    /// Device information pointer
    pub info: Option<&'a DeviceInfo>,
}

impl<'a> CreateDeviceArgs<'a> {
    /// Request for `device` with no process binding and no info pointer
    pub fn new(device: Handle, flags: CreateDeviceFlags) -> Self {
        Self {
            device,
            flags,
            process: ProcessBinding::default(),
            info: None,
        }
    }

    /// Attach the WDDM 2.0 process binding
    pub fn with_process(mut self, pasid: u32, kmd_process: Handle) -> Self {
        self.process = ProcessBinding { pasid, kmd_process };
        self
    }

    /// Supply an information structure
    pub fn with_info(mut self, info: &'a DeviceInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// The process binding, if `version` defines it
    #[inline]
    pub fn process_binding(&self, version: InterfaceVersion) -> Option<ProcessBinding> {
        version
            .supports_process_binding()
            .then_some(self.process)
    }

    /// Address of the current information structure, for identity checks
    #[inline]
    pub fn info_ptr(&self) -> *const DeviceInfo {
        self.info.map_or(ptr::null(), |info| info as *const DeviceInfo)
    }
}
