//! # WDDM Proxy Filter
//!
//! A display miniport filter that sits between the graphics kernel and an
//! inbox miniport driver. Every device-lifecycle call is passed through
//! unchanged; on the way back the filter shadows each device the miniport
//! created in a spin-lock protected registry that later filter stages
//! query by the miniport's device handle.
//!
//! ```text
//!   graphics kernel
//!         │  DxgkDdiCreateDevice / DxgkDdiDestroyDevice
//!         ▼
//!  ┌──────────────────────────────────────────────┐
//!  │ ProxyFilter                                  │
//!  │   device::create_device ─┐                   │
//!  │   device::destroy_device ┼─► DeviceRegistry  │
//!  │   find_device ───────────┘   (SpinLock)      │
//!  └──────────────────────┬───────────────────────┘
//!                         ▼
//!                  Adapter ─► dyn Miniport
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let filter = ProxyFilter::load(FilterConfig::new(), Arc::new(SystemPool));
//! let adapter = filter.attach_adapter(adapter_handle, miniport);
//!
//! let mut args = CreateDeviceArgs::new(runtime_handle, CreateDeviceFlags::empty());
//! let status = filter.create_device(&adapter, &mut args);
//! if status.is_success() {
//!     let record = filter.find_device(args.device);
//! }
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod adapter;
pub mod config;
pub mod ddi;
pub mod device;
pub mod diag;
pub mod filter;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{Adapter, Miniport};
pub use config::FilterConfig;
pub use ddi::{CreateDeviceArgs, CreateDeviceFlags, DeviceInfo, DeviceInfoFlags, InterfaceVersion, ProcessBinding};
pub use device::{DeviceRecord, DeviceRef, DeviceRegistry, PendingDevice};
pub use diag::{DebugLevel, DebugScope};
pub use filter::ProxyFilter;
pub use proxykmd_core::{Error, Handle, NtStatus, PoolAllocator, SystemPool};
