//! # Destroy-Device Interception
//!
//! `DxgkDdiDestroyDevice` passes straight through. Only once the miniport
//! reports success is the shadow record untracked; a failed destroy leaves
//! the device alive on both sides.

use proxykmd_core::{Error, Handle, NtStatus};

use super::registry::DeviceRegistry;
use crate::adapter::Adapter;
use crate::dbg_print;
use crate::diag::DebugLevel;

/// Pass a destroy-device call through, then drop the device's record
///
/// `device` is the miniport's handle, as returned by create. Returns the
/// miniport's status verbatim.
pub fn destroy_device(registry: &DeviceRegistry, adapter: &Adapter, device: Handle) -> NtStatus {
    proxykmd_core::assert_paged_code!();

    if registry.find_by_handle(device).is_none() {
        dbg_print!(adapter, DebugLevel::Warning, "destroy_device: {}", Error::NotFound(device));
    }

    let status = adapter.miniport().destroy_device(device);
    if !status.is_success() {
        dbg_print!(
            adapter,
            DebugLevel::Error,
            "destroy_device: hDevice({}): {}",
            device,
            Error::Delegate(status)
        );
        return status;
    }

    if let Some(record) = registry.remove(device) {
        dbg_print!(
            adapter,
            DebugLevel::Flow,
            "hDevice({})/hRTDevice({}) untracked",
            record.real_handle(),
            record.shadow_handle()
        );
    }
    status
}
