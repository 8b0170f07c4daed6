//! # Create-Device Interception
//!
//! `DxgkDdiCreateDevice` as seen by the filter: allocate a shadow record,
//! let the miniport create the device, and track the result.

use proxykmd_core::{Error, NtStatus};

use super::registry::DeviceRegistry;
use crate::adapter::Adapter;
use crate::ddi::CreateDeviceArgs;
use crate::diag::DebugLevel;
use crate::dbg_print;

/// Pass a create-device call through to the miniport, tracking the device
///
/// The status returned is the miniport's, unchanged, unless the shadow
/// record could not be allocated; then the miniport is never called and
/// `NO_MEMORY` is returned. A failed call leaves the registry untouched.
///
/// On success `args.device` holds the miniport's handle, which is also
/// the key the record is tracked under.
pub fn create_device<'a>(
    registry: &DeviceRegistry,
    adapter: &'a Adapter,
    args: &mut CreateDeviceArgs<'a>,
) -> NtStatus {
    proxykmd_core::assert_paged_code!();

    let mut pending = match registry.allocate() {
        Ok(pending) => pending,
        Err(err) => {
            dbg_print!(
                adapter,
                DebugLevel::Error,
                "create_device: hRTDevice({}): {}",
                args.device,
                err
            );
            return err.status();
        }
    };

    pending.record_mut().capture_request(adapter, args);
    let supplied_info = args.info_ptr();

    let status = adapter.miniport().create_device(adapter.handle(), args);
    if !status.is_success() {
        drop(pending);
        dbg_print!(
            adapter,
            DebugLevel::Error,
            "create_device: hRTDevice({}): {}",
            args.device,
            Error::Delegate(status)
        );
        return status;
    }

    let record = pending.record_mut();
    record.set_real_handle(args.device);
    if args.info_ptr() != supplied_info {
        if let Some(info) = args.info {
            record.set_device_info(*info);
        }
    }
    let (shadow, real, flags) = (record.shadow_handle(), record.real_handle(), record.flags());

    registry.insert(pending);

    dbg_print!(
        adapter,
        DebugLevel::Flow,
        "hDevice({})/hRTDevice({})/Flags(0x{:x}) tracked",
        real,
        shadow,
        flags.bits()
    );
    status
}
