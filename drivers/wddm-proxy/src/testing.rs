//! Test doubles for the miniport, the pool and the logger.

use core::alloc::Layout;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use proxykmd_core::{Handle, NtStatus, PoolAllocator, SystemPool};
use std::string::{String, ToString};
use std::vec::Vec;

use crate::adapter::Miniport;
use crate::ddi::{CreateDeviceArgs, DeviceInfo, InterfaceVersion};

/// First handle [`StubMiniport`] hands out
pub const FIRST_REAL_HANDLE: usize = 0x1000;

/// Scriptable, call-counting miniport
#[derive(Debug)]
pub struct StubMiniport {
    version: InterfaceVersion,
    create_status: AtomicI32,
    destroy_status: AtomicI32,
    create_calls: AtomicUsize,
    destroy_calls: AtomicUsize,
    next_handle: AtomicUsize,
    /// Pointed to by `args.info` on successful creates, if set
    own_info: Option<DeviceInfo>,
}

impl StubMiniport {
    pub fn new(version: InterfaceVersion) -> Self {
        Self {
            version,
            create_status: AtomicI32::new(NtStatus::SUCCESS.raw()),
            destroy_status: AtomicI32::new(NtStatus::SUCCESS.raw()),
            create_calls: AtomicUsize::new(0),
            destroy_calls: AtomicUsize::new(0),
            next_handle: AtomicUsize::new(FIRST_REAL_HANDLE),
            own_info: None,
        }
    }

    /// Number devices from `first` instead of [`FIRST_REAL_HANDLE`]
    pub fn with_first_handle(self, first: usize) -> Self {
        self.next_handle.store(first, Ordering::SeqCst);
        self
    }

    /// Replace the caller's info pointer with one owned by the stub
    pub fn with_own_info(mut self, info: DeviceInfo) -> Self {
        self.own_info = Some(info);
        self
    }

    pub fn fail_create(&self, status: NtStatus) {
        self.create_status.store(status.raw(), Ordering::SeqCst);
    }

    pub fn fail_destroy(&self, status: NtStatus) {
        self.destroy_status.store(status.raw(), Ordering::SeqCst);
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_calls(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }
}

impl Miniport for StubMiniport {
    fn interface_version(&self) -> InterfaceVersion {
        self.version
    }

    fn create_device<'a>(&'a self, _adapter: Handle, args: &mut CreateDeviceArgs<'a>) -> NtStatus {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let status = NtStatus::new(self.create_status.load(Ordering::SeqCst));
        if !status.is_success() {
            return status;
        }

        args.device = Handle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        if let Some(info) = &self.own_info {
            args.info = Some(info);
        }
        status
    }

    fn destroy_device(&self, _device: Handle) -> NtStatus {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        NtStatus::new(self.destroy_status.load(Ordering::SeqCst))
    }
}

/// System pool that counts live blocks and can be told to run dry
#[derive(Debug, Default)]
pub struct CountingPool {
    live: AtomicUsize,
    exhausted: AtomicBool,
}

impl CountingPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn set_exhausted(&self, exhausted: bool) {
        self.exhausted.store(exhausted, Ordering::SeqCst);
    }
}

impl PoolAllocator for CountingPool {
    fn allocate_zeroed(&self, layout: Layout) -> Option<NonNull<u8>> {
        if self.exhausted.load(Ordering::SeqCst) {
            return None;
        }
        let block = SystemPool.allocate_zeroed(layout)?;
        self.live.fetch_add(1, Ordering::SeqCst);
        Some(block)
    }

    unsafe fn free(&self, ptr: NonNull<u8>, layout: Layout) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        unsafe { SystemPool.free(ptr, layout) }
    }
}

/// One message as the host logger saw it
#[derive(Debug, Clone)]
pub struct Captured {
    pub target: String,
    pub level: log::Level,
    pub message: String,
}

/// Host logger that keeps every record
struct CapturingLogger {
    records: spin::Mutex<Vec<Captured>>,
}

impl log::Log for CapturingLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        self.records.lock().push(Captured {
            target: record.target().to_string(),
            level: record.level(),
            message: record.args().to_string(),
        });
    }

    fn flush(&self) {}
}

static LOGGER: CapturingLogger = CapturingLogger {
    records: spin::Mutex::new(Vec::new()),
};
static LOGGER_INSTALLED: spin::Once = spin::Once::new();

/// Route all `log` output in this test binary into the capture buffer
pub fn capture_logs() {
    LOGGER_INSTALLED.call_once(|| {
        log::set_logger(&LOGGER).expect("no other logger in the test binary");
        log::set_max_level(log::LevelFilter::Trace);
    });
}

/// Captured records whose text contains `needle`
///
/// Tests run in parallel against one logger, so callers pick handle values
/// no other test uses and search for them.
pub fn logs_mentioning(needle: &str) -> Vec<Captured> {
    LOGGER
        .records
        .lock()
        .iter()
        .filter(|record| record.message.contains(needle))
        .cloned()
        .collect()
}
