//! Interrupt request levels and the platform hook that changes them.

use core::fmt;

/// Interrupt request level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Irql {
    /// Thread context, paging allowed
    Passive  = 0,
    /// APCs masked
    Apc      = 1,
    /// Scheduler masked, no paging, no blocking
    Dispatch = 2,
    /// Device interrupt levels
    Device   = 3,
}

impl fmt::Display for Irql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Passive => "PASSIVE_LEVEL",
            Self::Apc => "APC_LEVEL",
            Self::Dispatch => "DISPATCH_LEVEL",
            Self::Device => "DIRQL",
        };
        f.write_str(name)
    }
}

/// Platform hook for reading and changing the current processor's IRQL
///
/// Raise and lower always come in matched pairs; `lower` receives the value
/// the paired `raise` returned.
pub trait InterruptGate: Sync {
    /// Level of the current processor
    fn current(&self) -> Irql;

    /// Raise to `new` (never lowers) and return the previous level
    fn raise(&self, new: Irql) -> Irql;

    /// Return to a level previously handed out by [`InterruptGate::raise`]
    fn lower(&self, old: Irql);
}

/// Gate used until the platform installs one; hosted builds stay here.
#[derive(Debug)]
struct PassiveGate;

impl InterruptGate for PassiveGate {
    fn current(&self) -> Irql {
        Irql::Passive
    }

    fn raise(&self, _new: Irql) -> Irql {
        Irql::Passive
    }

    fn lower(&self, _old: Irql) {}
}

static PASSIVE_GATE: PassiveGate = PassiveGate;
static GATE: spin::Once<&'static dyn InterruptGate> = spin::Once::new();

/// Install the platform gate
///
/// Only the first call wins; returns `false` if a gate was already set.
pub fn install_interrupt_gate(gate: &'static dyn InterruptGate) -> bool {
    let mut installed = false;
    GATE.call_once(|| {
        installed = true;
        gate
    });
    if installed {
        log::debug!("interrupt gate installed");
    }
    installed
}

/// The active gate
#[inline]
pub fn interrupt_gate() -> &'static dyn InterruptGate {
    match GATE.get() {
        Some(gate) => *gate,
        None => &PASSIVE_GATE,
    }
}

/// Current IRQL as reported by the active gate
#[inline]
pub fn current_irql() -> Irql {
    interrupt_gate().current()
}
