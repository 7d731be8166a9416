//! The process-wide suspension state machine.
//!
//! ```text
//! Running -> SuspendRequested -> AllThreadsSafe -> Suspended -> Resuming -> Running
//!    \______________________________________________________________________/
//!                                   |
//!                              Terminated   (only through fatal-error escalation)
//! ```

use bytemuck::NoUninit;
use enum_map::Enum;
use strum_macros::{EnumCount, EnumIter, IntoStaticStr};

/// The state of the execution engine as seen by the collector.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, NoUninit, IntoStaticStr)]
pub enum SuspensionState {
    /// Mutators run freely.
    Running,
    /// A suspension has been requested. Threads returning to cooperative mode are trapped.
    SuspendRequested,
    /// Every thread has been observed in preemptive mode or parked at a safepoint.
    AllThreadsSafe,
    /// The execution engine is stopped. Roots may be enumerated.
    Suspended,
    /// The host is releasing the parked threads.
    Resuming,
    /// A fatal error was escalated. This state is never left.
    Terminated,
}

impl SuspensionState {
    /// Is `to` the next state of `self` in the suspension cycle?
    pub fn can_transition_to(self, to: SuspensionState) -> bool {
        use SuspensionState::*;
        matches!(
            (self, to),
            (Running, SuspendRequested)
                | (SuspendRequested, AllThreadsSafe)
                | (AllThreadsSafe, Suspended)
                | (Suspended, Resuming)
                | (Resuming, Running)
        ) || (to == Terminated && self != Terminated)
    }

    pub fn is_suspended(self) -> bool {
        self == SuspensionState::Suspended
    }
}

/// Why the execution engine is being suspended. The discriminants are the values the host
/// protocol uses for `SUSPEND_REASON`.
#[repr(u8)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, NoUninit, Enum, EnumCount, EnumIter, IntoStaticStr,
)]
pub enum SuspendReason {
    Other = 0,
    ForGC = 1,
    ForAppDomainShutdown = 2,
    ForRejit = 3,
    ForShutdown = 4,
    ForDebugger = 5,
    ForGCPrep = 6,
    ForDebuggerSweep = 7,
}
