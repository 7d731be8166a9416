use crate::suspension::SuspensionState;
use crate::util::Address;

use std::fmt;

/// A misuse of the collector/host protocol.
///
/// These are programming errors on one side of the boundary. The coordinator reports them
/// instead of proceeding, but does not attempt to repair the suspension state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    /// A suspension was requested while another one is in progress.
    NestedSuspension,
    /// An operation that requires the execution engine to be suspended was called while it is not.
    NotSuspended,
    /// The suspension state machine was found in a state that does not allow the transition.
    IllegalTransition {
        from: SuspensionState,
        to: SuspensionState,
    },
    /// The host reported the same root slot twice in one scan.
    DuplicateRoot { slot: Address, scan_id: usize },
    /// A fatal error has been escalated. No further protocol operation is allowed.
    Terminated,
}

impl fmt::Display for ProtocolViolation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProtocolViolation::NestedSuspension => {
                write!(f, "the execution engine is already being suspended")
            }
            ProtocolViolation::NotSuspended => write!(f, "the execution engine is not suspended"),
            ProtocolViolation::IllegalTransition { from, to } => {
                write!(f, "illegal suspension state transition {:?} -> {:?}", from, to)
            }
            ProtocolViolation::DuplicateRoot { slot, scan_id } => {
                write!(f, "root slot {} reported twice in scan {}", slot, scan_id)
            }
            ProtocolViolation::Terminated => {
                write!(f, "a fatal error has been raised, the collector is terminated")
            }
        }
    }
}

impl std::error::Error for ProtocolViolation {}
