use crate::suspension::{SuspendReason, SuspensionState};

use atomic::Atomic;
use enum_map::EnumMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// This stores the collector-side state of the protocol. A [`crate::Coordinator`] owns one,
/// and it is the single source of truth about whether the execution engine is suspended.
pub struct GlobalState {
    /// The suspension state. All transitions are compare-and-swap, so at most one suspension
    /// can be in progress.
    state: Atomic<SuspensionState>,
    /// The reason of the current (or last) suspension.
    reason: Atomic<SuspendReason>,
    /// The number of completed collections. Also the index reported to the diagnostics hooks.
    gc_index: AtomicUsize,
    /// Is a collection between `begin_collection` and `end_collection`?
    in_collection: AtomicBool,
    /// Identifier of the last root scan.
    scan_id: AtomicUsize,
    /// Number of suspensions per reason.
    suspensions: EnumMap<SuspendReason, AtomicUsize>,
}

impl GlobalState {
    pub fn state(&self) -> SuspensionState {
        self.state.load(Ordering::SeqCst)
    }

    pub fn is_suspended(&self) -> bool {
        self.state().is_suspended()
    }

    pub fn is_terminated(&self) -> bool {
        self.state() == SuspensionState::Terminated
    }

    /// Move from `from` to `to`. Fails with the state actually found if it is not `from`.
    pub(crate) fn transition(
        &self,
        from: SuspensionState,
        to: SuspensionState,
    ) -> Result<(), SuspensionState> {
        debug_assert!(from.can_transition_to(to), "{:?} -> {:?}", from, to);
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
    }

    /// Enter the terminal state. Returns the state we left.
    pub(crate) fn terminate(&self) -> SuspensionState {
        self.state.swap(SuspensionState::Terminated, Ordering::SeqCst)
    }

    pub(crate) fn set_reason(&self, reason: SuspendReason) {
        self.reason.store(reason, Ordering::Relaxed);
        self.suspensions[reason].fetch_add(1, Ordering::Relaxed);
    }

    pub fn reason(&self) -> SuspendReason {
        self.reason.load(Ordering::Relaxed)
    }

    /// How many times the execution engine has been suspended for the given reason.
    pub fn suspension_count(&self, reason: SuspendReason) -> usize {
        self.suspensions[reason].load(Ordering::Relaxed)
    }

    pub fn gc_index(&self) -> usize {
        self.gc_index.load(Ordering::Relaxed)
    }

    /// Mark the start of a collection. Returns false if one is already in progress.
    pub(crate) fn begin_collection(&self) -> bool {
        !self.in_collection.swap(true, Ordering::SeqCst)
    }

    /// Mark the end of a collection, and return the index of the finished collection.
    pub(crate) fn end_collection(&self) -> usize {
        let was_in_collection = self.in_collection.swap(false, Ordering::SeqCst);
        debug_assert!(was_in_collection);
        self.gc_index.fetch_add(1, Ordering::Relaxed)
    }

    pub fn is_in_collection(&self) -> bool {
        self.in_collection.load(Ordering::SeqCst)
    }

    pub(crate) fn next_scan_id(&self) -> usize {
        self.scan_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            state: Atomic::new(SuspensionState::Running),
            reason: Atomic::new(SuspendReason::Other),
            gc_index: AtomicUsize::new(0),
            in_collection: AtomicBool::new(false),
            scan_id: AtomicUsize::new(0),
            suspensions: EnumMap::default(),
        }
    }
}
