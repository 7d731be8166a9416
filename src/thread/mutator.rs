use super::AllocContext;
use crate::util::ObjectReference;

use atomic_refcell::AtomicRefCell;
use std::sync::atomic::{AtomicBool, Ordering};

/// The host's record of a managed thread.
///
/// Only the thread itself flips its mode (through the [`super::ThreadRegistry`]). The collector
/// reads the mode and, while the execution engine is suspended, the allocation context and the
/// shadow stack.
pub struct MutatorThread {
    name: String,
    suspendable: bool,
    created_by_gc: bool,
    /// True while the thread runs managed code (cooperative mode).
    pub(super) preemptive_gc_disabled: AtomicBool,
    /// Set by the suspender for every thread it is waiting for.
    pub(super) suspend_pending: AtomicBool,
    /// True while the thread is parked at a safepoint.
    pub(super) at_safepoint: AtomicBool,
    /// The allocation buffer of this thread.
    pub alloc_context: AtomicRefCell<AllocContext>,
    /// The precise stack roots of the managed frames of this thread.
    pub shadow_stack: AtomicRefCell<Vec<ObjectReference>>,
}

impl MutatorThread {
    pub(super) fn new(name: String, suspendable: bool, created_by_gc: bool) -> Self {
        Self {
            name,
            suspendable,
            created_by_gc,
            preemptive_gc_disabled: AtomicBool::new(false),
            suspend_pending: AtomicBool::new(false),
            at_safepoint: AtomicBool::new(false),
            alloc_context: AtomicRefCell::new(AllocContext::new()),
            shadow_stack: AtomicRefCell::new(vec![]),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_suspendable(&self) -> bool {
        self.suspendable
    }

    pub fn is_created_by_gc(&self) -> bool {
        self.created_by_gc
    }

    /// Is the thread in cooperative mode?
    pub fn is_preemptive_gc_disabled(&self) -> bool {
        self.preemptive_gc_disabled.load(Ordering::SeqCst)
    }

    pub fn is_at_safepoint(&self) -> bool {
        self.at_safepoint.load(Ordering::SeqCst)
    }

    pub fn is_suspend_pending(&self) -> bool {
        self.suspend_pending.load(Ordering::SeqCst)
    }

    /// A thread cannot touch the heap if it is in preemptive mode or parked.
    pub fn is_safe(&self) -> bool {
        !self.is_preemptive_gc_disabled() || self.is_at_safepoint()
    }

    /// Push a stack root. The thread must be in cooperative mode.
    pub fn push_root(&self, object: ObjectReference) {
        debug_assert!(self.is_preemptive_gc_disabled());
        self.shadow_stack.borrow_mut().push(object);
    }

    pub fn pop_root(&self) -> Option<ObjectReference> {
        debug_assert!(self.is_preemptive_gc_disabled());
        self.shadow_stack.borrow_mut().pop()
    }

    /// A copy of the current stack roots.
    pub fn roots(&self) -> Vec<ObjectReference> {
        self.shadow_stack.borrow().clone()
    }
}

impl std::fmt::Debug for MutatorThread {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MutatorThread")
            .field("name", &self.name)
            .field("cooperative", &self.is_preemptive_gc_disabled())
            .field("at_safepoint", &self.is_at_safepoint())
            .field("suspend_pending", &self.is_suspend_pending())
            .finish()
    }
}
