//! The host-side thread and allocation-context registry.
//!
//! A host can implement its [`crate::vm::ExecutionEngine`] thread queries on top of a
//! [`ThreadRegistry`]. The registry keeps one [`MutatorThread`] per managed thread, implements the
//! preemptive/cooperative mode switches and the safepoint parking used by suspension, and can
//! start threads for the collector.

mod alloc_context;
mod mutator;
mod registry;

pub use self::alloc_context::AllocContext;
pub use self::mutator::MutatorThread;
pub use self::registry::ThreadRegistry;

use std::fmt;

/// A handle to a thread in a [`ThreadRegistry`].
///
/// The handle stays valid until the thread is unregistered. A handle whose slot has been
/// reused by another thread is detected by the generation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ThreadHandle {
    index: u32,
    generation: u32,
}

impl ThreadHandle {
    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "thread#{}.{}", self.index, self.generation)
    }
}
