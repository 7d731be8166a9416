use crate::util::ObjectReference;
use crate::vm::{DomainId, ExecutionEngine};

use crossbeam::queue::SegQueue;
use std::fmt;

/// The host failed to finalize an object eagerly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizerError {
    pub object: ObjectReference,
    pub message: String,
}

impl FinalizerError {
    pub fn new(object: ObjectReference, message: impl Into<String>) -> Self {
        Self {
            object,
            message: message.into(),
        }
    }
}

impl fmt::Display for FinalizerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "failed to finalize {} eagerly: {}", self.object, self.message)
    }
}

impl std::error::Error for FinalizerError {}

/// What one finalization pass did.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FinalizationReport {
    /// Candidates that are still alive.
    pub live: usize,
    /// Dead candidates finalized by the host on the spot.
    pub eager: usize,
    /// Dead candidates queued for the finalizer thread.
    pub queued: usize,
    /// Dead candidates whose eager finalization failed. They are queued as well.
    pub deferred: usize,
}

impl FinalizationReport {
    /// Did the pass make any object ready for the finalizer thread?
    pub fn found_finalizers(&self) -> bool {
        self.queued + self.deferred > 0
    }
}

/// The collector's bookkeeping of objects with finalizers.
///
/// Candidates are registered when they are allocated. After marking, each dead candidate is
/// first offered to the host for eager finalization; the others move to the ready queue, which
/// the host's finalizer thread drains with [`FinalizationHandoff::pop_ready`].
#[derive(Default)]
pub struct FinalizationHandoff {
    candidates: Vec<ObjectReference>,
    ready_for_finalize: SegQueue<ObjectReference>,
}

impl FinalizationHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: ObjectReference) {
        debug_assert!(!object.is_null());
        self.candidates.push(object);
    }

    pub fn candidates(&self) -> &[ObjectReference] {
        &self.candidates
    }

    /// Take the next object to finalize. Safe to call from the finalizer thread while the
    /// collector works on the candidates.
    pub fn pop_ready(&self) -> Option<ObjectReference> {
        self.ready_for_finalize.pop()
    }

    pub fn ready_count(&self) -> usize {
        self.ready_for_finalize.len()
    }

    /// Hand the dead candidates over. `is_live` tells whether a candidate survived marking, and
    /// may return a forwarded reference for a moved one.
    pub(crate) fn scan(
        &mut self,
        engine: &dyn ExecutionEngine,
        is_live: &mut dyn FnMut(ObjectReference) -> Option<ObjectReference>,
    ) -> FinalizationReport {
        let mut report = FinalizationReport::default();
        let mut survivors = Vec::with_capacity(self.candidates.len());
        for object in self.candidates.drain(..) {
            if let Some(forwarded) = is_live(object) {
                trace!("{} is live, keep {} as a candidate", object, forwarded);
                survivors.push(forwarded);
                report.live += 1;
                continue;
            }
            match engine.eager_finalized(object) {
                Ok(true) => {
                    trace!("{} was finalized eagerly", object);
                    report.eager += 1;
                }
                Ok(false) => {
                    trace!("{} is not live, push it to ready_for_finalize", object);
                    self.ready_for_finalize.push(object);
                    report.queued += 1;
                }
                Err(e) => {
                    warn!("{}. Deferring it to the finalizer thread.", e);
                    self.ready_for_finalize.push(object);
                    report.deferred += 1;
                }
            }
        }
        self.candidates = survivors;
        report
    }

    /// Queue every candidate the host wants finalized because `domain` is being unloaded,
    /// whether it is reachable or not. Returns the number of queued objects.
    pub(crate) fn scan_for_unload(
        &mut self,
        engine: &dyn ExecutionEngine,
        domain: DomainId,
    ) -> usize {
        let ready = &self.ready_for_finalize;
        let before = self.candidates.len();
        self.candidates.retain(|object| {
            if engine.should_finalize_object_for_unload(domain, *object) {
                ready.push(*object);
                false
            } else {
                true
            }
        });
        before - self.candidates.len()
    }
}
