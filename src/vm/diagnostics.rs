use crate::diagnostics::{DiagWalkContext, GcReason};
use crate::vm::Generation;

/// Diagnostics hooks, called at fixed points of a collection so the host can feed its
/// profiler and event pipeline.
///
/// Every method has an empty default. A host that implements none of them gets the same
/// protocol behavior as one that implements all of them.
#[allow(unused_variables)]
pub trait Diagnostics {
    /// A collection of `gen` starts.
    fn diag_gc_start(&self, gen: Generation, induced: bool) {}

    /// The heap or the generation boundaries changed.
    fn diag_update_generation_bounds(&self) {}

    /// Collection number `index` of `gen` ended.
    fn diag_gc_end(&self, index: usize, gen: Generation, reason: GcReason, concurrent: bool) {}

    /// The objects found to need finalization.
    fn diag_walk_freachable_objects(&self, ctx: &DiagWalkContext) {}

    /// The survivors and their relocation.
    fn diag_walk_survivors(&self, ctx: &DiagWalkContext) {}

    /// The survivors of the large object heap in a full collection.
    fn diag_walk_loh_survivors(&self, ctx: &DiagWalkContext) {}

    /// The survivors at the end of a background collection.
    fn diag_walk_bgc_survivors(&self, ctx: &DiagWalkContext) {}
}
