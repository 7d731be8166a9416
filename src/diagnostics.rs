//! Types passed to the diagnostics hooks of [`crate::vm::Diagnostics`].

use crate::util::ObjectReference;
use crate::vm::Generation;

use strum_macros::{EnumIter, IntoStaticStr};

/// Why a collection happened. The discriminants are the values the host's event pipeline uses.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum GcReason {
    /// Small object heap allocation.
    AllocSoh = 0,
    /// Requested by the application.
    Induced = 1,
    LowMemory = 2,
    Empty = 3,
    /// Large object heap allocation.
    AllocLoh = 4,
    OutOfSpaceSoh = 5,
    OutOfSpaceLoh = 6,
    /// Requested by the application, but only if the collector thinks it is productive.
    InducedNoForce = 7,
    GcStress = 8,
    LowMemoryBlocking = 9,
    InducedCompacting = 10,
    LowMemoryHost = 11,
}

impl GcReason {
    pub fn is_induced(self) -> bool {
        matches!(
            self,
            GcReason::Induced | GcReason::InducedNoForce | GcReason::InducedCompacting
        )
    }
}

/// The object walks offered to diagnostics during a collection.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, IntoStaticStr)]
pub enum SurvivorWalk {
    /// Objects found to need finalization.
    FReachable,
    /// Survivors, after relocation is decided.
    Survivors,
    /// Survivors in the large object heap of a full collection.
    LohSurvivors,
    /// Survivors at the end of a background collection.
    BgcSurvivors,
}

/// What a diagnostics walk sees.
#[derive(Copy, Clone, Debug)]
pub struct DiagWalkContext<'a> {
    pub gc_index: usize,
    pub condemned: Generation,
    pub objects: &'a [ObjectReference],
}
