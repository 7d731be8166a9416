use crate::roots::ScanContext;
use crate::util::ObjectReference;

use std::fmt;
use std::ops::BitOr;

/// Properties of a reported root.
#[derive(Copy, Clone, PartialEq, Eq, Default, Hash)]
pub struct RootFlags(u8);

impl RootFlags {
    pub const NONE: RootFlags = RootFlags(0);
    /// The slot may point into the middle of an object.
    pub const INTERIOR: RootFlags = RootFlags(1 << 0);
    /// The referent must not move during this collection.
    pub const PINNED: RootFlags = RootFlags(1 << 1);

    pub const fn contains(self, other: RootFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for RootFlags {
    type Output = RootFlags;
    fn bitor(self, rhs: RootFlags) -> RootFlags {
        RootFlags(self.0 | rhs.0)
    }
}

impl fmt::Debug for RootFlags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names = vec![];
        if self.contains(RootFlags::INTERIOR) {
            names.push("INTERIOR");
        }
        if self.contains(RootFlags::PINNED) {
            names.push("PINNED");
        }
        if names.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

/// Callback trait of root-scanning functions. The host calls it once per root slot.
///
/// The visitor may update the slot, for example when the referent is relocated.
pub trait RootVisitor {
    /// Call this function for each root slot.
    fn visit_root(&mut self, slot: &mut ObjectReference, sc: &ScanContext, flags: RootFlags);
}

/// This lets us use closures as RootVisitor.
impl<F: FnMut(&mut ObjectReference, &ScanContext, RootFlags)> RootVisitor for F {
    fn visit_root(&mut self, slot: &mut ObjectReference, sc: &ScanContext, flags: RootFlags) {
        self(slot, sc, flags)
    }
}
