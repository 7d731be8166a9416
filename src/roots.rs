//! Root enumeration: the per-scan context, the verification of reported roots, and a
//! toolkit helper for hosts that keep precise shadow stacks in a [`ThreadRegistry`].

use crate::thread::{ThreadHandle, ThreadRegistry};
use crate::util::{Address, ObjectReference};
use crate::vm::{Generation, RootFlags, RootVisitor};

use std::collections::HashSet;

/// How the collection that scans the roots runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanMode {
    /// Mutators stay stopped for the whole collection.
    Blocking,
    /// Mutators run during most of the collection.
    Background,
}

/// Which scan of the collection this is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ScanPass {
    Initial,
    /// The rescan before the sweep phase of a background collection.
    BackgroundRescan,
}

/// The per-scan record handed to the host and to every root callback.
#[derive(Clone, Debug)]
pub struct ScanContext {
    /// Unique per coordinator. Roots are verified per scan id.
    pub id: usize,
    pub condemned: Generation,
    pub max_gen: Generation,
    pub mode: ScanMode,
    pub pass: ScanPass,
    /// True when the scan marks objects, false when it only updates relocated references.
    pub promotion: bool,
    /// The thread whose stack is being walked. Set by the host during stack scanning.
    pub thread_under_crawl: Option<ThreadHandle>,
}

impl ScanContext {
    pub fn new(
        id: usize,
        condemned: Generation,
        max_gen: Generation,
        mode: ScanMode,
        pass: ScanPass,
    ) -> Self {
        Self {
            id,
            condemned,
            max_gen,
            mode,
            pass,
            promotion: true,
            thread_under_crawl: None,
        }
    }

    pub fn is_full(&self) -> bool {
        self.condemned == self.max_gen
    }
}

/// The result of a root scan.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RootScanReport {
    pub scan_id: usize,
    /// The number of roots forwarded to the collector.
    pub roots: usize,
    /// Were the reported slots checked for duplicates?
    pub verified: bool,
}

/// Wraps the collector's visitor. Counts the roots and, if verification is enabled, drops
/// every slot reported a second time in the same scan.
pub(crate) struct VerifyingRootVisitor<'a> {
    inner: &'a mut dyn RootVisitor,
    verify: bool,
    seen: HashSet<Address>,
    roots: usize,
    first_duplicate: Option<Address>,
}

impl<'a> VerifyingRootVisitor<'a> {
    pub fn new(inner: &'a mut dyn RootVisitor, verify: bool) -> Self {
        Self {
            inner,
            verify,
            seen: HashSet::new(),
            roots: 0,
            first_duplicate: None,
        }
    }

    pub fn roots(&self) -> usize {
        self.roots
    }

    pub fn first_duplicate(&self) -> Option<Address> {
        self.first_duplicate
    }
}

impl RootVisitor for VerifyingRootVisitor<'_> {
    fn visit_root(&mut self, slot: &mut ObjectReference, sc: &ScanContext, flags: RootFlags) {
        if self.verify {
            let address = Address::from_mut_ptr(slot as *mut ObjectReference);
            if !self.seen.insert(address) {
                error!(
                    "Root slot {} ({}) reported twice in scan {}",
                    address, *slot, sc.id
                );
                self.first_duplicate.get_or_insert(address);
                return;
            }
        }
        self.roots += 1;
        self.inner.visit_root(slot, sc, flags);
    }
}

/// Report the shadow-stack roots of every registered thread, setting
/// [`ScanContext::thread_under_crawl`] while each thread is walked. Null slots are skipped.
///
/// The execution engine must be suspended.
pub fn scan_thread_roots(
    registry: &ThreadRegistry,
    visitor: &mut dyn RootVisitor,
    sc: &mut ScanContext,
) {
    for (handle, thread) in registry.threads() {
        debug_assert!(thread.is_safe(), "{:?} is not at a safepoint", thread);
        sc.thread_under_crawl = Some(handle);
        let mut stack = thread.shadow_stack.borrow_mut();
        for slot in stack.iter_mut().filter(|s| !s.is_null()) {
            visitor.visit_root(slot, sc, RootFlags::NONE);
        }
    }
    sc.thread_under_crawl = None;
}
