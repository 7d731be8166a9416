use super::mock_test_prelude::*;
use crate::roots::{ScanContext, ScanMode, ScanPass};

use std::collections::HashSet;

/// A collector visitor that records what it is given.
#[derive(Default)]
struct Recorder {
    slots: Vec<Address>,
    objects: HashSet<ObjectReference>,
    scan_ids: HashSet<usize>,
    passes: Vec<ScanPass>,
}

impl RootVisitor for Recorder {
    fn visit_root(&mut self, slot: &mut ObjectReference, sc: &ScanContext, _flags: RootFlags) {
        self.slots
            .push(Address::from_mut_ptr(slot as *mut ObjectReference));
        self.objects.insert(*slot);
        self.scan_ids.insert(sc.id);
        self.passes.push(sc.pass);
    }
}

#[test]
fn every_root_is_reported_once() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(1024);
    let registry = fixture.engine.registry;

    let a = heap.alloc(&NODE, 0);
    let b = heap.alloc(&NODE, 0);
    let c = heap.alloc(&NODE, 0);
    let t1 = registry.register("t1", true, false);
    let t2 = registry.register("t2", true, false);
    // Both threads stay in preemptive mode, so their stacks are filled in directly.
    registry
        .get(t1)
        .unwrap()
        .shadow_stack
        .borrow_mut()
        .extend([a, ObjectReference::NULL]);
    registry.get(t2).unwrap().shadow_stack.borrow_mut().push(b);
    fixture.engine.add_static_root(leak_slot(c));
    fixture
        .engine
        .add_static_root(leak_slot(ObjectReference::NULL));

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    fixture.engine.take_calls();
    let mut recorder = Recorder::default();
    let report = fixture
        .coordinator
        .scan_roots(&mut recorder, 0, 2, ScanMode::Blocking)
        .unwrap();
    fixture.coordinator.restart_ee(true).unwrap();

    assert_eq!(report.roots, 3);
    assert!(report.verified);
    assert_eq!(recorder.objects, [a, b, c].into_iter().collect());
    assert_eq!(recorder.slots.len(), 3);
    assert_eq!(recorder.scan_ids, [report.scan_id].into_iter().collect());
    assert_eq!(
        fixture.engine.calls(),
        vec!["gc_scan_roots", "after_gc_scan_roots", "restart_ee"]
    );
}

#[test]
fn duplicate_root_is_rejected() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(64);
    let object = heap.alloc(&NODE, 0);
    let slot = leak_slot(object);
    let slot_address = Address::from_mut_ptr(slot as *mut ObjectReference);
    // The host lists the same static slot twice.
    fixture.engine.static_roots.lock().unwrap().extend([slot_address, slot_address]);

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    let mut recorder = Recorder::default();
    let result = fixture
        .coordinator
        .scan_roots(&mut recorder, 2, 2, ScanMode::Blocking);
    match result {
        Err(ProtocolViolation::DuplicateRoot { slot, .. }) => assert_eq!(slot, slot_address),
        other => panic!("expected a duplicate root, got {:?}", other),
    }
    // The collector saw the slot once, and the host was still told the scan is over.
    assert_eq!(recorder.slots, vec![slot_address]);
    assert_eq!(fixture.engine.call_count("after_gc_scan_roots"), 1);
    // The coordinator stays suspended.
    assert!(fixture.coordinator.state().is_suspended());
    fixture.coordinator.restart_ee(true).unwrap();
}

#[test]
fn duplicates_pass_without_verification() {
    let fixture = EngineFixture::create_with_options(|o| o.verify_root_scan = false);
    let heap = TestHeap::new(64);
    let slot = leak_slot(heap.alloc(&NODE, 0));
    let slot_address = Address::from_mut_ptr(slot as *mut ObjectReference);
    fixture.engine.static_roots.lock().unwrap().extend([slot_address, slot_address]);

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    let mut recorder = Recorder::default();
    let report = fixture
        .coordinator
        .scan_roots(&mut recorder, 2, 2, ScanMode::Blocking)
        .unwrap();
    fixture.coordinator.restart_ee(true).unwrap();
    assert!(!report.verified);
    assert_eq!(report.roots, 2);
    assert_eq!(recorder.slots.len(), 2);
}

#[test]
fn scan_requires_suspension() {
    let fixture = EngineFixture::create();
    let mut recorder = Recorder::default();
    assert_eq!(
        fixture
            .coordinator
            .scan_roots(&mut recorder, 0, 2, ScanMode::Blocking),
        Err(ProtocolViolation::NotSuspended)
    );
    assert_eq!(fixture.engine.call_count("gc_scan_roots"), 0);
}

#[test]
fn background_rescan() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(64);
    fixture.engine.add_static_root(leak_slot(heap.alloc(&NODE, 0)));

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    let mut recorder = Recorder::default();
    let first = fixture
        .coordinator
        .scan_roots(&mut recorder, 2, 2, ScanMode::Background)
        .unwrap();
    fixture.coordinator.restart_ee(false).unwrap();

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    fixture.engine.take_calls();
    let rescan = fixture
        .coordinator
        .rescan_roots_for_background_sweep(&mut recorder, 2, 2)
        .unwrap();
    fixture.coordinator.restart_ee(true).unwrap();

    assert_ne!(first.scan_id, rescan.scan_id);
    // The same slot may be reported again in a new scan.
    assert_eq!(recorder.slots.len(), 2);
    assert_eq!(
        recorder.passes,
        vec![ScanPass::Initial, ScanPass::BackgroundRescan]
    );
    assert_eq!(
        fixture.engine.calls(),
        vec![
            "gc_before_bgc_sweep_work",
            "gc_scan_roots",
            "after_gc_scan_roots",
            "restart_ee"
        ]
    );
}
