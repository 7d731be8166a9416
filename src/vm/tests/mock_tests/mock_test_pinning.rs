use super::mock_test_prelude::*;
use crate::roots::{ScanContext, ScanMode};

fn pairs_of(fixture: &EngineFixture, wrapper: ObjectReference) -> Vec<(ObjectReference, ObjectReference)> {
    let mut pairs = vec![];
    fixture
        .coordinator
        .walk_async_pinned(wrapper, &mut |from, to| pairs.push((from, to)))
        .unwrap();
    pairs
}

#[test]
fn pinned_array_reports_each_element() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(256);
    let elements: Vec<ObjectReference> = (0..3).map(|_| heap.alloc(&BYTE_ARRAY, 16)).collect();
    let array = heap.alloc(&OBJECT_ARRAY, 4);
    for (i, e) in elements.iter().enumerate() {
        heap.set_field(array, i, *e);
    }
    // The last element stays null.
    let wrapper = heap.alloc(&OVERLAPPED, 0);
    heap.set_field(wrapper, 0, array);

    let pairs = pairs_of(&fixture, wrapper);
    let expected: Vec<_> = elements.iter().map(|e| (wrapper, *e)).collect();
    assert_eq!(pairs, expected);
}

#[test]
fn pinned_buffer_is_reported_directly() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(64);
    let buffer = heap.alloc(&BYTE_ARRAY, 64);
    let wrapper = heap.alloc(&OVERLAPPED, 0);
    heap.set_field(wrapper, 0, buffer);

    assert_eq!(pairs_of(&fixture, wrapper), vec![(wrapper, buffer)]);
}

/// A wrapper pinning a buffer and an array of three buffers.
fn buffer_and_array(heap: &TestHeap) -> (ObjectReference, ObjectReference, ObjectReference, Vec<ObjectReference>) {
    let buffer = heap.alloc(&BYTE_ARRAY, 32);
    let elements: Vec<ObjectReference> = (0..3).map(|_| heap.alloc(&BYTE_ARRAY, 8)).collect();
    let array = heap.alloc(&OBJECT_ARRAY, 3);
    for (i, e) in elements.iter().enumerate() {
        heap.set_field(array, i, *e);
    }
    let wrapper = heap.alloc(&OVERLAPPED_PAIR, 0);
    heap.set_field(wrapper, 0, buffer);
    heap.set_field(wrapper, 1, array);
    (wrapper, buffer, array, elements)
}

#[test]
fn pinned_buffer_and_array_each_reported_once() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(256);
    let (wrapper, buffer, _array, elements) = buffer_and_array(heap);

    let mut pairs = pairs_of(&fixture, wrapper);
    pairs.sort();
    let mut expected = vec![
        (wrapper, buffer),
        (wrapper, elements[0]),
        (wrapper, elements[1]),
        (wrapper, elements[2]),
    ];
    expected.sort();
    assert_eq!(pairs, expected);
}

#[test]
fn promotion_walk_pins_buffer_and_array() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(256);
    let (wrapper, buffer, array, elements) = buffer_and_array(heap);

    let sc = ScanContext::new(1, 2, 2, ScanMode::Blocking, crate::roots::ScanPass::Initial);
    let mut reported = vec![];
    let mut visitor = |slot: &mut ObjectReference, _: &ScanContext, flags: RootFlags| {
        assert_eq!(flags, RootFlags::PINNED);
        reported.push(*slot)
    };
    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    fixture
        .coordinator
        .walk_async_pinned_for_promotion(wrapper, &sc, &mut visitor)
        .unwrap();
    fixture.coordinator.restart_ee(true).unwrap();

    reported.sort();
    let mut expected = vec![buffer, array, elements[0], elements[1], elements[2]];
    expected.sort();
    assert_eq!(reported, expected);
}

#[test]
fn other_objects_pin_nothing() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(64);
    let node = heap.alloc(&NODE, 0);
    heap.set_field(node, 0, heap.alloc(&BYTE_ARRAY, 8));
    let empty_wrapper = heap.alloc(&OVERLAPPED, 0);

    assert!(pairs_of(&fixture, node).is_empty());
    assert!(pairs_of(&fixture, empty_wrapper).is_empty());
}

#[test]
fn promotion_walk_reports_pinned_roots() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(256);
    let a = heap.alloc(&NODE, 0);
    let b = heap.alloc(&NODE, 0);
    let array = heap.alloc(&OBJECT_ARRAY, 2);
    heap.set_field(array, 0, a);
    heap.set_field(array, 1, b);
    let wrapper = heap.alloc(&OVERLAPPED, 0);
    heap.set_field(wrapper, 0, array);

    let sc = ScanContext::new(1, 2, 2, ScanMode::Blocking, crate::roots::ScanPass::Initial);
    let mut reported = vec![];
    let mut visitor = |slot: &mut ObjectReference, _: &ScanContext, flags: RootFlags| {
        reported.push((*slot, flags))
    };
    assert_eq!(
        fixture
            .coordinator
            .walk_async_pinned_for_promotion(wrapper, &sc, &mut visitor),
        Err(ProtocolViolation::NotSuspended)
    );

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    fixture
        .coordinator
        .walk_async_pinned_for_promotion(wrapper, &sc, &mut visitor)
        .unwrap();
    fixture.coordinator.restart_ee(true).unwrap();
    assert_eq!(
        reported,
        vec![
            (array, RootFlags::PINNED),
            (a, RootFlags::PINNED),
            (b, RootFlags::PINNED)
        ]
    );
}

#[test]
fn pinned_objects_are_roots_of_a_scan() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(64);
    let buffer = heap.alloc(&BYTE_ARRAY, 32);
    let wrapper = heap.alloc(&OVERLAPPED, 0);
    heap.set_field(wrapper, 0, buffer);
    fixture.engine.async_pinned.lock().unwrap().push(wrapper);

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    let mut pinned = vec![];
    let mut visitor = |slot: &mut ObjectReference, _: &ScanContext, flags: RootFlags| {
        if flags.contains(RootFlags::PINNED) {
            pinned.push(*slot);
        }
    };
    let report = fixture
        .coordinator
        .scan_roots(&mut visitor, 0, 2, ScanMode::Blocking)
        .unwrap();
    fixture.coordinator.restart_ee(true).unwrap();
    assert_eq!(report.roots, 1);
    assert_eq!(pinned, vec![buffer]);
}
