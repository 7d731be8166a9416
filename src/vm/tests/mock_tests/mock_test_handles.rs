use super::mock_test_prelude::*;
use crate::lifecycle::RefCountedHandles;
use crate::roots::{ScanContext, ScanMode, ScanPass};
use crate::util::constants::MAX_GENERATION;

#[test]
fn ref_counted_handles_follow_the_host() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(256);
    let objects: Vec<ObjectReference> = (0..4).map(|_| heap.alloc(&NODE, 0)).collect();
    let held = [objects[0], objects[2]];
    fixture.engine.write_hooks(|hooks| {
        hooks.ref_counted_handle_callbacks =
            MockMethod::new_fixed(Box::new(move |object| held.contains(&object)));
    });

    let mut table = RefCountedHandles::new();
    for o in objects.iter() {
        table.add(*o);
    }
    let sc = ScanContext::new(7, MAX_GENERATION, MAX_GENERATION, ScanMode::Blocking, ScanPass::Initial);
    let mut reported = vec![];
    let mut visitor =
        |slot: &mut ObjectReference, sc: &ScanContext, _: RootFlags| reported.push((*slot, sc.id));

    assert_eq!(
        fixture
            .coordinator
            .promote_ref_counted_handles(&mut table, &mut visitor, &sc),
        Err(ProtocolViolation::NotSuspended)
    );
    assert_eq!(table.len(), 4);

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    let promoted = fixture
        .coordinator
        .promote_ref_counted_handles(&mut table, &mut visitor, &sc)
        .unwrap();
    fixture.coordinator.restart_ee(true).unwrap();

    assert_eq!(promoted, 2);
    assert_eq!(reported, vec![(objects[0], 7), (objects[2], 7)]);
    assert_eq!(table.handles(), &held);
    assert_eq!(fixture.engine.call_count("ref_counted_handle_callbacks"), 4);
    fixture.engine.write_hooks(|hooks| {
        assert_eq!(hooks.ref_counted_handle_callbacks.call_count(), 4);
    });
}

#[test]
fn sync_block_weak_scan_frees_dead_entries() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(256);
    let live = heap.alloc(&NODE, 0);
    let dead = heap.alloc(&NODE, 0);
    let cache = &fixture.engine.sync_blocks;
    cache.insert(live);
    cache.insert(dead);

    // The weak scan does not need a suspension.
    fixture
        .coordinator
        .sync_block_cache_weak_ptr_scan(&mut |slot| {
            if *slot == dead {
                *slot = ObjectReference::NULL;
            }
        })
        .unwrap();
    assert_eq!(cache.objects(), vec![live]);
}

#[test]
fn sync_block_generations() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(256);
    let object = heap.alloc(&NODE, 0);
    let cache = &fixture.engine.sync_blocks;
    cache.insert(object);

    assert_eq!(
        fixture.coordinator.sync_block_cache_promotions_granted(0),
        Err(ProtocolViolation::NotSuspended)
    );

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    for _ in 0..4 {
        fixture
            .coordinator
            .sync_block_cache_promotions_granted(MAX_GENERATION)
            .unwrap();
    }
    assert_eq!(cache.generation_of(object), Some(MAX_GENERATION));
    fixture.coordinator.sync_block_cache_demote(1).unwrap();
    assert_eq!(cache.generation_of(object), Some(MAX_GENERATION));
    fixture
        .coordinator
        .sync_block_cache_demote(MAX_GENERATION)
        .unwrap();
    assert_eq!(cache.generation_of(object), Some(0));
    fixture.coordinator.restart_ee(true).unwrap();
}
