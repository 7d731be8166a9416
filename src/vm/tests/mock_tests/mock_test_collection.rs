use super::mock_test_prelude::*;
use crate::diagnostics::GcReason;
use crate::roots::ScanMode;
use crate::util::constants::BYTES_IN_WORD;
use crate::vm::object_model;

#[test]
fn collection_bracket() {
    let fixture = EngineFixture::create();
    let coordinator = fixture.coordinator;
    assert_eq!(
        coordinator.begin_collection(0, 2, false),
        Err(ProtocolViolation::NotSuspended)
    );

    coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    coordinator.begin_collection(1, 2, true).unwrap();
    assert!(coordinator.state().is_in_collection());
    let index = coordinator
        .end_collection(1, GcReason::Induced, false)
        .unwrap();
    coordinator.restart_ee(true).unwrap();

    assert_eq!(index, 0);
    assert_eq!(coordinator.state().gc_index(), 1);
    assert_eq!(
        fixture.engine.calls(),
        vec![
            "suspend_ee",
            "gc_start_work",
            "diag_gc_start",
            "gc_enum_alloc_contexts",
            "gc_done",
            "diag_gc_end",
            "restart_ee"
        ]
    );
    assert_eq!(
        fixture.engine.diag_events(),
        vec![
            DiagEvent::GcStart {
                gen: 1,
                induced: true
            },
            DiagEvent::GcEnd {
                index: 0,
                gen: 1,
                reason: GcReason::Induced,
                concurrent: false
            }
        ]
    );
}

#[test]
fn alloc_contexts_are_retired() {
    let fixture = EngineFixture::create();
    let registry = fixture.engine.registry;
    let heap = TestHeap::new(256);
    let h = registry.register("allocator", true, false);

    let buffer = heap.alloc_raw(32 * BYTES_IN_WORD);
    let end = buffer + 32 * BYTES_IN_WORD;
    let mut first = None;
    assert!(fixture
        .coordinator
        .with_alloc_context(h, &mut |ctx| {
            ctx.set_buffer(buffer, end);
            let start = ctx.alloc(NODE.base_size).unwrap();
            first = Some(unsafe { object_model::initialize_object(start, &NODE, 0) });
        })
        .unwrap());

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    fixture.coordinator.begin_collection(0, 2, false).unwrap();
    let context = *registry.get(h).unwrap().alloc_context.borrow();
    assert_eq!(context.remaining(), 0);

    // The buffer is walkable: the object, then one free object for the tail.
    let mut objects = vec![];
    unsafe { object_model::walk_objects(buffer, end, |o| objects.push(o)) };
    assert_eq!(objects, vec![first.unwrap()]);

    fixture
        .coordinator
        .end_collection(0, GcReason::AllocSoh, false)
        .unwrap();
    fixture.coordinator.restart_ee(true).unwrap();
}

#[test]
fn full_gc_mode() {
    let fixture = EngineFixture::create();
    assert_eq!(
        fixture.coordinator.choose_full_gc_mode(),
        Ok(ScanMode::Background)
    );
    fixture.engine.write_hooks(|hooks| {
        hooks.force_full_gc_to_be_blocking = MockMethod::new_fixed(Box::new(|()| true));
    });
    assert_eq!(
        fixture.coordinator.choose_full_gc_mode(),
        Ok(ScanMode::Blocking)
    );

    let blocking_only = EngineFixture::create_with_options(|o| o.concurrent_gc = false);
    assert_eq!(
        blocking_only.coordinator.choose_full_gc_mode(),
        Ok(ScanMode::Blocking)
    );
    // The host is not asked when background collections are disabled.
    assert_eq!(
        blocking_only
            .engine
            .call_count("force_full_gc_to_be_blocking"),
        0
    );
}

#[test]
fn engine_is_reachable_as_its_concrete_type() {
    let fixture = EngineFixture::create();
    let engine: &MockEngine = fixture.coordinator.engine_as::<MockEngine>().unwrap();
    assert!(std::ptr::eq(engine, fixture.engine));

    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    fixture.coordinator.restart_ee(true).unwrap();
    assert_eq!(engine.calls(), vec!["suspend_ee", "restart_ee"]);
}
