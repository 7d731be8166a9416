use super::mock_test_prelude::*;
use crate::thread::ThreadRegistry;

#[test]
fn collector_threads() {
    panic_after(10_000, || {
        let fixture = EngineFixture::create();
        let coordinator = fixture.coordinator;
        let (tx, rx) = crossbeam::channel::unbounded();

        for suspendable in [true, false] {
            let tx = tx.clone();
            let created = coordinator
                .create_thread(
                    Box::new(move || {
                        tx.send((
                            suspendable,
                            coordinator.current_thread().unwrap().is_some(),
                            coordinator.was_current_thread_created_by_gc().unwrap(),
                            coordinator.is_gc_thread().unwrap(),
                        ))
                        .unwrap();
                    }),
                    suspendable,
                    if suspendable { "bgc" } else { "gc-worker" },
                )
                .unwrap();
            assert!(created);
            let (s, known, created_by_gc, gc_thread) = rx.recv().unwrap();
            assert_eq!(s, suspendable);
            // Only suspendable threads are known to the host.
            assert_eq!(known, suspendable);
            assert!(created_by_gc);
            assert!(gc_thread);
        }
        assert_eq!(fixture.engine.call_count("create_thread"), 2);
        assert!(!ThreadRegistry::was_current_thread_created_by_gc());
    })
}

#[test]
fn suspending_thread_is_a_gc_thread() {
    let fixture = EngineFixture::create();
    let coordinator = fixture.coordinator;
    assert!(!coordinator.is_gc_thread().unwrap());
    assert!(!coordinator.trap_returning_threads().unwrap());

    let h = fixture.engine.registry.register("m", true, false);
    coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    assert!(coordinator.is_gc_thread().unwrap());
    assert!(coordinator.trap_returning_threads().unwrap());
    assert!(coordinator.catch_at_safe_point(h).unwrap());
    // The suspending thread may enter cooperative mode without blocking.
    let me = fixture.engine.registry.attach_current_thread("collector");
    coordinator.disable_preemptive_gc(me).unwrap();
    coordinator.enable_preemptive_gc(me).unwrap();
    coordinator.restart_ee(true).unwrap();
    assert!(!coordinator.catch_at_safe_point(h).unwrap());
    fixture.engine.registry.detach_current_thread();
}

#[test]
fn alloc_context_of_a_gone_thread() {
    let fixture = EngineFixture::create();
    let h = fixture.engine.registry.register("gone", true, false);
    assert!(fixture.engine.registry.unregister(h));
    let mut called = false;
    assert!(!fixture
        .coordinator
        .with_alloc_context(h, &mut |_| called = true)
        .unwrap());
    assert!(!called);
}
