use super::mock_test_prelude::*;
use crate::roots::ScanMode;

use std::panic::{catch_unwind, AssertUnwindSafe};

fn raise(coordinator: &Coordinator, code: u32) -> Box<dyn std::any::Any + Send> {
    match catch_unwind(AssertUnwindSafe(|| -> () { coordinator.handle_fatal_error(code) })) {
        Ok(()) => unreachable!(),
        Err(payload) => payload,
    }
}

#[test]
fn fatal_error_terminates() {
    let fixture = EngineFixture::create();
    let coordinator = fixture.coordinator;
    coordinator.suspend_ee(SuspendReason::ForGC).unwrap();

    let payload = raise(coordinator, 137);
    assert_eq!(payload.downcast_ref::<FatalError>(), Some(&FatalError(137)));
    assert_eq!(fixture.engine.fatal_errors(), vec![137]);
    assert_eq!(coordinator.state().state(), SuspensionState::Terminated);

    // Nothing reaches the host any more.
    let calls = fixture.engine.calls();
    let mut visitor = |_: &mut ObjectReference, _: &crate::roots::ScanContext, _: RootFlags| {};
    assert_eq!(
        coordinator.scan_roots(&mut visitor, 0, 2, ScanMode::Blocking),
        Err(ProtocolViolation::Terminated)
    );
    assert_eq!(coordinator.restart_ee(true), Err(ProtocolViolation::Terminated));
    assert_eq!(
        coordinator.suspend_ee(SuspendReason::ForGC),
        Err(ProtocolViolation::Terminated)
    );
    assert_eq!(coordinator.config_bool("gcServer"), Err(ProtocolViolation::Terminated));
    assert_eq!(
        coordinator.choose_full_gc_mode(),
        Err(ProtocolViolation::Terminated)
    );
    assert_eq!(fixture.engine.calls(), calls);
}

#[test]
fn second_fatal_error_does_not_reach_the_host() {
    let fixture = EngineFixture::create();
    raise(fixture.coordinator, 137);
    let payload = raise(fixture.coordinator, 1);
    assert!(payload.downcast_ref::<FatalError>().is_none());
    assert_eq!(fixture.engine.fatal_errors(), vec![137]);
}
