use super::mock_test_prelude::*;
use crate::roots::ScanMode;

use enum_map::EnumMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strum::{EnumCount, IntoEnumIterator};

const SEEDS: u64 = 8;
const STEPS: usize = 64;

#[derive(Debug)]
enum Step {
    Suspend(SuspendReason),
    Restart,
    ScanRoots,
    Demote,
}

fn random_step(rng: &mut ChaCha8Rng) -> Step {
    match rng.random_range(0..4) {
        0 => {
            let reason = SuspendReason::iter()
                .nth(rng.random_range(0..SuspendReason::COUNT))
                .unwrap();
            Step::Suspend(reason)
        }
        1 => Step::Restart,
        2 => Step::ScanRoots,
        _ => Step::Demote,
    }
}

/// Drive the coordinator with random sequences of operations while mutators run, and check
/// every result against a model of the state machine.
#[test]
fn random_operation_sequences() {
    panic_after(60_000, || {
        for seed in 0..SEEDS {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let fixture = EngineFixture::create();
            let mutators = RunningMutators::start(fixture.engine.registry, 2);
            let coordinator = fixture.coordinator;

            let mut suspended = false;
            let mut counts: EnumMap<SuspendReason, usize> = EnumMap::default();
            let mut host_scans = 0;

            for _ in 0..STEPS {
                let step = random_step(&mut rng);
                match step {
                    Step::Suspend(reason) => {
                        let result = coordinator.suspend_ee(reason);
                        if suspended {
                            assert_eq!(result, Err(ProtocolViolation::NestedSuspension));
                        } else {
                            assert_eq!(result.unwrap().threads, 2);
                            counts[reason] += 1;
                            suspended = true;
                        }
                    }
                    Step::Restart => {
                        let result = coordinator.restart_ee(rng.random_bool(0.5));
                        if suspended {
                            result.unwrap();
                            suspended = false;
                        } else {
                            assert_eq!(result, Err(ProtocolViolation::NotSuspended));
                        }
                    }
                    Step::ScanRoots => {
                        let mut visitor =
                            |_: &mut ObjectReference, _: &crate::roots::ScanContext, _: RootFlags| {};
                        let result = coordinator.scan_roots(&mut visitor, 0, 2, ScanMode::Blocking);
                        if suspended {
                            assert_eq!(result.unwrap().roots, 0);
                            host_scans += 1;
                        } else {
                            assert_eq!(result, Err(ProtocolViolation::NotSuspended));
                        }
                    }
                    Step::Demote => {
                        let result = coordinator.sync_block_cache_demote(2);
                        assert_eq!(result.is_ok(), suspended, "{:?}", step);
                    }
                }
                assert_eq!(coordinator.state().is_suspended(), suspended);
            }
            if suspended {
                coordinator.restart_ee(false).unwrap();
            }
            mutators.stop();

            assert_eq!(fixture.engine.call_count("gc_scan_roots"), host_scans);
            for reason in SuspendReason::iter() {
                assert_eq!(
                    coordinator.state().suspension_count(reason),
                    counts[reason],
                    "seed {} reason {:?}",
                    seed,
                    reason
                );
            }
        }
    })
}
