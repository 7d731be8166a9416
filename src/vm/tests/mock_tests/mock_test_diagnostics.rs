use super::mock_test_prelude::*;
use crate::barrier::{WriteBarrierOp, WriteBarrierParameters};
use crate::diagnostics::{DiagWalkContext, GcReason, SurvivorWalk};

use strum::IntoEnumIterator;

#[test]
fn survivor_walks_reach_their_hooks() {
    let fixture = EngineFixture::create();
    let heap = TestHeap::new(64);
    let objects = vec![heap.alloc(&NODE, 0), heap.alloc(&NODE, 0)];
    let ctx = DiagWalkContext {
        gc_index: 5,
        condemned: 1,
        objects: &objects,
    };
    for walk in SurvivorWalk::iter() {
        fixture.coordinator.report_survivors(walk, &ctx).unwrap();
    }
    let walks: Vec<SurvivorWalk> = fixture
        .engine
        .diag_events()
        .into_iter()
        .map(|e| match e {
            DiagEvent::Walk {
                walk,
                gc_index,
                objects: reported,
            } => {
                assert_eq!(gc_index, 5);
                assert_eq!(reported, objects);
                walk
            }
            other => panic!("unexpected event {:?}", other),
        })
        .collect();
    assert_eq!(walks, SurvivorWalk::iter().collect::<Vec<_>>());
}

#[test]
fn generation_bounds_follow_ephemeral_changes() {
    let fixture = EngineFixture::create();
    fixture.coordinator.suspend_ee(SuspendReason::ForGC).unwrap();
    for op in [
        WriteBarrierOp::SwitchToNonWriteWatch,
        WriteBarrierOp::StompResize,
        WriteBarrierOp::StompEphemeral,
    ] {
        fixture
            .coordinator
            .stomp_write_barrier(WriteBarrierParameters::new(op, true))
            .unwrap();
    }
    fixture.coordinator.restart_ee(true).unwrap();
    assert_eq!(
        fixture.engine.diag_events(),
        vec![
            DiagEvent::UpdateGenerationBounds,
            DiagEvent::UpdateGenerationBounds
        ]
    );
}

/// A host that does not observe collections keeps the default hooks.
struct Silent;

impl Diagnostics for Silent {}

#[test]
fn default_hooks_do_nothing() {
    let silent = Silent;
    let objects = [ObjectReference::NULL];
    let ctx = DiagWalkContext {
        gc_index: 0,
        condemned: 0,
        objects: &objects,
    };
    silent.diag_gc_start(0, false);
    silent.diag_update_generation_bounds();
    silent.diag_walk_freachable_objects(&ctx);
    silent.diag_walk_survivors(&ctx);
    silent.diag_walk_loh_survivors(&ctx);
    silent.diag_walk_bgc_survivors(&ctx);
    silent.diag_gc_end(0, 0, GcReason::Empty, false);
}
