use criterion::black_box;
use criterion::Criterion;

use gcbridge::roots::{ScanContext, ScanMode};
use gcbridge::util::test_util::fixtures::*;
use gcbridge::util::ObjectReference;
use gcbridge::vm::RootFlags;
use gcbridge::SuspendReason;

const ROOTS: usize = 1024;

pub fn bench(c: &mut Criterion) {
    for verify in [false, true] {
        let fixture = EngineFixture::create_with_options(|o| o.verify_root_scan = verify);
        let heap = TestHeap::new(ROOTS * 4);
        for _ in 0..ROOTS {
            fixture
                .engine
                .add_static_root(leak_slot(heap.alloc(&NODE, 0)));
        }
        let name = if verify {
            "scan static roots, verified"
        } else {
            "scan static roots"
        };
        c.bench_function(name, |b| {
            let world = fixture
                .coordinator
                .stop_the_world(SuspendReason::ForGC)
                .unwrap();
            b.iter(|| {
                let mut sum = 0usize;
                world
                    .scan_roots(
                        &mut |slot: &mut ObjectReference, _: &ScanContext, _: RootFlags| {
                            sum = sum.wrapping_add(slot.value())
                        },
                        2,
                        2,
                        ScanMode::Blocking,
                    )
                    .unwrap();
                black_box(sum)
            });
            world.resume(true).unwrap();
        });
    }
}
