use criterion::black_box;
use criterion::Criterion;

use gcbridge::util::constants::BYTES_IN_WORD;
use gcbridge::util::Address;
use gcbridge::vm::object_model::{self, TypeDescriptor, TypeKind};

static FREE: TypeDescriptor = TypeDescriptor::FREE;

static NODE: TypeDescriptor = TypeDescriptor {
    name: "Node",
    kind: TypeKind::Object,
    base_size: 3 * BYTES_IN_WORD,
    component_size: 0,
    reference_offsets: &[BYTES_IN_WORD, 2 * BYTES_IN_WORD],
    has_finalizer: false,
};

const OBJECTS: usize = 1024;

pub fn bench(c: &mut Criterion) {
    let words = OBJECTS * 3 + 16;
    let memory: &'static mut [usize] = Box::leak(vec![0usize; words].into_boxed_slice());
    let start = Address::from_mut_ptr(memory.as_mut_ptr());
    let end = start + words * BYTES_IN_WORD;

    let mut cursor = start;
    for _ in 0..OBJECTS {
        unsafe { object_model::initialize_object(cursor, &NODE, 0) };
        cursor += NODE.base_size;
    }
    // The tail is one free object, as a retired allocation context leaves it.
    unsafe { object_model::fill_with_free_object(cursor, end - cursor, &FREE) };

    c.bench_function("walk objects", |b| {
        b.iter(|| {
            let mut count = 0;
            unsafe { object_model::walk_objects(black_box(start), end, |_| count += 1) };
            count
        })
    });
}
