// Some tests are conditionally compiled. So not all the code in this module will be used. We simply allow dead code in this module.
#![allow(dead_code)]

use crate::thread::ThreadRegistry;
use crate::util::constants::BYTES_IN_WORD;
use crate::util::options::GcOptions;
use crate::util::test_util::mock_engine::MockEngine;
use crate::util::{Address, ObjectReference};
use crate::vm::object_model::{self, TypeDescriptor, TypeKind};
use crate::Coordinator;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A plain object with two reference fields.
pub static NODE: TypeDescriptor = TypeDescriptor {
    name: "Node",
    kind: TypeKind::Object,
    base_size: 3 * BYTES_IN_WORD,
    component_size: 0,
    reference_offsets: &[BYTES_IN_WORD, 2 * BYTES_IN_WORD],
    has_finalizer: false,
};

/// Like [`NODE`], with a finalizer.
pub static FINALIZABLE: TypeDescriptor = TypeDescriptor {
    name: "Finalizable",
    kind: TypeKind::Object,
    base_size: 3 * BYTES_IN_WORD,
    component_size: 0,
    reference_offsets: &[BYTES_IN_WORD, 2 * BYTES_IN_WORD],
    has_finalizer: true,
};

pub static OBJECT_ARRAY: TypeDescriptor = TypeDescriptor {
    name: "Object[]",
    kind: TypeKind::ReferenceArray,
    base_size: 2 * BYTES_IN_WORD,
    component_size: BYTES_IN_WORD,
    reference_offsets: &[],
    has_finalizer: false,
};

pub static BYTE_ARRAY: TypeDescriptor = TypeDescriptor {
    name: "Byte[]",
    kind: TypeKind::PrimitiveArray,
    base_size: 2 * BYTES_IN_WORD,
    component_size: 1,
    reference_offsets: &[],
    has_finalizer: false,
};

/// An overlapped-IO wrapper that pins the object in its only field.
pub static OVERLAPPED: TypeDescriptor = TypeDescriptor {
    name: "Overlapped",
    kind: TypeKind::PinningWrapper,
    base_size: 2 * BYTES_IN_WORD,
    component_size: 0,
    reference_offsets: &[BYTES_IN_WORD],
    has_finalizer: false,
};

/// An overlapped-IO wrapper with two pinned fields, such as a read buffer and a scatter list.
pub static OVERLAPPED_PAIR: TypeDescriptor = TypeDescriptor {
    name: "OverlappedPair",
    kind: TypeKind::PinningWrapper,
    base_size: 3 * BYTES_IN_WORD,
    component_size: 0,
    reference_offsets: &[BYTES_IN_WORD, 2 * BYTES_IN_WORD],
    has_finalizer: false,
};

/// A leaked, word-aligned bump-allocated region to build object graphs in.
pub struct TestHeap {
    start: Address,
    end: Address,
    cursor: AtomicUsize,
}

impl TestHeap {
    pub fn new(words: usize) -> &'static TestHeap {
        let memory: &'static mut [usize] = Box::leak(vec![0usize; words].into_boxed_slice());
        let start = Address::from_mut_ptr(memory.as_mut_ptr());
        Box::leak(Box::new(TestHeap {
            start,
            end: start + words * BYTES_IN_WORD,
            cursor: AtomicUsize::new(start.as_usize()),
        }))
    }

    pub fn start(&self) -> Address {
        self.start
    }

    pub fn end(&self) -> Address {
        self.end
    }

    /// Carve out `bytes` of raw memory.
    pub fn alloc_raw(&self, bytes: usize) -> Address {
        let at = self.cursor.fetch_add(bytes, Ordering::SeqCst);
        let result = unsafe { Address::from_usize(at) };
        assert!(result + bytes <= self.end, "test heap exhausted");
        result
    }

    pub fn alloc(&self, ty: &'static TypeDescriptor, num_components: usize) -> ObjectReference {
        let start = self.alloc_raw(ty.instance_size(num_components));
        unsafe { object_model::initialize_object(start, ty, num_components) }
    }

    /// The address of reference field `index` of `object`.
    pub fn slot(&self, object: ObjectReference, index: usize) -> Address {
        let mut slots = vec![];
        unsafe { object_model::for_each_reference_slot(object, |s| slots.push(s)) };
        slots[index]
    }

    pub fn set_field(&self, object: ObjectReference, index: usize, target: ObjectReference) {
        unsafe { self.slot(object, index).store(target) }
    }

    pub fn get_field(&self, object: ObjectReference, index: usize) -> ObjectReference {
        unsafe { self.slot(object, index).load() }
    }
}

/// A leaked object reference slot, as a host keeps for its static roots.
pub fn leak_slot(target: ObjectReference) -> &'static mut ObjectReference {
    Box::leak(Box::new(target))
}

/// A mock engine and a coordinator on top of it. Each fixture is independent.
pub struct EngineFixture {
    pub engine: &'static MockEngine,
    pub coordinator: &'static Coordinator,
}

impl EngineFixture {
    /// A fixture with default options and root verification on. The host configuration and
    /// the environment are not consulted.
    pub fn create() -> Self {
        Self::create_with_options(|_| {})
    }

    pub fn create_with_options<F: FnOnce(&mut GcOptions)>(set_options: F) -> Self {
        let mut options = GcOptions::default();
        options.verify_root_scan = true;
        set_options(&mut options);
        let engine = MockEngine::new().leak();
        let coordinator = Box::leak(Box::new(Coordinator::with_options(engine, options)));
        EngineFixture {
            engine,
            coordinator,
        }
    }

    /// A fixture whose coordinator loads its options from the mock engine's configuration,
    /// after `setup` has filled it in.
    pub fn create_from_host<F: FnOnce(&MockEngine)>(setup: F) -> Self {
        let engine = MockEngine::new().leak();
        setup(engine);
        let coordinator = Box::leak(Box::new(Coordinator::new(engine)));
        EngineFixture {
            engine,
            coordinator,
        }
    }
}

/// Threads that attach to a registry, enter cooperative mode, and count loop iterations,
/// polling for a safepoint in each.
pub struct RunningMutators {
    stop: Arc<AtomicBool>,
    progress: Arc<Vec<AtomicUsize>>,
    handles: Vec<JoinHandle<()>>,
}

impl RunningMutators {
    /// Start `n` mutators. Returns once all of them are in cooperative mode.
    pub fn start(registry: &'static ThreadRegistry, n: usize) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let progress: Arc<Vec<AtomicUsize>> =
            Arc::new((0..n).map(|_| AtomicUsize::new(0)).collect());
        let (ready_tx, ready_rx) = crossbeam::channel::bounded(n);
        let handles = (0..n)
            .map(|i| {
                let stop = stop.clone();
                let progress = progress.clone();
                let ready_tx = ready_tx.clone();
                std::thread::spawn(move || {
                    let h = registry.attach_current_thread(&format!("mutator-{}", i));
                    registry.disable_preemptive_gc(h);
                    ready_tx.send(()).unwrap();
                    while !stop.load(Ordering::SeqCst) {
                        registry.poll_safepoint(h);
                        progress[i].fetch_add(1, Ordering::SeqCst);
                        std::hint::spin_loop();
                    }
                    registry.enable_preemptive_gc(h);
                    registry.detach_current_thread();
                })
            })
            .collect();
        for _ in 0..n {
            ready_rx.recv().unwrap();
        }
        RunningMutators {
            stop,
            progress,
            handles,
        }
    }

    pub fn progress(&self) -> Vec<usize> {
        self.progress
            .iter()
            .map(|p| p.load(Ordering::SeqCst))
            .collect()
    }

    /// Wait until every mutator has moved past `snapshot`.
    pub fn wait_for_progress(&self, snapshot: &[usize]) {
        while self
            .progress()
            .iter()
            .zip(snapshot)
            .any(|(now, before)| now <= before)
        {
            std::thread::yield_now();
        }
    }

    /// Stop and join the mutators. The execution engine must not be suspended.
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        for handle in self.handles {
            handle.join().unwrap();
        }
    }
}
