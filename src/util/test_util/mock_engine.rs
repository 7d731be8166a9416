// Some tests are conditionally compiled. So not all the code in this module will be used. We simply allow dead code in this module.
#![allow(dead_code)]

use crate::barrier::{WriteBarrier, WriteBarrierParameters};
use crate::diagnostics::{DiagWalkContext, GcReason, SurvivorWalk};
use crate::lifecycle::{pinning, FinalizerError, SyncBlockCache};
use crate::roots::{self, ScanContext};
use crate::suspension::SuspendReason;
use crate::thread::{AllocContext, ThreadHandle, ThreadRegistry};
use crate::util::{Address, ObjectReference};
use crate::vm::{
    Diagnostics, DomainId, ExecutionEngine, Generation, HostString, RootFlags, RootVisitor,
    TypeDescriptor,
};

use super::mock_method::*;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

static FREE_TYPE: TypeDescriptor = TypeDescriptor::FREE;

macro_rules! mock {
    ($engine: expr, $fn: ident($($arg:expr),*)) => {
        $engine.write_hooks(|hooks| hooks.$fn.call(($($arg),*)))
    };
}

/// The payload of the panic raised by [`MockEngine::handle_fatal_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatalError(pub u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEntry {
    Bool(bool),
    Int(i64),
    Str(String),
}

/// A diagnostics hook invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagEvent {
    GcStart {
        gen: Generation,
        induced: bool,
    },
    UpdateGenerationBounds,
    GcEnd {
        index: usize,
        gen: Generation,
        reason: GcReason,
        concurrent: bool,
    },
    Walk {
        walk: SurvivorWalk,
        gc_index: usize,
        objects: Vec<ObjectReference>,
    },
}

/// Host methods whose behavior a test may replace.
pub struct MockHooks {
    pub ref_counted_handle_callbacks: MockMethod<ObjectReference, bool>,
    pub eager_finalized: MockMethod<ObjectReference, Result<bool, FinalizerError>>,
    pub should_finalize_object_for_unload: MockMethod<(DomainId, ObjectReference), bool>,
    pub force_full_gc_to_be_blocking: MockMethod<(), bool>,
}

impl Default for MockHooks {
    fn default() -> Self {
        Self {
            ref_counted_handle_callbacks: MockMethod::new_default(),
            eager_finalized: MockMethod::new_fixed(Box::new(|_| Ok(false))),
            should_finalize_object_for_unload: MockMethod::new_default(),
            force_full_gc_to_be_blocking: MockMethod::new_default(),
        }
    }
}

/// An execution engine for tests. Threads live in a [`ThreadRegistry`] and report their
/// shadow stacks as roots, the write barrier is a [`WriteBarrier`], and the sync-block cache is
/// a [`SyncBlockCache`]. Every call into the engine is logged.
pub struct MockEngine {
    pub registry: &'static ThreadRegistry,
    pub barrier: WriteBarrier,
    pub sync_blocks: SyncBlockCache,
    /// Addresses of slots reported as static roots, in order. A slot may be listed twice.
    pub static_roots: Mutex<Vec<Address>>,
    /// Objects whose pinned targets are reported during root scanning.
    pub async_pinned: Mutex<Vec<ObjectReference>>,
    hooks: Mutex<MockHooks>,
    calls: Mutex<Vec<&'static str>>,
    config: Mutex<HashMap<String, ConfigEntry>>,
    strings_handed_out: AtomicUsize,
    strings_freed: AtomicUsize,
    outstanding_strings: Mutex<HashSet<usize>>,
    finalization_signals: Mutex<Vec<bool>>,
    fatal_errors: Mutex<Vec<u32>>,
    diag_events: Mutex<Vec<DiagEvent>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            registry: Box::leak(Box::new(ThreadRegistry::new())),
            barrier: WriteBarrier::new(),
            sync_blocks: SyncBlockCache::new(),
            static_roots: Mutex::new(vec![]),
            async_pinned: Mutex::new(vec![]),
            hooks: Mutex::new(MockHooks::default()),
            calls: Mutex::new(vec![]),
            config: Mutex::new(HashMap::new()),
            strings_handed_out: AtomicUsize::new(0),
            strings_freed: AtomicUsize::new(0),
            outstanding_strings: Mutex::new(HashSet::new()),
            finalization_signals: Mutex::new(vec![]),
            fatal_errors: Mutex::new(vec![]),
            diag_events: Mutex::new(vec![]),
        }
    }

    pub fn leak(self) -> &'static MockEngine {
        Box::leak(Box::new(self))
    }

    pub fn write_hooks<F, R>(&self, func: F) -> R
    where
        F: FnOnce(&mut MockHooks) -> R,
    {
        let mut lock = self
            .hooks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        func(&mut lock)
    }

    pub fn set_config(&self, key: &str, value: ConfigEntry) {
        self.config.lock().unwrap().insert(key.to_string(), value);
    }

    pub fn add_static_root(&self, slot: &'static mut ObjectReference) {
        self.static_roots
            .lock()
            .unwrap()
            .push(Address::from_mut_ptr(slot as *mut ObjectReference));
    }

    fn record(&self, call: &'static str) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take_calls(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn call_count(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    pub fn strings_handed_out(&self) -> usize {
        self.strings_handed_out.load(Ordering::SeqCst)
    }

    pub fn strings_freed(&self) -> usize {
        self.strings_freed.load(Ordering::SeqCst)
    }

    pub fn finalization_signals(&self) -> Vec<bool> {
        self.finalization_signals.lock().unwrap().clone()
    }

    pub fn fatal_errors(&self) -> Vec<u32> {
        self.fatal_errors.lock().unwrap().clone()
    }

    pub fn diag_events(&self) -> Vec<DiagEvent> {
        self.diag_events.lock().unwrap().clone()
    }

    fn record_diag(&self, event: DiagEvent) {
        self.diag_events.lock().unwrap().push(event);
    }

    fn record_walk(&self, walk: SurvivorWalk, ctx: &DiagWalkContext) {
        self.record_diag(DiagEvent::Walk {
            walk,
            gc_index: ctx.gc_index,
            objects: ctx.objects.to_vec(),
        });
    }
}

impl Diagnostics for MockEngine {
    fn diag_gc_start(&self, gen: Generation, induced: bool) {
        self.record("diag_gc_start");
        self.record_diag(DiagEvent::GcStart { gen, induced });
    }

    fn diag_update_generation_bounds(&self) {
        self.record("diag_update_generation_bounds");
        self.record_diag(DiagEvent::UpdateGenerationBounds);
    }

    fn diag_gc_end(&self, index: usize, gen: Generation, reason: GcReason, concurrent: bool) {
        self.record("diag_gc_end");
        self.record_diag(DiagEvent::GcEnd {
            index,
            gen,
            reason,
            concurrent,
        });
    }

    fn diag_walk_freachable_objects(&self, ctx: &DiagWalkContext) {
        self.record_walk(SurvivorWalk::FReachable, ctx);
    }

    fn diag_walk_survivors(&self, ctx: &DiagWalkContext) {
        self.record_walk(SurvivorWalk::Survivors, ctx);
    }

    fn diag_walk_loh_survivors(&self, ctx: &DiagWalkContext) {
        self.record_walk(SurvivorWalk::LohSurvivors, ctx);
    }

    fn diag_walk_bgc_survivors(&self, ctx: &DiagWalkContext) {
        self.record_walk(SurvivorWalk::BgcSurvivors, ctx);
    }
}

impl ExecutionEngine for MockEngine {
    fn suspend_ee(&self, _reason: SuspendReason) {
        self.record("suspend_ee");
        self.registry.request_suspend();
    }

    fn restart_ee(&self, _finished_gc: bool) {
        self.record("restart_ee");
        self.registry.end_suspend();
    }

    fn gc_scan_roots(
        &self,
        visitor: &mut dyn RootVisitor,
        _condemned: Generation,
        _max_gen: Generation,
        sc: &mut ScanContext,
    ) {
        self.record("gc_scan_roots");
        roots::scan_thread_roots(self.registry, visitor, sc);
        for slot in self.static_roots.lock().unwrap().iter() {
            let slot: &mut ObjectReference = unsafe { &mut *slot.to_mut_ptr() };
            if !slot.is_null() {
                visitor.visit_root(slot, sc, RootFlags::NONE);
            }
        }
        for wrapper in self.async_pinned.lock().unwrap().iter() {
            unsafe { pinning::walk_async_pinned_for_promotion(*wrapper, sc, visitor) };
        }
    }

    fn gc_start_work(&self, _condemned: Generation, _max_gen: Generation) {
        self.record("gc_start_work");
    }

    fn after_gc_scan_roots(&self, _condemned: Generation, _max_gen: Generation, _sc: &ScanContext) {
        self.record("after_gc_scan_roots");
    }

    fn gc_before_bgc_sweep_work(&self) {
        self.record("gc_before_bgc_sweep_work");
    }

    fn gc_done(&self, _condemned: Generation) {
        self.record("gc_done");
    }

    fn ref_counted_handle_callbacks(&self, object: ObjectReference) -> bool {
        self.record("ref_counted_handle_callbacks");
        mock!(self, ref_counted_handle_callbacks(object))
    }

    fn sync_block_cache_weak_ptr_scan(&self, scan: &mut dyn FnMut(&mut ObjectReference)) {
        self.record("sync_block_cache_weak_ptr_scan");
        self.sync_blocks.weak_ptr_scan(scan);
    }

    fn sync_block_cache_demote(&self, max_gen: Generation) {
        self.record("sync_block_cache_demote");
        self.sync_blocks.demote(max_gen);
    }

    fn sync_block_cache_promotions_granted(&self, max_gen: Generation) {
        self.record("sync_block_cache_promotions_granted");
        self.sync_blocks.promotions_granted(max_gen);
    }

    fn is_preemptive_gc_disabled(&self, thread: ThreadHandle) -> bool {
        self.registry.is_preemptive_gc_disabled(thread)
    }

    fn enable_preemptive_gc(&self, thread: ThreadHandle) {
        self.registry.enable_preemptive_gc(thread)
    }

    fn disable_preemptive_gc(&self, thread: ThreadHandle) {
        self.registry.disable_preemptive_gc(thread)
    }

    fn get_thread(&self) -> Option<ThreadHandle> {
        self.registry.current()
    }

    fn trap_returning_threads(&self) -> bool {
        self.registry.trap_returning_threads()
    }

    fn get_alloc_context(
        &self,
        thread: ThreadHandle,
        f: &mut dyn FnMut(&mut AllocContext),
    ) -> bool {
        match self.registry.get(thread) {
            Some(t) => {
                f(&mut t.alloc_context.borrow_mut());
                true
            }
            None => false,
        }
    }

    fn catch_at_safe_point(&self, thread: ThreadHandle) -> bool {
        self.registry.catch_at_safe_point(thread)
    }

    fn gc_enum_alloc_contexts(&self, f: &mut dyn FnMut(&mut AllocContext)) {
        self.record("gc_enum_alloc_contexts");
        self.registry
            .for_each(|_, t| f(&mut t.alloc_context.borrow_mut()));
    }

    fn create_thread(
        &self,
        body: Box<dyn FnOnce() + Send>,
        suspendable: bool,
        name: &str,
    ) -> bool {
        self.record("create_thread");
        self.registry.spawn_engine_thread(body, suspendable, name)
    }

    fn enumerate_threads(&self, f: &mut dyn FnMut(ThreadHandle)) {
        self.registry.for_each(|h, _| f(h));
    }

    fn is_thread_at_safe_point(&self, thread: ThreadHandle) -> bool {
        self.registry.is_thread_at_safe_point(thread)
    }

    fn is_gc_thread(&self) -> bool {
        self.registry.is_gc_thread()
    }

    fn was_current_thread_created_by_gc(&self) -> bool {
        ThreadRegistry::was_current_thread_created_by_gc()
    }

    fn stomp_write_barrier(&self, params: &WriteBarrierParameters) {
        self.record("stomp_write_barrier");
        self.barrier.install(params);
    }

    fn enable_finalization(&self, found_finalizers: bool) {
        self.record("enable_finalization");
        self.finalization_signals
            .lock()
            .unwrap()
            .push(found_finalizers);
    }

    fn handle_fatal_error(&self, exit_code: u32) -> ! {
        self.record("handle_fatal_error");
        self.fatal_errors.lock().unwrap().push(exit_code);
        std::panic::panic_any(FatalError(exit_code))
    }

    fn should_finalize_object_for_unload(&self, domain: DomainId, object: ObjectReference) -> bool {
        mock!(self, should_finalize_object_for_unload(domain, object))
    }

    fn eager_finalized(&self, object: ObjectReference) -> Result<bool, FinalizerError> {
        self.record("eager_finalized");
        mock!(self, eager_finalized(object))
    }

    fn force_full_gc_to_be_blocking(&self) -> bool {
        self.record("force_full_gc_to_be_blocking");
        mock!(self, force_full_gc_to_be_blocking())
    }

    fn get_free_object_method_table(&self) -> &'static TypeDescriptor {
        &FREE_TYPE
    }

    fn get_boolean_config_value(&self, key: &str) -> Option<bool> {
        match self.config.lock().unwrap().get(key) {
            Some(ConfigEntry::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    fn get_int_config_value(&self, key: &str) -> Option<i64> {
        match self.config.lock().unwrap().get(key) {
            Some(ConfigEntry::Int(i)) => Some(*i),
            _ => None,
        }
    }

    fn get_string_config_value(&self, key: &str) -> Option<HostString> {
        match self.config.lock().unwrap().get(key) {
            Some(ConfigEntry::Str(s)) => {
                let token = self.strings_handed_out.fetch_add(1, Ordering::SeqCst) + 1;
                self.outstanding_strings.lock().unwrap().insert(token);
                Some(HostString::new(s.as_str(), token))
            }
            _ => None,
        }
    }

    fn free_string_config_value(&self, value: HostString) {
        assert!(
            self.outstanding_strings
                .lock()
                .unwrap()
                .remove(&value.token()),
            "string {:?} is freed twice or was never handed out",
            value
        );
        self.strings_freed.fetch_add(1, Ordering::SeqCst);
    }

    fn walk_async_pinned_for_promotion(
        &self,
        object: ObjectReference,
        sc: &ScanContext,
        visitor: &mut dyn RootVisitor,
    ) {
        unsafe { pinning::walk_async_pinned_for_promotion(object, sc, visitor) }
    }

    fn walk_async_pinned(
        &self,
        object: ObjectReference,
        callback: &mut dyn FnMut(ObjectReference, ObjectReference),
    ) {
        unsafe { pinning::walk_async_pinned(object, callback) }
    }
}
