use super::config::HostString;
use super::object_model::TypeDescriptor;
use super::{Diagnostics, DomainId, Generation, RootVisitor};
use crate::barrier::WriteBarrierParameters;
use crate::lifecycle::FinalizerError;
use crate::roots::ScanContext;
use crate::suspension::SuspendReason;
use crate::thread::{AllocContext, ThreadHandle};
use crate::util::ObjectReference;

use downcast_rs::{impl_downcast, DowncastSync};

/// The capabilities the collector needs from the execution engine that hosts it.
///
/// Everything the collector does that requires the host to be informed, or that requires host
/// action, goes through this trait. The collector holds the host as
/// `&'static dyn ExecutionEngine` and only calls it through a [`crate::Coordinator`], which
/// enforces the order of the calls.
///
/// Hosts that keep their threads in a [`crate::thread::ThreadRegistry`] can implement most of
/// the thread queries by forwarding to it.
pub trait ExecutionEngine: Diagnostics + DowncastSync {
    // --- Suspension ---

    /// Stop the execution engine for the given reason.
    ///
    /// The host must make every thread returning to cooperative mode park at its next safepoint
    /// (set "trap returning threads"). It may return before all threads are stopped; the
    /// collector polls the thread states afterwards.
    fn suspend_ee(&self, reason: SuspendReason);

    /// Release the threads stopped by [`ExecutionEngine::suspend_ee`].
    ///
    /// Arguments:
    /// * `finished_gc`: Is the execution engine restarted because a collection is complete?
    fn restart_ee(&self, finished_gc: bool);

    // --- Roots ---

    /// Report every root to `visitor`. This includes the stack roots of every thread, and, for
    /// a full collection, the static roots.
    ///
    /// Arguments:
    /// * `visitor`: The callback for each root slot.
    /// * `condemned`: The oldest generation being collected.
    /// * `max_gen`: The oldest generation.
    /// * `sc`: The scan context. The host sets `thread_under_crawl` while it walks a stack.
    fn gc_scan_roots(
        &self,
        visitor: &mut dyn RootVisitor,
        condemned: Generation,
        max_gen: Generation,
        sc: &mut ScanContext,
    );

    /// The collector is about to start working on a collection.
    fn gc_start_work(&self, condemned: Generation, max_gen: Generation);

    /// The stack scan is complete. Threads are still suspended.
    fn after_gc_scan_roots(&self, condemned: Generation, max_gen: Generation, sc: &ScanContext);

    /// The sweep phase of a background collection is about to begin.
    fn gc_before_bgc_sweep_work(&self);

    /// A collection has completed.
    fn gc_done(&self, condemned: Generation);

    // --- Handles and sync blocks ---

    /// Should the ref-counted handle to `object` be promoted?
    fn ref_counted_handle_callbacks(&self, object: ObjectReference) -> bool;

    /// Offer the object slot of every sync block to `scan`. A slot cleared by `scan` frees
    /// the sync block.
    fn sync_block_cache_weak_ptr_scan(&self, scan: &mut dyn FnMut(&mut ObjectReference));

    /// The collector will demote the objects of generations up to `max_gen`.
    fn sync_block_cache_demote(&self, max_gen: Generation);

    /// The collector promoted the objects of generations up to `max_gen`.
    fn sync_block_cache_promotions_granted(&self, max_gen: Generation);

    // --- Threads ---

    /// Is the thread in cooperative mode?
    fn is_preemptive_gc_disabled(&self, thread: ThreadHandle) -> bool;

    /// Switch the thread to preemptive mode.
    fn enable_preemptive_gc(&self, thread: ThreadHandle);

    /// Switch the thread to cooperative mode. Blocks while a suspension is in progress.
    fn disable_preemptive_gc(&self, thread: ThreadHandle);

    /// The current thread, or `None` if it is unknown to the host. Threads started by
    /// [`ExecutionEngine::create_thread`] as non-suspendable are unknown.
    fn get_thread(&self) -> Option<ThreadHandle>;

    /// Is a suspension pending?
    fn trap_returning_threads(&self) -> bool;

    /// Run `f` on the allocation context of a thread. Returns false if the thread is gone.
    fn get_alloc_context(&self, thread: ThreadHandle, f: &mut dyn FnMut(&mut AllocContext))
        -> bool;

    /// Is the thread being asked to stop at a safepoint?
    fn catch_at_safe_point(&self, thread: ThreadHandle) -> bool;

    /// Run `f` on every allocation context.
    fn gc_enum_alloc_contexts(&self, f: &mut dyn FnMut(&mut AllocContext));

    /// Start a thread running `body`.
    ///
    /// Arguments:
    /// * `body`: The code the new thread runs.
    /// * `suspendable`: Does the thread take part in suspensions? Only suspendable threads are
    ///   returned by [`ExecutionEngine::get_thread`].
    /// * `name`: The name of the thread, for diagnostics.
    ///
    /// Returns true if the thread was started. Blocks until it is running.
    fn create_thread(&self, body: Box<dyn FnOnce() + Send>, suspendable: bool, name: &str)
        -> bool;

    /// Call `f` for every thread that takes part in suspensions.
    fn enumerate_threads(&self, f: &mut dyn FnMut(ThreadHandle));

    /// Is the thread parked at a safepoint?
    fn is_thread_at_safe_point(&self, thread: ThreadHandle) -> bool;

    /// Is the current thread able to do collector work: started for the collector, or the
    /// thread that suspended the execution engine?
    fn is_gc_thread(&self) -> bool;

    /// Was the current thread started for the collector?
    fn was_current_thread_created_by_gc(&self) -> bool;

    // --- Write barrier ---

    /// Install the write barrier described by `params`.
    ///
    /// If `params.is_runtime_suspended` is false, mutators are running, and must observe either
    /// the old barrier or the new one, never a mix.
    fn stomp_write_barrier(&self, params: &WriteBarrierParameters);

    // --- Finalization and fatal errors ---

    /// Wake the finalizer thread.
    ///
    /// Arguments:
    /// * `found_finalizers`: Did the last pass make objects ready for finalization?
    fn enable_finalization(&self, found_finalizers: bool);

    /// The collector cannot continue. The host must terminate the process with `exit_code`.
    fn handle_fatal_error(&self, exit_code: u32) -> !;

    /// Should `object` be finalized because `domain` is being unloaded?
    fn should_finalize_object_for_unload(&self, domain: DomainId, object: ObjectReference)
        -> bool;

    /// Offer the host to finalize a dead object right now, on the current thread.
    ///
    /// Returns `Ok(true)` if it did, `Ok(false)` if the collector should queue the object for
    /// the finalizer thread, and an error if the finalization failed. The collector queues the
    /// object in that case as well.
    fn eager_finalized(&self, object: ObjectReference) -> Result<bool, FinalizerError>;

    /// The collector is about to do a full background collection. Should it be blocking?
    fn force_full_gc_to_be_blocking(&self) -> bool;

    // --- Object model ---

    /// The type descriptor of free objects, used to keep the heap walkable.
    fn get_free_object_method_table(&self) -> &'static TypeDescriptor;

    // --- Configuration ---

    /// Look up a boolean configuration value. `None` if the host does not know the key.
    fn get_boolean_config_value(&self, key: &str) -> Option<bool>;

    /// Look up an integer configuration value. `None` if the host does not know the key.
    fn get_int_config_value(&self, key: &str) -> Option<i64>;

    /// Look up a string configuration value. `None` if the host does not know the key.
    /// A returned string must be given back with [`ExecutionEngine::free_string_config_value`].
    fn get_string_config_value(&self, key: &str) -> Option<HostString>;

    /// Release a string returned by [`ExecutionEngine::get_string_config_value`].
    fn free_string_config_value(&self, value: HostString);

    // --- Pinning ---

    /// If `object` wraps buffers of an asynchronous IO operation, report the objects it pins as
    /// pinned roots. A no-op for other objects.
    fn walk_async_pinned_for_promotion(
        &self,
        object: ObjectReference,
        sc: &ScanContext,
        visitor: &mut dyn RootVisitor,
    );

    /// If `object` wraps buffers of an asynchronous IO operation, call `callback(from, to)` for
    /// each object it pins. A no-op for other objects.
    fn walk_async_pinned(
        &self,
        object: ObjectReference,
        callback: &mut dyn FnMut(ObjectReference, ObjectReference),
    );
}

impl_downcast!(sync ExecutionEngine);
