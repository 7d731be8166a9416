use crate::barrier::WriteBarrierParameters;
use crate::build_info;
use crate::diagnostics::{DiagWalkContext, GcReason, SurvivorWalk};
use crate::error::ProtocolViolation;
use crate::global_state::GlobalState;
use crate::lifecycle::{FinalizationHandoff, FinalizationReport, RefCountedHandles};
use crate::roots::{RootScanReport, ScanContext, ScanMode, ScanPass, VerifyingRootVisitor};
use crate::suspension::{SuspendReason, SuspensionState};
use crate::thread::{AllocContext, ThreadHandle};
use crate::util::options::GcOptions;
use crate::util::ObjectReference;
use crate::vm::{ConfigString, DomainId, ExecutionEngine, Generation, RootFlags, RootVisitor};

use crossbeam::utils::Backoff;
use itertools::Itertools;
use probe::probe;
use std::ops::Deref;

/// What a suspension took.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SuspendStats {
    pub reason: SuspendReason,
    /// The number of threads that were brought to a safe state.
    pub threads: usize,
    /// The number of times the thread states were polled.
    pub polls: usize,
}

/// The collector side of the protocol.
///
/// A `Coordinator` owns the suspension state machine and is the only path through which the
/// collector calls the host. It checks that each call happens in a state that allows it, and
/// fires the diagnostics hooks at the right points.
///
/// After [`Coordinator::handle_fatal_error`] every operation fails with
/// [`ProtocolViolation::Terminated`] without calling the host.
pub struct Coordinator {
    engine: &'static dyn ExecutionEngine,
    state: GlobalState,
    options: GcOptions,
}

impl Coordinator {
    /// Create a coordinator for `engine`. The options are read from the environment and then
    /// from the host configuration, and the built-in logger is initialized.
    pub fn new(engine: &'static dyn ExecutionEngine) -> Coordinator {
        let mut options = GcOptions::default();
        options.read_env_var_settings();
        let invalid = options.load_from_host(engine);

        match crate::util::logger::try_init(Some(&options.log_file)) {
            Ok(_) => debug!("gcbridge initialized the logger."),
            Err(_) => debug!(
                "gcbridge failed to initialize the built-in env_logger. This is not an error; a logger may be set by the host."
            ),
        }
        for option in invalid {
            warn!(
                "Ignoring configuration {}: {}. Default value will be used.",
                option.key, option.reason
            );
        }
        Self::with_options(engine, options)
    }

    /// Create a coordinator with the given options, without consulting the host configuration.
    /// Options that fail validation are reset to their defaults.
    pub fn with_options(
        engine: &'static dyn ExecutionEngine,
        mut options: GcOptions,
    ) -> Coordinator {
        for option in options.validate() {
            warn!(
                "Ignoring option {}: {}. Default value will be used.",
                option.key, option.reason
            );
        }
        info!(
            "gcbridge {} ({}), features: {}",
            build_info::PKG_VERSION,
            *build_info::GIT_VERSION,
            build_info::FEATURES
        );
        debug!("Options: {:?}", options);
        Coordinator {
            engine,
            state: GlobalState::default(),
            options,
        }
    }

    pub fn engine(&self) -> &'static dyn ExecutionEngine {
        self.engine
    }

    /// The execution engine as its concrete type, or `None` if it is of another type.
    pub fn engine_as<E: ExecutionEngine>(&self) -> Option<&'static E> {
        let engine: &'static dyn ExecutionEngine = self.engine;
        engine.downcast_ref::<E>()
    }

    pub fn options(&self) -> &GcOptions {
        &self.options
    }

    pub fn state(&self) -> &GlobalState {
        &self.state
    }

    fn check_alive(&self) -> Result<(), ProtocolViolation> {
        if self.state.is_terminated() {
            Err(ProtocolViolation::Terminated)
        } else {
            Ok(())
        }
    }

    fn check_suspended(&self) -> Result<(), ProtocolViolation> {
        match self.state.state() {
            SuspensionState::Suspended => Ok(()),
            SuspensionState::Terminated => Err(ProtocolViolation::Terminated),
            _ => Err(ProtocolViolation::NotSuspended),
        }
    }

    fn transition(
        &self,
        from: SuspensionState,
        to: SuspensionState,
    ) -> Result<(), ProtocolViolation> {
        self.state.transition(from, to).map_err(|actual| match actual {
            SuspensionState::Terminated => ProtocolViolation::Terminated,
            _ => ProtocolViolation::IllegalTransition { from: actual, to },
        })
    }

    /* Suspension */

    /// Stop the execution engine, and wait until every thread is in preemptive mode or parked
    /// at a safepoint. There is no timeout: a warning naming the threads that do not stop is
    /// logged every `suspend_warn_polls` polls.
    pub fn suspend_ee(&self, reason: SuspendReason) -> Result<SuspendStats, ProtocolViolation> {
        self.state
            .transition(SuspensionState::Running, SuspensionState::SuspendRequested)
            .map_err(|actual| match actual {
                SuspensionState::Terminated => ProtocolViolation::Terminated,
                _ => ProtocolViolation::NestedSuspension,
            })?;
        self.state.set_reason(reason);
        debug!("Suspending the execution engine for {:?}", reason);
        probe!(gcbridge, suspend_start, reason as usize);

        self.engine.suspend_ee(reason);
        let (threads, polls) = self.wait_for_safe_threads();

        self.transition(SuspensionState::SuspendRequested, SuspensionState::AllThreadsSafe)?;
        self.transition(SuspensionState::AllThreadsSafe, SuspensionState::Suspended)?;
        debug!(
            "Suspended the execution engine: {} threads, {} polls",
            threads, polls
        );
        probe!(gcbridge, suspend_end, threads, polls);
        Ok(SuspendStats {
            reason,
            threads,
            polls,
        })
    }

    /// Poll the threads until all of them are safe. Returns the number of threads and polls.
    fn wait_for_safe_threads(&self) -> (usize, usize) {
        let engine = self.engine;
        let backoff = Backoff::new();
        let mut stragglers: Vec<ThreadHandle> = vec![];
        let mut polls = 0;
        loop {
            polls += 1;
            let mut threads = 0;
            stragglers.clear();
            engine.enumerate_threads(&mut |thread| {
                threads += 1;
                if engine.is_preemptive_gc_disabled(thread)
                    && !engine.is_thread_at_safe_point(thread)
                {
                    stragglers.push(thread);
                }
            });
            if stragglers.is_empty() {
                return (threads, polls);
            }
            if polls % self.options.suspend_warn_polls == 0 {
                warn!(
                    "Still waiting for {} thread(s) to reach a safepoint after {} polls: {}",
                    stragglers.len(),
                    polls,
                    stragglers.iter().join(", ")
                );
            }
            if backoff.is_completed() {
                std::thread::yield_now();
            } else {
                backoff.snooze();
            }
        }
    }

    /// Restart the execution engine.
    ///
    /// Arguments:
    /// * `finished_gc`: Is the execution engine restarted because a collection is complete?
    pub fn restart_ee(&self, finished_gc: bool) -> Result<(), ProtocolViolation> {
        self.state
            .transition(SuspensionState::Suspended, SuspensionState::Resuming)
            .map_err(|actual| match actual {
                SuspensionState::Terminated => ProtocolViolation::Terminated,
                _ => ProtocolViolation::NotSuspended,
            })?;
        self.engine.restart_ee(finished_gc);
        self.transition(SuspensionState::Resuming, SuspensionState::Running)?;
        debug!("Restarted the execution engine (finished_gc = {})", finished_gc);
        probe!(gcbridge, restart, finished_gc as usize);
        Ok(())
    }

    /// Suspend the execution engine and return a guard that gives access to the operations
    /// that need it suspended. The guard restarts the execution engine when it is resumed or
    /// dropped.
    pub fn stop_the_world(&self, reason: SuspendReason) -> Result<StoppedWorld, ProtocolViolation> {
        let stats = self.suspend_ee(reason)?;
        Ok(StoppedWorld {
            coordinator: self,
            stats,
            resumed: false,
        })
    }

    /* Collection bracket */

    /// A collection of `condemned` starts. Informs the host, fires `diag_gc_start`, and retires
    /// every allocation context.
    pub fn begin_collection(
        &self,
        condemned: Generation,
        max_gen: Generation,
        induced: bool,
    ) -> Result<(), ProtocolViolation> {
        self.check_suspended()?;
        assert!(
            self.state.begin_collection(),
            "a collection is already in progress"
        );
        trace!(
            "Begin collection {} of gen {} (max {}, induced = {})",
            self.state.gc_index(),
            condemned,
            max_gen,
            induced
        );
        self.engine.gc_start_work(condemned, max_gen);
        self.engine.diag_gc_start(condemned, induced);
        probe!(gcbridge, gc_start, condemned, induced as usize);
        self.fix_alloc_contexts()?;
        Ok(())
    }

    /// A collection ended. Informs the host and fires `diag_gc_end`. Returns the index of the
    /// finished collection.
    pub fn end_collection(
        &self,
        condemned: Generation,
        reason: GcReason,
        concurrent: bool,
    ) -> Result<usize, ProtocolViolation> {
        self.check_alive()?;
        assert!(self.state.is_in_collection(), "no collection in progress");
        self.engine.gc_done(condemned);
        let index = self.state.end_collection();
        self.engine
            .diag_gc_end(index, condemned, reason, concurrent);
        trace!(
            "End collection {} of gen {} ({:?}, concurrent = {})",
            index,
            condemned,
            reason,
            concurrent
        );
        probe!(gcbridge, gc_end, index, condemned);
        Ok(index)
    }

    /// Retire every allocation context into a free object, so the heap is walkable. Returns
    /// the number of bytes that were filled.
    pub fn fix_alloc_contexts(&self) -> Result<usize, ProtocolViolation> {
        self.check_suspended()?;
        let free_type = self.engine.get_free_object_method_table();
        let mut filled = 0;
        let mut contexts = 0;
        self.engine.gc_enum_alloc_contexts(&mut |context| {
            // Safety: the owners of the contexts are suspended, and the host hands out
            // buffers of heap memory.
            filled += unsafe { context.retire(free_type) };
            contexts += 1;
        });
        trace!("Retired {} allocation contexts, {} bytes", contexts, filled);
        Ok(filled)
    }

    /* Roots */

    /// Enumerate the roots for a collection of `condemned`. The execution engine must be
    /// suspended.
    ///
    /// If `verify_root_scan` is on, a slot reported twice is not forwarded to `visitor` again
    /// and the scan fails with [`ProtocolViolation::DuplicateRoot`] once the host is done.
    pub fn scan_roots(
        &self,
        visitor: &mut dyn RootVisitor,
        condemned: Generation,
        max_gen: Generation,
        mode: ScanMode,
    ) -> Result<RootScanReport, ProtocolViolation> {
        self.check_suspended()?;
        self.scan(visitor, condemned, max_gen, mode, ScanPass::Initial)
    }

    /// Tell the host that the sweep of a background collection is about to begin, and rescan
    /// the roots.
    pub fn rescan_roots_for_background_sweep(
        &self,
        visitor: &mut dyn RootVisitor,
        condemned: Generation,
        max_gen: Generation,
    ) -> Result<RootScanReport, ProtocolViolation> {
        self.check_suspended()?;
        self.engine.gc_before_bgc_sweep_work();
        self.scan(
            visitor,
            condemned,
            max_gen,
            ScanMode::Background,
            ScanPass::BackgroundRescan,
        )
    }

    fn scan(
        &self,
        visitor: &mut dyn RootVisitor,
        condemned: Generation,
        max_gen: Generation,
        mode: ScanMode,
        pass: ScanPass,
    ) -> Result<RootScanReport, ProtocolViolation> {
        let mut sc = ScanContext::new(self.state.next_scan_id(), condemned, max_gen, mode, pass);
        let verify = self.options.verify_root_scan;
        let mut verifying = VerifyingRootVisitor::new(visitor, verify);
        self.engine
            .gc_scan_roots(&mut verifying, condemned, max_gen, &mut sc);
        self.engine.after_gc_scan_roots(condemned, max_gen, &sc);

        let roots = verifying.roots();
        debug!("Scan {} ({:?}, {:?}) found {} roots", sc.id, mode, pass, roots);
        probe!(gcbridge, scan_roots, sc.id, roots);
        if let Some(slot) = verifying.first_duplicate() {
            return Err(ProtocolViolation::DuplicateRoot {
                slot,
                scan_id: sc.id,
            });
        }
        Ok(RootScanReport {
            scan_id: sc.id,
            roots,
            verified: verify,
        })
    }

    /* Write barrier */

    /// Install a write barrier. If `params.is_runtime_suspended`, the execution engine must be
    /// suspended. Fires `diag_update_generation_bounds` if the generation bounds change.
    pub fn stomp_write_barrier(
        &self,
        params: WriteBarrierParameters,
    ) -> Result<(), ProtocolViolation> {
        if params.is_runtime_suspended {
            self.check_suspended()?;
        } else {
            self.check_alive()?;
        }
        debug!("Stomp write barrier: {:?}", params.operation);
        self.engine.stomp_write_barrier(&params);
        if params.changes_generation_bounds() {
            self.engine.diag_update_generation_bounds();
        }
        probe!(gcbridge, stomp_write_barrier, params.operation as usize);
        Ok(())
    }

    /* Object lifecycle */

    /// Ask the host about every ref-counted handle. Promoted handles are reported to `visitor`,
    /// the others are released. Returns the number of promoted handles.
    pub fn promote_ref_counted_handles(
        &self,
        table: &mut RefCountedHandles,
        visitor: &mut dyn RootVisitor,
        sc: &ScanContext,
    ) -> Result<usize, ProtocolViolation> {
        self.check_suspended()?;
        let engine = self.engine;
        let promoted = table.promote(
            |object| engine.ref_counted_handle_callbacks(object),
            |slot| visitor.visit_root(slot, sc, RootFlags::NONE),
        );
        trace!("Promoted {} ref-counted handles", promoted);
        Ok(promoted)
    }

    /// Weak scan of the host's sync-block cache. This does not need a suspension.
    pub fn sync_block_cache_weak_ptr_scan(
        &self,
        scan: &mut dyn FnMut(&mut ObjectReference),
    ) -> Result<(), ProtocolViolation> {
        self.check_alive()?;
        self.engine.sync_block_cache_weak_ptr_scan(scan);
        Ok(())
    }

    pub fn sync_block_cache_demote(&self, max_gen: Generation) -> Result<(), ProtocolViolation> {
        self.check_suspended()?;
        self.engine.sync_block_cache_demote(max_gen);
        Ok(())
    }

    pub fn sync_block_cache_promotions_granted(
        &self,
        max_gen: Generation,
    ) -> Result<(), ProtocolViolation> {
        self.check_suspended()?;
        self.engine.sync_block_cache_promotions_granted(max_gen);
        Ok(())
    }

    /// Hand the dead finalization candidates over to the host. `is_live` returns the (possibly
    /// forwarded) reference of a candidate that survived, and `None` for a dead one.
    ///
    /// A dead candidate is first offered for eager finalization. If that fails it is queued
    /// for the finalizer thread like the others. The finalizer thread is signalled once.
    pub fn finalize(
        &self,
        handoff: &mut FinalizationHandoff,
        is_live: &mut dyn FnMut(ObjectReference) -> Option<ObjectReference>,
    ) -> Result<FinalizationReport, ProtocolViolation> {
        self.check_alive()?;
        let report = handoff.scan(self.engine, is_live);
        debug!("Finalization: {:?}", report);
        self.engine.enable_finalization(report.found_finalizers());
        Ok(report)
    }

    /// Queue the candidates that the host wants finalized because `domain` is being unloaded,
    /// reachable or not. Returns the number of queued objects.
    pub fn finalize_for_unload(
        &self,
        handoff: &mut FinalizationHandoff,
        domain: DomainId,
    ) -> Result<usize, ProtocolViolation> {
        self.check_alive()?;
        let queued = handoff.scan_for_unload(self.engine, domain);
        debug!("Queued {} objects of unloaded domain {:?}", queued, domain);
        self.engine.enable_finalization(queued > 0);
        Ok(queued)
    }

    /// Report the objects pinned by `object` as pinned roots.
    pub fn walk_async_pinned_for_promotion(
        &self,
        object: ObjectReference,
        sc: &ScanContext,
        visitor: &mut dyn RootVisitor,
    ) -> Result<(), ProtocolViolation> {
        self.check_suspended()?;
        self.engine
            .walk_async_pinned_for_promotion(object, sc, visitor);
        Ok(())
    }

    /// Call `callback(from, to)` for every object pinned by `object`.
    pub fn walk_async_pinned(
        &self,
        object: ObjectReference,
        callback: &mut dyn FnMut(ObjectReference, ObjectReference),
    ) -> Result<(), ProtocolViolation> {
        self.check_alive()?;
        self.engine.walk_async_pinned(object, callback);
        Ok(())
    }

    /* Diagnostics */

    /// Offer an object walk to the diagnostics hooks.
    pub fn report_survivors(
        &self,
        walk: SurvivorWalk,
        ctx: &DiagWalkContext,
    ) -> Result<(), ProtocolViolation> {
        self.check_alive()?;
        trace!(
            "Diagnostics walk {:?}: {} objects of collection {}",
            walk,
            ctx.objects.len(),
            ctx.gc_index
        );
        match walk {
            SurvivorWalk::FReachable => self.engine.diag_walk_freachable_objects(ctx),
            SurvivorWalk::Survivors => self.engine.diag_walk_survivors(ctx),
            SurvivorWalk::LohSurvivors => self.engine.diag_walk_loh_survivors(ctx),
            SurvivorWalk::BgcSurvivors => self.engine.diag_walk_bgc_survivors(ctx),
        }
        probe!(gcbridge, diag_walk, walk as usize, ctx.objects.len());
        Ok(())
    }

    /// The collector cannot continue. Moves to the terminal state and asks the host to
    /// terminate the process.
    pub fn handle_fatal_error(&self, exit_code: u32) -> ! {
        let previous = self.state.terminate();
        if previous == SuspensionState::Terminated {
            panic!(
                "fatal error {} raised after the collector was terminated",
                exit_code
            );
        }
        error!(
            "Fatal error in the collector (state {:?}), exit code {}",
            previous, exit_code
        );
        probe!(gcbridge, fatal_error, exit_code);
        self.engine.handle_fatal_error(exit_code)
    }

    /* Configuration */

    pub fn config_bool(&self, key: &str) -> Result<Option<bool>, ProtocolViolation> {
        self.check_alive()?;
        Ok(self.engine.get_boolean_config_value(key))
    }

    pub fn config_int(&self, key: &str) -> Result<Option<i64>, ProtocolViolation> {
        self.check_alive()?;
        Ok(self.engine.get_int_config_value(key))
    }

    /// Look up a string. The returned guard gives the string back to the host when dropped.
    pub fn config_string(
        &self,
        key: &str,
    ) -> Result<Option<ConfigString<'static>>, ProtocolViolation> {
        self.check_alive()?;
        Ok(self
            .engine
            .get_string_config_value(key)
            .map(|value| ConfigString::new(self.engine, value)))
    }

    /* Threads */

    /// Start a thread for the collector through the host.
    pub fn create_thread(
        &self,
        body: Box<dyn FnOnce() + Send>,
        suspendable: bool,
        name: &str,
    ) -> Result<bool, ProtocolViolation> {
        self.check_alive()?;
        let created = self.engine.create_thread(body, suspendable, name);
        if !created {
            warn!("The host could not create thread {}", name);
        }
        Ok(created)
    }

    pub fn current_thread(&self) -> Result<Option<ThreadHandle>, ProtocolViolation> {
        self.check_alive()?;
        Ok(self.engine.get_thread())
    }

    pub fn is_gc_thread(&self) -> Result<bool, ProtocolViolation> {
        self.check_alive()?;
        Ok(self.engine.is_gc_thread())
    }

    pub fn was_current_thread_created_by_gc(&self) -> Result<bool, ProtocolViolation> {
        self.check_alive()?;
        Ok(self.engine.was_current_thread_created_by_gc())
    }

    pub fn trap_returning_threads(&self) -> Result<bool, ProtocolViolation> {
        self.check_alive()?;
        Ok(self.engine.trap_returning_threads())
    }

    pub fn catch_at_safe_point(&self, thread: ThreadHandle) -> Result<bool, ProtocolViolation> {
        self.check_alive()?;
        Ok(self.engine.catch_at_safe_point(thread))
    }

    pub fn enable_preemptive_gc(&self, thread: ThreadHandle) -> Result<(), ProtocolViolation> {
        self.check_alive()?;
        self.engine.enable_preemptive_gc(thread);
        Ok(())
    }

    pub fn disable_preemptive_gc(&self, thread: ThreadHandle) -> Result<(), ProtocolViolation> {
        self.check_alive()?;
        self.engine.disable_preemptive_gc(thread);
        Ok(())
    }

    /// Run `f` on the allocation context of `thread`. Returns false if the thread is gone.
    pub fn with_alloc_context(
        &self,
        thread: ThreadHandle,
        f: &mut dyn FnMut(&mut AllocContext),
    ) -> Result<bool, ProtocolViolation> {
        self.check_alive()?;
        Ok(self.engine.get_alloc_context(thread, f))
    }

    /// Decide how a full collection runs. It is blocking if background collections are
    /// disabled, or if the host asks for it.
    pub fn choose_full_gc_mode(&self) -> Result<ScanMode, ProtocolViolation> {
        self.check_alive()?;
        let mode = if !self.options.concurrent_gc || self.engine.force_full_gc_to_be_blocking() {
            ScanMode::Blocking
        } else {
            ScanMode::Background
        };
        debug!("Full collection mode: {:?}", mode);
        Ok(mode)
    }
}

/// The execution engine is suspended while this guard exists.
///
/// Consume it with [`StoppedWorld::resume`]. Dropping it restarts the execution engine with
/// `finished_gc = false`.
pub struct StoppedWorld<'a> {
    coordinator: &'a Coordinator,
    stats: SuspendStats,
    resumed: bool,
}

impl StoppedWorld<'_> {
    pub fn stats(&self) -> SuspendStats {
        self.stats
    }

    /// Restart the execution engine.
    pub fn resume(mut self, finished_gc: bool) -> Result<(), ProtocolViolation> {
        self.resumed = true;
        self.coordinator.restart_ee(finished_gc)
    }
}

impl Deref for StoppedWorld<'_> {
    type Target = Coordinator;
    fn deref(&self) -> &Coordinator {
        self.coordinator
    }
}

impl Drop for StoppedWorld<'_> {
    fn drop(&mut self) {
        if self.resumed {
            return;
        }
        warn!(
            "The execution engine suspended for {:?} was not resumed explicitly. Restarting it.",
            self.stats.reason
        );
        if let Err(e) = self.coordinator.restart_ee(false) {
            debug!("Cannot restart the execution engine: {}", e);
        }
    }
}
