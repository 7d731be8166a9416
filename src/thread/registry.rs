use super::{MutatorThread, ThreadHandle};

use crossbeam::utils::Backoff;
use spin::RwLock;
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, ThreadId};

static NEXT_REGISTRY_ID: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    /// The registry id and handle of the current thread, if it is attached.
    static CURRENT: Cell<Option<(usize, ThreadHandle)>> = const { Cell::new(None) };
    /// Was the current thread started by `spawn_engine_thread`?
    static CREATED_BY_GC: Cell<bool> = const { Cell::new(false) };
}

struct Slot {
    generation: u32,
    thread: Option<Arc<MutatorThread>>,
}

/// The host's table of managed threads, and the safepoint machinery built on it.
///
/// Threads live in an arena and are named by [`ThreadHandle`]s. A slot is reused after its
/// thread exits; the handle generation tells a stale handle from the new owner.
///
/// Safepoints follow a store-then-load handshake on two flags. A thread entering cooperative
/// mode sets its `preemptive_gc_disabled` flag and then checks the trap; the suspender sets the
/// trap and then checks every thread's flag. With sequentially consistent accesses at least one
/// side observes the other, so no thread can slip into cooperative mode unnoticed.
pub struct ThreadRegistry {
    id: usize,
    slots: RwLock<Vec<Slot>>,
    /// Set while a suspension is requested or in effect.
    trap_returning_threads: AtomicBool,
    /// The thread that requested the current suspension.
    suspending_thread: spin::Mutex<Option<ThreadId>>,
    park_lock: Mutex<()>,
    resumed: Condvar,
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            slots: RwLock::new(vec![]),
            trap_returning_threads: AtomicBool::new(false),
            suspending_thread: spin::Mutex::new(None),
            park_lock: Mutex::new(()),
            resumed: Condvar::new(),
        }
    }

    /// Add a thread to the registry. The thread starts in preemptive mode.
    pub fn register(&self, name: &str, suspendable: bool, created_by_gc: bool) -> ThreadHandle {
        let thread = Arc::new(MutatorThread::new(
            name.to_string(),
            suspendable,
            created_by_gc,
        ));
        let mut slots = self.slots.write();
        let handle = match slots.iter().position(|s| s.thread.is_none()) {
            Some(index) => {
                let slot = &mut slots[index];
                slot.generation = slot.generation.wrapping_add(1);
                slot.thread = Some(thread);
                ThreadHandle::new(index as u32, slot.generation)
            }
            None => {
                slots.push(Slot {
                    generation: 0,
                    thread: Some(thread),
                });
                ThreadHandle::new((slots.len() - 1) as u32, 0)
            }
        };
        debug!("Registered thread {} as {}", name, handle);
        handle
    }

    /// Remove a thread. Returns false if the handle is stale.
    pub fn unregister(&self, handle: ThreadHandle) -> bool {
        let mut slots = self.slots.write();
        match slots.get_mut(handle.index()) {
            Some(slot) if slot.generation == handle.generation() && slot.thread.is_some() => {
                if let Some(thread) = slot.thread.take() {
                    debug_assert!(
                        !thread.is_preemptive_gc_disabled(),
                        "{:?} exits in cooperative mode",
                        thread
                    );
                    debug!("Unregistered thread {} ({})", thread.name(), handle);
                }
                true
            }
            _ => false,
        }
    }

    /// Register the current thread and remember its handle for [`ThreadRegistry::current`].
    pub fn attach_current_thread(&self, name: &str) -> ThreadHandle {
        let handle = self.register(name, true, CREATED_BY_GC.with(|c| c.get()));
        CURRENT.with(|c| c.set(Some((self.id, handle))));
        handle
    }

    pub fn detach_current_thread(&self) -> Option<ThreadHandle> {
        let handle = self.current()?;
        CURRENT.with(|c| c.set(None));
        self.unregister(handle);
        Some(handle)
    }

    /// The handle of the current thread, or `None` if it is not attached to this registry.
    pub fn current(&self) -> Option<ThreadHandle> {
        match CURRENT.with(|c| c.get()) {
            Some((id, handle)) if id == self.id => Some(handle),
            _ => None,
        }
    }

    pub fn get(&self, handle: ThreadHandle) -> Option<Arc<MutatorThread>> {
        let slots = self.slots.read();
        slots
            .get(handle.index())
            .filter(|s| s.generation == handle.generation())
            .and_then(|s| s.thread.clone())
    }

    fn thread(&self, handle: ThreadHandle) -> Arc<MutatorThread> {
        match self.get(handle) {
            Some(thread) => thread,
            None => panic!("{} is not a registered thread", handle),
        }
    }

    /// A snapshot of the registered threads. Threads registered later are not included.
    pub fn threads(&self) -> Vec<(ThreadHandle, Arc<MutatorThread>)> {
        let slots = self.slots.read();
        slots
            .iter()
            .enumerate()
            .filter_map(|(index, s)| {
                s.thread
                    .as_ref()
                    .map(|t| (ThreadHandle::new(index as u32, s.generation), t.clone()))
            })
            .collect()
    }

    pub fn for_each<F: FnMut(ThreadHandle, &MutatorThread)>(&self, mut f: F) {
        for (handle, thread) in self.threads() {
            f(handle, &thread);
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().iter().filter(|s| s.thread.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /* Mode switches. These are called by the thread itself. */

    /// Enter cooperative mode. Blocks while a suspension is in progress.
    pub fn disable_preemptive_gc(&self, handle: ThreadHandle) {
        let thread = self.thread(handle);
        loop {
            thread.preemptive_gc_disabled.store(true, Ordering::SeqCst);
            if !self.trap_returning_threads.load(Ordering::SeqCst) || self.is_suspending_thread() {
                return;
            }
            // Step back to preemptive mode and wait for the suspension to end.
            thread.preemptive_gc_disabled.store(false, Ordering::SeqCst);
            self.wait_for_resume();
        }
    }

    /// Leave cooperative mode. Never blocks.
    pub fn enable_preemptive_gc(&self, handle: ThreadHandle) {
        let thread = self.thread(handle);
        thread.preemptive_gc_disabled.store(false, Ordering::SeqCst);
    }

    /// Called by a cooperative thread at a safepoint. If a suspension is requested, park until
    /// the execution engine is restarted. Returns true if the thread parked.
    pub fn poll_safepoint(&self, handle: ThreadHandle) -> bool {
        if !self.trap_returning_threads.load(Ordering::SeqCst) || self.is_suspending_thread() {
            return false;
        }
        let thread = self.thread(handle);
        debug_assert!(thread.is_preemptive_gc_disabled());
        self.park(&thread);
        true
    }

    fn park(&self, thread: &MutatorThread) {
        trace!("{} parks at a safepoint", thread.name());
        loop {
            thread.at_safepoint.store(true, Ordering::SeqCst);
            self.wait_for_resume();
            thread.at_safepoint.store(false, Ordering::SeqCst);
            // A new suspension may have started between the wake-up and the store above.
            if !self.trap_returning_threads.load(Ordering::SeqCst) {
                break;
            }
        }
        trace!("{} leaves the safepoint", thread.name());
    }

    fn wait_for_resume(&self) {
        let mut guard = self.park_lock.lock().unwrap();
        while self.trap_returning_threads.load(Ordering::SeqCst) {
            guard = self.resumed.wait(guard).unwrap();
        }
    }

    /* Queries */

    pub fn trap_returning_threads(&self) -> bool {
        self.trap_returning_threads.load(Ordering::SeqCst)
    }

    /// Is the thread being asked to stop at its next safepoint?
    pub fn catch_at_safe_point(&self, handle: ThreadHandle) -> bool {
        self.trap_returning_threads()
            || self.get(handle).is_some_and(|t| t.is_suspend_pending())
    }

    pub fn is_preemptive_gc_disabled(&self, handle: ThreadHandle) -> bool {
        self.get(handle)
            .is_some_and(|t| t.is_preemptive_gc_disabled())
    }

    /// A thread that has exited counts as safe.
    pub fn is_thread_safe(&self, handle: ThreadHandle) -> bool {
        self.get(handle).map_or(true, |t| t.is_safe())
    }

    pub fn is_thread_at_safe_point(&self, handle: ThreadHandle) -> bool {
        self.get(handle).is_some_and(|t| t.is_at_safepoint())
    }

    /* Suspension. These are called by the suspending thread. */

    /// Set the trap and mark every thread as pending, without waiting.
    pub fn request_suspend(&self) {
        *self.suspending_thread.lock() = Some(thread::current().id());
        self.trap_returning_threads.store(true, Ordering::SeqCst);
        self.for_each(|_, t| t.suspend_pending.store(true, Ordering::SeqCst));
    }

    /// Wait until every registered thread is safe. Returns the number of polls it took.
    pub fn wait_until_all_safe(&self) -> usize {
        let backoff = Backoff::new();
        let mut polls = 0;
        loop {
            polls += 1;
            let mut all_safe = true;
            self.for_each(|_, t| {
                if t.is_safe() {
                    t.suspend_pending.store(false, Ordering::SeqCst);
                } else {
                    all_safe = false;
                }
            });
            if all_safe {
                return polls;
            }
            if backoff.is_completed() {
                thread::yield_now();
            } else {
                backoff.snooze();
            }
        }
    }

    /// Request a suspension and wait until it is in effect.
    pub fn begin_suspend(&self) -> usize {
        self.request_suspend();
        self.wait_until_all_safe()
    }

    /// Clear the trap and wake the parked threads.
    pub fn end_suspend(&self) {
        {
            let _guard = self.park_lock.lock().unwrap();
            self.for_each(|_, t| t.suspend_pending.store(false, Ordering::SeqCst));
            self.trap_returning_threads.store(false, Ordering::SeqCst);
            self.resumed.notify_all();
        }
        *self.suspending_thread.lock() = None;
    }

    fn is_suspending_thread(&self) -> bool {
        *self.suspending_thread.lock() == Some(thread::current().id())
    }

    /// Is the current thread a GC thread: either started for the collector, or the thread
    /// that suspended the execution engine?
    pub fn is_gc_thread(&self) -> bool {
        Self::was_current_thread_created_by_gc() || self.is_suspending_thread()
    }

    pub fn was_current_thread_created_by_gc() -> bool {
        CREATED_BY_GC.with(|c| c.get())
    }

    /// Start a thread for the collector. If `suspendable`, the thread is attached to the
    /// registry and takes part in suspensions. Blocks until the new thread runs, and returns
    /// false if it could not be started.
    pub fn spawn_engine_thread(
        &'static self,
        body: Box<dyn FnOnce() + Send>,
        suspendable: bool,
        name: &str,
    ) -> bool {
        let (started_tx, started_rx) = crossbeam::channel::bounded(1);
        let thread_name = name.to_string();
        let spawned = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                CREATED_BY_GC.with(|c| c.set(true));
                let handle = suspendable.then(|| self.attach_current_thread(&thread_name));
                // The creator only waits for the thread to be running.
                let _ = started_tx.send(handle);
                body();
                if handle.is_some() {
                    self.detach_current_thread();
                }
            });
        match spawned {
            Ok(_) => match started_rx.recv() {
                Ok(handle) => {
                    debug!("Started engine thread {} ({:?})", name, handle);
                    true
                }
                Err(_) => false,
            },
            Err(e) => {
                warn!("Failed to start engine thread {}: {}", name, e);
                false
            }
        }
    }
}
