//! Helpers for tests and benchmarks: a mock execution engine, fixtures built on it, and a few
//! harness functions.

use std::panic;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

pub mod fixtures;
pub mod mock_engine;
pub mod mock_method;

/// Run `f` on another thread, and fail if it does not finish within `millis`. Suspension
/// tests use this so that a lost wake-up shows up as a failure instead of a hang.
pub fn panic_after<T, F>(millis: u64, f: F) -> T
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (finished_tx, finished_rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let result = f();
        // The receiver is gone if we already timed out.
        let _ = finished_tx.send(());
        result
    });

    match finished_rx.recv_timeout(Duration::from_millis(millis)) {
        Ok(()) => match worker.join() {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        },
        Err(mpsc::RecvTimeoutError::Disconnected) => match worker.join() {
            Err(payload) => panic::resume_unwind(payload),
            Ok(_) => unreachable!("the worker finished without signalling"),
        },
        Err(mpsc::RecvTimeoutError::Timeout) => {
            panic!("Test did not finish within {} ms", millis)
        }
    }
}

lazy_static! {
    // Held by tests that touch the process environment or the global logger.
    static ref SERIAL_TEST_LOCK: Mutex<()> = Mutex::default();
}

/// Run `f` while no other `serial_test` runs.
pub fn serial_test<F: FnOnce()>(f: F) {
    // A failed test poisons the lock. The others still run.
    let _guard = SERIAL_TEST_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    f();
}

/// Run `test`, then `cleanup` even if `test` panicked.
pub fn with_cleanup<T, C>(test: T, cleanup: C)
where
    T: FnOnce() + panic::UnwindSafe,
    C: FnOnce(),
{
    let result = panic::catch_unwind(test);
    cleanup();
    if let Err(payload) = result {
        panic::resume_unwind(payload);
    }
}
