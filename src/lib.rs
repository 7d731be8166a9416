//! gcbridge is the protocol between a tracing garbage collector and the execution engine
//! (EE) that hosts it.
//!
//! The collector never touches the threads, stacks or handle tables of the host. Instead it
//! talks to the host through the [`vm::ExecutionEngine`] trait, and the [`Coordinator`] makes
//! sure the calls happen in an order the host can rely on:
//!
//! * Suspension: the collector stops the EE with [`Coordinator::suspend_ee`], which returns
//!   once every thread is in preemptive mode or parked at a safepoint
//!   (see [`thread::ThreadRegistry`] for the thread side of this handshake). Most operations
//!   below are only allowed while the EE is suspended.
//! * Roots: [`Coordinator::scan_roots`] has the host report every root slot, and can verify
//!   that no slot is reported twice.
//! * Write barrier: the host installs barriers described by [`barrier::WriteBarrierParameters`].
//!   [`barrier::WriteBarrier`] is a barrier a host can embed.
//! * Object lifecycle: ref-counted handles, the sync-block cache, finalization and objects
//!   pinned by asynchronous IO ([`lifecycle`]).
//! * Diagnostics: hooks at the start and end of each collection, and walks of survivors.
//! * Configuration: typed lookups of host settings, from which the [`util::options::GcOptions`]
//!   are loaded.
//!
//! A host implements [`vm::ExecutionEngine`], leaks it to get a `&'static` reference, and
//! creates one [`Coordinator`] for the process.

#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod barrier;
pub mod build_info;
mod coordinator;
pub mod diagnostics;
mod error;
mod global_state;
pub mod lifecycle;
pub mod roots;
pub mod suspension;
pub mod thread;
pub mod util;
pub mod vm;

pub use crate::coordinator::{Coordinator, StoppedWorld, SuspendStats};
pub use crate::error::ProtocolViolation;
pub use crate::global_state::GlobalState;
pub use crate::suspension::{SuspendReason, SuspensionState};
