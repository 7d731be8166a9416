//! The boundary with the execution engine.
//!
//! The host implements [`ExecutionEngine`] (which includes [`Diagnostics`]) and lays out
//! objects as [`object_model`] describes. Root scanning reports slots through [`RootVisitor`].

mod config;
mod diagnostics;
mod execution_engine;
pub mod object_model;
mod scanning;

pub use self::config::{ConfigString, HostString};
pub use self::diagnostics::Diagnostics;
pub use self::execution_engine::ExecutionEngine;
pub use self::object_model::{TypeDescriptor, TypeKind};
pub use self::scanning::{RootFlags, RootVisitor};

/// A generation number. Generation 0 is the youngest.
pub type Generation = usize;

/// The identity of an isolation domain whose objects may be finalized when it is unloaded.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DomainId(pub u32);
