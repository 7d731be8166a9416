//! Object lifecycle hand-offs between the collector and the host: ref-counted handles, the
//! sync-block cache, finalization, and objects pinned by asynchronous IO.

mod finalization;
mod handles;
pub mod pinning;
mod sync_block;

pub use self::finalization::{FinalizationHandoff, FinalizationReport, FinalizerError};
pub use self::handles::RefCountedHandles;
pub use self::sync_block::SyncBlockCache;
