// All the tests with prefix 'mock_test_' drive a `Coordinator` against `MockEngine`.
// Each test creates its own engine and coordinator through the fixtures in
// `crate::util::test_util::fixtures`, so the tests can run in parallel. Tests that read the
// process environment, such as the ones creating a coordinator with `Coordinator::new`, must
// run inside `serial_test`.

// Common includes for mock tests.
pub(crate) mod mock_test_prelude {
    pub use crate::util::test_util::fixtures::*;
    pub use crate::util::test_util::mock_engine::*;
    pub use crate::util::test_util::mock_method::*;
    pub use crate::util::test_util::{panic_after, serial_test};
    pub use crate::util::{Address, ObjectReference};
    pub use crate::vm::*;
    pub use crate::{Coordinator, ProtocolViolation, SuspendReason, SuspensionState};
}

mod mock_test_collection;
mod mock_test_diagnostics;
mod mock_test_fatal_error;
mod mock_test_handles;
mod mock_test_pinning;
mod mock_test_random_suspensions;
mod mock_test_root_scan;
mod mock_test_threads;
