//! Utilities shared by the collector side and the host toolkit.

/// Address and object reference types.
pub mod address;
/// Constants about memory layout.
pub mod constants;
/// Calculation, conversion and rounding for memory related numbers.
pub mod conversions;
/// Wrapper functions for the `log` crate.
pub mod logger;
/// Collector options, loaded from the host's configuration.
pub mod options;

/// Test utilities. The mock engine is only available to tests.
#[cfg(any(test, feature = "mock_test"))]
pub mod test_util;

pub use self::address::Address;
pub use self::address::ObjectReference;
