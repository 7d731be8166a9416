use super::ExecutionEngine;

use std::fmt;
use std::ops::Deref;

/// A string the host allocated to answer a configuration lookup. It must be handed back to
/// the host through [`ExecutionEngine::free_string_config_value`].
///
/// The `token` is for the host's own bookkeeping of the allocation.
#[derive(Debug, PartialEq, Eq)]
pub struct HostString {
    value: Box<str>,
    token: usize,
}

impl HostString {
    pub fn new(value: impl Into<Box<str>>, token: usize) -> Self {
        Self {
            value: value.into(),
            token,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn token(&self) -> usize {
        self.token
    }
}

/// A configuration string borrowed from the host. Dropping it returns the string to the host,
/// exactly once, on every path.
pub struct ConfigString<'a> {
    engine: &'a dyn ExecutionEngine,
    value: Option<HostString>,
}

impl<'a> ConfigString<'a> {
    pub(crate) fn new(engine: &'a dyn ExecutionEngine, value: HostString) -> Self {
        Self {
            engine,
            value: Some(value),
        }
    }

    pub fn as_str(&self) -> &str {
        self.value.as_ref().map_or("", |v| v.as_str())
    }
}

impl Deref for ConfigString<'_> {
    type Target = str;
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl Drop for ConfigString<'_> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.engine.free_string_config_value(value);
        }
    }
}

impl fmt::Debug for ConfigString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for ConfigString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
