/// The behavior of a mock method for one call.
pub type MockBehavior<I, R> = Box<dyn Fn(I) -> R + Send + Sync>;

/// A host method of the mock engine whose behavior a test can replace. Calls are counted.
///
/// A method built from several behaviors uses them in turn, one per call, and starts over
/// after the last one.
pub struct MockMethod<I, R> {
    behaviors: Vec<MockBehavior<I, R>>,
    calls: usize,
}

impl<I, R> Default for MockMethod<I, R> {
    fn default() -> Self {
        Self::new_unimplemented()
    }
}

impl<I, R> MockMethod<I, R> {
    /// Panics when called.
    pub fn new_unimplemented() -> Self {
        Self::new_fixed(Box::new(|_| unimplemented!("mock method without a behavior")))
    }

    pub fn new_default() -> Self
    where
        R: Default,
    {
        Self::new_fixed(Box::new(|_| R::default()))
    }

    pub fn new_fixed(behavior: MockBehavior<I, R>) -> Self {
        Self::new_sequence(vec![behavior])
    }

    pub fn new_sequence(behaviors: Vec<MockBehavior<I, R>>) -> Self {
        assert!(!behaviors.is_empty(), "a mock method needs a behavior");
        Self {
            behaviors,
            calls: 0,
        }
    }

    pub fn call(&mut self, args: I) -> R {
        let behavior = &self.behaviors[self.calls % self.behaviors.len()];
        self.calls += 1;
        behavior(args)
    }

    pub fn call_count(&self) -> usize {
        self.calls
    }
}
