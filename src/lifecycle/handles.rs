use crate::util::ObjectReference;

/// A table of ref-counted handles. Such a handle keeps its target alive only while the host
/// holds an external reference to it, which the collector learns by asking the host during
/// each collection.
#[derive(Default, Debug)]
pub struct RefCountedHandles {
    handles: Vec<ObjectReference>,
}

impl RefCountedHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: ObjectReference) {
        debug_assert!(!object.is_null());
        self.handles.push(object);
    }

    pub fn handles(&self) -> &[ObjectReference] {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Keep the handles for which `is_promoted` holds, reporting each kept slot to `report`,
    /// and release the rest. Returns the number of promoted handles.
    pub(crate) fn promote<P, R>(&mut self, mut is_promoted: P, mut report: R) -> usize
    where
        P: FnMut(ObjectReference) -> bool,
        R: FnMut(&mut ObjectReference),
    {
        self.handles.retain(|h| {
            let keep = is_promoted(*h);
            if !keep {
                trace!("Release ref-counted handle to {}", h);
            }
            keep
        });
        for slot in self.handles.iter_mut() {
            report(slot);
        }
        self.handles.len()
    }
}
