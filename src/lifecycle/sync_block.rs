use crate::util::constants::MAX_GENERATION;
use crate::util::ObjectReference;
use crate::vm::Generation;

/// An entry of the sync-block cache: the lock/hash-code record of one object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct SyncBlock {
    object: ObjectReference,
    generation: Generation,
}

/// The host's sync-block cache, a toolkit for implementing the sync-block hooks of
/// [`crate::vm::ExecutionEngine`].
///
/// Mutators add entries during normal execution. The collector only touches the cache through
/// the weak scan, and through demotion and promotion while the execution engine is suspended.
#[derive(Default)]
pub struct SyncBlockCache {
    blocks: spin::Mutex<Vec<SyncBlock>>,
}

impl SyncBlockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the sync block of a newly allocated object.
    pub fn insert(&self, object: ObjectReference) {
        self.blocks.lock().push(SyncBlock {
            object,
            generation: 0,
        });
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn objects(&self) -> Vec<ObjectReference> {
        self.blocks.lock().iter().map(|b| b.object).collect()
    }

    pub fn generation_of(&self, object: ObjectReference) -> Option<Generation> {
        self.blocks
            .lock()
            .iter()
            .find(|b| b.object == object)
            .map(|b| b.generation)
    }

    /// Offer every entry's object slot to `scan`. The collector clears the slot of a dead
    /// object, or updates it for a moved one. Entries left null are freed. Returns the number
    /// of freed entries.
    pub fn weak_ptr_scan(&self, scan: &mut dyn FnMut(&mut ObjectReference)) -> usize {
        let mut blocks = self.blocks.lock();
        for block in blocks.iter_mut() {
            scan(&mut block.object);
        }
        let before = blocks.len();
        blocks.retain(|b| !b.object.is_null());
        let freed = before - blocks.len();
        if freed > 0 {
            debug!("Freed {} sync blocks of dead objects", freed);
        }
        freed
    }

    /// The collector will not promote the survivors of generations up to `max_gen`.
    pub fn demote(&self, max_gen: Generation) {
        for block in self.blocks.lock().iter_mut() {
            if block.generation <= max_gen {
                block.generation = 0;
            }
        }
    }

    /// The survivors of generations up to `max_gen` are promoted by one generation.
    pub fn promotions_granted(&self, max_gen: Generation) {
        for block in self.blocks.lock().iter_mut() {
            if block.generation <= max_gen {
                block.generation = (block.generation + 1).min(MAX_GENERATION);
            }
        }
    }
}
