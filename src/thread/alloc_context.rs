use crate::util::constants::{BYTES_IN_WORD, MIN_OBJECT_SIZE};
use crate::util::conversions;
use crate::util::Address;
use crate::vm::object_model::{self, TypeDescriptor};

/// A thread-local bump-pointer allocation buffer.
///
/// The unused part `[cursor, limit)` is either empty or at least [`MIN_OBJECT_SIZE`] bytes,
/// so it can always be retired into a free object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocContext {
    pub cursor: Address,
    pub limit: Address,
    /// Bytes handed out from this context since it was created.
    pub allocated_bytes: usize,
}

impl AllocContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new buffer `[start, end)`. The previous buffer must have been used up or retired.
    /// A non-empty buffer must be a whole number of words, and at least [`MIN_OBJECT_SIZE`].
    pub fn set_buffer(&mut self, start: Address, end: Address) {
        assert_eq!(
            self.remaining(),
            0,
            "the previous buffer {}..{} is not retired",
            self.cursor,
            self.limit
        );
        assert!(start <= end);
        debug_assert!(start.is_aligned_to(BYTES_IN_WORD));
        let bytes = end - start;
        assert!(
            bytes == 0 || (bytes >= MIN_OBJECT_SIZE && conversions::raw_is_aligned(bytes, BYTES_IN_WORD)),
            "buffer {}..{} cannot be retired into a free object",
            start,
            end
        );
        self.cursor = start;
        self.limit = end;
    }

    /// Allocate `size` bytes from the buffer. Returns `None` if the buffer cannot satisfy the
    /// request, including when it would leave a tail too small to hold a free object.
    pub fn alloc(&mut self, size: usize) -> Option<Address> {
        let size = conversions::align_up_to_word(size).max(MIN_OBJECT_SIZE);
        let remaining = self.remaining();
        if size > remaining {
            return None;
        }
        let tail = remaining - size;
        if tail != 0 && tail < MIN_OBJECT_SIZE {
            trace!(
                "refuse to allocate {} bytes at {}: would leave a {} byte gap",
                size,
                self.cursor,
                tail
            );
            return None;
        }
        let result = self.cursor;
        self.cursor += size;
        self.allocated_bytes += size;
        Some(result)
    }

    pub fn remaining(&self) -> usize {
        if self.cursor.is_zero() {
            0
        } else {
            self.limit - self.cursor
        }
    }

    /// Fill the unused tail with a free object and detach the buffer, so the heap stays walkable.
    /// Returns the number of bytes that were filled.
    ///
    /// # Safety
    /// The buffer must be writable memory that no other thread is using.
    pub unsafe fn retire(&mut self, free_type: &'static TypeDescriptor) -> usize {
        let remaining = self.remaining();
        if remaining > 0 {
            object_model::fill_with_free_object(self.cursor, remaining, free_type);
        }
        self.cursor = Address::ZERO;
        self.limit = Address::ZERO;
        remaining
    }
}
