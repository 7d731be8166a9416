#[cfg(target_pointer_width = "32")]
pub const LOG_BYTES_IN_WORD: u8 = 2;
#[cfg(target_pointer_width = "64")]
pub const LOG_BYTES_IN_WORD: u8 = 3;
pub const BYTES_IN_WORD: usize = 1 << LOG_BYTES_IN_WORD;

/// Granularity of the write-watch table.
pub const LOG_BYTES_IN_PAGE: u8 = 12;
pub const BYTES_IN_PAGE: usize = 1 << LOG_BYTES_IN_PAGE;

// One card covers 32 words.
pub const LOG_BYTES_IN_CARD: u8 = LOG_BYTES_IN_WORD + 5;
pub const BYTES_IN_CARD: usize = 1 << LOG_BYTES_IN_CARD;

/// The value of a dirty card, card bundle or write-watch page.
pub const DIRTY: u8 = 0xff;

/// The smallest object the heap can hold: a type descriptor pointer plus one word.
/// A free object of this size has zero components.
pub const MIN_OBJECT_SIZE: usize = 2 * BYTES_IN_WORD;

/// The oldest generation. Generations `0..=MAX_GENERATION` are ordinary generations.
pub const MAX_GENERATION: usize = 2;
