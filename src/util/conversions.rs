use crate::util::constants::*;
use crate::util::Address;

/* Alignment */

/// `align` must be a power of two.
pub const fn raw_align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

pub const fn raw_is_aligned(val: usize, align: usize) -> bool {
    val & (align - 1) == 0
}

/// Round a size in bytes up to whole words.
pub const fn align_up_to_word(bytes: usize) -> usize {
    raw_align_up(bytes, BYTES_IN_WORD)
}

/* Conversion */

/// The index of the card covering `addr` in a card table whose first card covers `base`.
pub fn address_to_card_index(base: Address, addr: Address) -> usize {
    (addr - base) >> LOG_BYTES_IN_CARD
}

/// The index of the page covering `addr` in a write-watch table whose first page covers `base`.
pub fn address_to_page_index(base: Address, addr: Address) -> usize {
    (addr - base) >> LOG_BYTES_IN_PAGE
}

pub fn bytes_to_cards_up(bytes: usize) -> usize {
    (bytes + BYTES_IN_CARD - 1) >> LOG_BYTES_IN_CARD
}

pub fn bytes_to_pages_up(bytes: usize) -> usize {
    (bytes + BYTES_IN_PAGE - 1) >> LOG_BYTES_IN_PAGE
}
