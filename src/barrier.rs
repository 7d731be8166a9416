//! Write-barrier installation.
//!
//! The collector describes the barrier it needs with [`WriteBarrierParameters`] and passes them
//! to the host through `stomp_write_barrier`. A host that does not patch code can keep the
//! barrier state in a [`WriteBarrier`] and call [`WriteBarrier::record_store`] from its
//! reference-store path.

use crate::util::constants::DIRTY;
use crate::util::conversions;
use crate::util::{Address, ObjectReference};

use crossbeam::atomic::AtomicCell;
use std::sync::atomic::{AtomicU8, Ordering};
use strum_macros::IntoStaticStr;

/// Which part of the barrier changes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoStaticStr)]
pub enum WriteBarrierOp {
    /// The first installation. Every field is meaningful.
    Initialize,
    /// The heap grew or shrank: new card table, card bundle table and heap bounds.
    StompResize,
    /// The ephemeral range changed.
    StompEphemeral,
    /// Start recording written pages for a background collection.
    SwitchToWriteWatch,
    /// Stop recording written pages.
    SwitchToNonWriteWatch,
}

/// The arguments of a write-barrier installation. Only the fields named by `operation` are
/// meaningful.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WriteBarrierParameters {
    pub operation: WriteBarrierOp,
    /// Is the execution engine suspended during the installation? If not, the host must
    /// publish the change so that mutators see either the old or the new barrier.
    pub is_runtime_suspended: bool,
    /// Must the barrier check stores against `highest_address`?
    pub requires_upper_bounds_check: bool,
    pub card_table: Address,
    pub card_bundle_table: Address,
    pub lowest_address: Address,
    pub highest_address: Address,
    pub ephemeral_low: Address,
    pub ephemeral_high: Address,
    pub write_watch_table: Address,
}

impl WriteBarrierParameters {
    /// Parameters for `operation` with every address zero.
    pub fn new(operation: WriteBarrierOp, is_runtime_suspended: bool) -> Self {
        Self {
            operation,
            is_runtime_suspended,
            requires_upper_bounds_check: false,
            card_table: Address::ZERO,
            card_bundle_table: Address::ZERO,
            lowest_address: Address::ZERO,
            highest_address: Address::ZERO,
            ephemeral_low: Address::ZERO,
            ephemeral_high: Address::ZERO,
            write_watch_table: Address::ZERO,
        }
    }

    /// Does the installation change the generation bounds seen by diagnostics?
    pub fn changes_generation_bounds(&self) -> bool {
        matches!(
            self.operation,
            WriteBarrierOp::StompResize | WriteBarrierOp::StompEphemeral
        )
    }
}

/// The installed barrier state. Consumers always load it as a whole.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct BarrierGeometry {
    /// Bumped by every installation.
    pub epoch: u64,
    pub requires_upper_bounds_check: bool,
    /// One byte per card. The first card covers `lowest_address`.
    pub card_table: Address,
    /// One byte per [`CARDS_IN_BUNDLE`] cards. Zero if card bundles are not used.
    pub card_bundle_table: Address,
    pub lowest_address: Address,
    pub highest_address: Address,
    pub ephemeral_low: Address,
    pub ephemeral_high: Address,
    /// One byte per page. Zero when write watch is off.
    pub write_watch_table: Address,
}

pub const LOG_CARDS_IN_BUNDLE: usize = 5;
pub const CARDS_IN_BUNDLE: usize = 1 << LOG_CARDS_IN_BUNDLE;

impl BarrierGeometry {
    pub fn is_installed(&self) -> bool {
        !self.card_table.is_zero()
    }

    pub fn is_write_watch_enabled(&self) -> bool {
        !self.write_watch_table.is_zero()
    }

    /// The geometry after applying `params`.
    fn apply(&self, params: &WriteBarrierParameters) -> BarrierGeometry {
        let mut next = *self;
        next.epoch = self.epoch + 1;
        match params.operation {
            WriteBarrierOp::Initialize => {
                next.requires_upper_bounds_check = params.requires_upper_bounds_check;
                next.card_table = params.card_table;
                next.card_bundle_table = params.card_bundle_table;
                next.lowest_address = params.lowest_address;
                next.highest_address = params.highest_address;
                next.ephemeral_low = params.ephemeral_low;
                next.ephemeral_high = params.ephemeral_high;
                next.write_watch_table = params.write_watch_table;
            }
            WriteBarrierOp::StompResize => {
                next.requires_upper_bounds_check = params.requires_upper_bounds_check;
                next.card_table = params.card_table;
                next.card_bundle_table = params.card_bundle_table;
                next.lowest_address = params.lowest_address;
                next.highest_address = params.highest_address;
                // The ephemeral range may move with the heap.
                if !params.ephemeral_high.is_zero() {
                    next.ephemeral_low = params.ephemeral_low;
                    next.ephemeral_high = params.ephemeral_high;
                }
                if self.is_write_watch_enabled() {
                    next.write_watch_table = params.write_watch_table;
                }
            }
            WriteBarrierOp::StompEphemeral => {
                next.ephemeral_low = params.ephemeral_low;
                next.ephemeral_high = params.ephemeral_high;
            }
            WriteBarrierOp::SwitchToWriteWatch => {
                assert!(
                    !params.write_watch_table.is_zero(),
                    "switching to write watch without a table"
                );
                next.write_watch_table = params.write_watch_table;
            }
            WriteBarrierOp::SwitchToNonWriteWatch => {
                next.write_watch_table = Address::ZERO;
            }
        }
        next
    }
}

/// What a barrier did for one store.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StoreOutcome {
    /// The epoch of the geometry used.
    pub epoch: u64,
    /// The index of the card that was dirtied.
    pub card: Option<usize>,
    /// The index of the write-watch page that was dirtied.
    pub page: Option<usize>,
}

/// A software write barrier whose geometry can be replaced while mutators run.
///
/// The geometry and its epoch are replaced in one atomic store, so a store either uses the
/// complete old geometry or the complete new one.
pub struct WriteBarrier {
    geometry: AtomicCell<BarrierGeometry>,
}

impl Default for WriteBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBarrier {
    pub fn new() -> Self {
        Self {
            geometry: AtomicCell::new(BarrierGeometry::default()),
        }
    }

    pub fn geometry(&self) -> BarrierGeometry {
        self.geometry.load()
    }

    pub fn epoch(&self) -> u64 {
        self.geometry.load().epoch
    }

    /// Apply an installation. Returns the new epoch.
    pub fn install(&self, params: &WriteBarrierParameters) -> u64 {
        let mut current = self.geometry.load();
        loop {
            let next = current.apply(params);
            match self.geometry.compare_exchange(current, next) {
                Ok(_) => {
                    debug!(
                        "Installed write barrier {:?} epoch {}: heap {}..{}, ephemeral {}..{}, write watch {}",
                        params.operation,
                        next.epoch,
                        next.lowest_address,
                        next.highest_address,
                        next.ephemeral_low,
                        next.ephemeral_high,
                        next.is_write_watch_enabled()
                    );
                    return next.epoch;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Run the barrier for a store of `target` into `slot`.
    ///
    /// # Safety
    /// The installed tables must cover the installed heap range. If the installed geometry does
    /// not require an upper bounds check, `slot` must be below `highest_address`.
    pub unsafe fn record_store(&self, slot: Address, target: ObjectReference) -> StoreOutcome {
        let g = self.geometry.load();
        let mut outcome = StoreOutcome {
            epoch: g.epoch,
            card: None,
            page: None,
        };
        if !g.is_installed() || slot < g.lowest_address {
            return outcome;
        }
        if g.requires_upper_bounds_check && slot >= g.highest_address {
            return outcome;
        }
        if !target.is_null()
            && target
                .to_raw_address()
                .is_in(g.ephemeral_low, g.ephemeral_high)
        {
            let card = conversions::address_to_card_index(g.lowest_address, slot);
            (g.card_table + card).atomic_store::<AtomicU8>(DIRTY, Ordering::Relaxed);
            if !g.card_bundle_table.is_zero() {
                (g.card_bundle_table + (card >> LOG_CARDS_IN_BUNDLE))
                    .atomic_store::<AtomicU8>(DIRTY, Ordering::Relaxed);
            }
            outcome.card = Some(card);
        }
        if g.is_write_watch_enabled() {
            let page = conversions::address_to_page_index(g.lowest_address, slot);
            (g.write_watch_table + page).atomic_store::<AtomicU8>(DIRTY, Ordering::Relaxed);
            outcome.page = Some(page);
        }
        outcome
    }
}

/// Bytes needed by a card table covering `[lowest, highest)`.
pub fn card_table_size(lowest: Address, highest: Address) -> usize {
    conversions::bytes_to_cards_up(highest - lowest)
}

/// Bytes needed by a write-watch table covering `[lowest, highest)`.
pub fn write_watch_table_size(lowest: Address, highest: Address) -> usize {
    conversions::bytes_to_pages_up(highest - lowest)
}
