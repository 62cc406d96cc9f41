//! Boot-loader state: the per-image records the header scan populates and the selector, revert gate, dependency resolver and rollback updater
//! mutate, replacing the C original's single global `state` pointer plus
//! `BOOT_CURR_IMG(state)` cursor convention with an explicit array indexed
//! by image number.
//!
//! `N` is a const generic standing in for the compile-time `BOOT_IMAGE_NUMBER`
//! macro: the number of logical images is fixed per build, so it is fixed
//! in the type rather than carried as a runtime field.

use crate::header::ImageHeader;
use crate::slot::SlotIndex;
use crate::trailer::SwapState;

/// Per-image slot-usage record.
#[derive(Debug, Copy, Clone, Default)]
pub struct SlotUsage {
    pub slot_available: [bool; 2],
    pub active_slot: Option<SlotIndex>,
    /// The last-read trailer of the active slot. Only populated in
    /// revert-enabled modes; `None` otherwise.
    pub swap_state: Option<SwapState>,
}

impl SlotUsage {
    pub fn is_available(&self, slot: SlotIndex) -> bool { self.slot_available[slot.as_usize()] }

    /// Clears availability for `slot` and un-commits it, the one mutation
    /// every admissibility filter performs on rejection.
    pub fn invalidate(&mut self, slot: SlotIndex) {
        self.slot_available[slot.as_usize()] = false;
        self.active_slot = None;
    }
}

pub struct BootLoaderState<const N: usize> {
    pub slot_usage: [SlotUsage; N],
    /// `true` at index `i` means image `i` is disabled for this boot.
    pub mask: [bool; N],
    pub headers: [[Option<ImageHeader>; 2]; N],
}

impl<const N: usize> BootLoaderState<N> {
    pub fn new(mask: [bool; N]) -> Self {
        BootLoaderState {
            slot_usage: [SlotUsage::default(); N],
            mask,
            headers: [[None; 2]; N],
        }
    }

    pub fn header(&self, image: usize, slot: SlotIndex) -> Option<&ImageHeader> {
        self.headers[image][slot.as_usize()].as_ref()
    }

    pub fn is_masked(&self, image: usize) -> bool { self.mask[image] }

    /// The lowest-indexed non-masked image, used to pick a single
    /// response among several logical images.
    pub fn first_unmasked(&self) -> Option<usize> { (0..N).find(|&i| !self.mask[i]) }
}
