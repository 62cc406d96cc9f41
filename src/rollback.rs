//! Anti-rollback updater. Raises the persisted security counter of
//! every non-masked, committed image to match its active slot's own
//! counter value. Source and destination slot are the same slot: neither
//! XIP nor RAM_LOAD ever copies an image across slots, so there is nothing
//! to compare against except the value already stored for that slot.

use defmt_or_log::{error, info};

use crate::collaborators::SecurityCounterService;
use crate::error::Error;
use crate::state::BootLoaderState;
use crate::trailer::TrailerFlag;

/// Whether the revert-mode gate in [`update_all`] should hold the counter
/// back until the active image has confirmed itself at runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RevertGate {
    /// DIRECT_XIP with revert enabled: only update when `image_ok` is set.
    DirectXipRevert,
    /// Any other mode: always update.
    Ungated,
}

/// Raises the stored counter for every non-masked image with a committed
/// slot. Locks the counter afterwards when `lock` is `true`. A failure to
/// read, write or lock any single image's counter fails the whole boot,
/// matching the original's single shared error path.
pub fn update_all<const N: usize, S: SecurityCounterService>(
    state: &BootLoaderState<N>,
    counters: &mut S,
    gate: RevertGate,
    lock: bool,
) -> Result<(), Error> {
    for image in 0..N {
        if state.is_masked(image) {
            continue;
        }
        let slot = match state.slot_usage[image].active_slot {
            Some(slot) => slot,
            None => continue,
        };

        if gate == RevertGate::DirectXipRevert {
            let confirmed = state.slot_usage[image]
                .swap_state
                .map(|swap_state| swap_state.image_ok == TrailerFlag::Set)
                .unwrap_or(false);
            if !confirmed {
                continue;
            }
        }

        let value = counters.read(image, slot).map_err(|_| {
            error!("failed to read security counter for image {}", image);
            Error::RollbackUpdate
        })?;
        counters.write(image, slot, value).map_err(|_| {
            error!("failed to write security counter for image {}", image);
            Error::RollbackUpdate
        })?;
        info!("security counter for image {} raised to {}", image, value);

        if lock {
            counters.lock(image).map_err(|_| {
                error!("failed to lock security counter for image {}", image);
                Error::RollbackUpdate
            })?;
        }
    }
    Ok(())
}
