//! Slot selector: the central per-image state machine.
//!
//! Mode-specific admissibility is a trait with one
//! implementation per boot mode rather than a `#[cfg]`-duplicated function,
//! so the per-image loop below is written once and shared by both modes.
//! `REVERT` is a const generic on each mode marker because it is orthogonal
//! to XIP-vs-RAM_LOAD but still fixed at build time.

pub mod ram_stage;
pub mod revert;
pub mod rom_address;

use defmt_or_log::info;

use crate::area_cache::AreaCache;
use crate::collaborators::{FindSlotHook, HookOutcome, RamStage, SignatureValidator};
use crate::error::Error;
use crate::flash_area::FlashArea;
use crate::slot::SlotIndex;
use crate::state::BootLoaderState;
use ram_stage::RamView;

/// One mode's admissibility filters. Returns `Ok(true)` if
/// the slot is admitted (selection commits) or `Ok(false)` if it was
/// rejected, in which case the slot has already been invalidated and the
/// caller should loop back to slot selection. An `Err` is a hard failure
/// (I/O fault or a scramble that could not complete).
pub trait BootMode {
    fn admit<const N: usize, A: FlashArea, V: SignatureValidator, R: RamStage>(
        state: &mut BootLoaderState<N>,
        areas: &mut AreaCache<N, A>,
        image: usize,
        slot: SlotIndex,
        ram: &mut R,
        validator: &V,
    ) -> Result<bool, Error>;
}

/// DIRECT_XIP: ROM-address check, optional revert gate, then validation.
pub struct DirectXip<const REVERT: bool>;

impl<const REVERT: bool> BootMode for DirectXip<REVERT> {
    fn admit<const N: usize, A: FlashArea, V: SignatureValidator, R: RamStage>(
        state: &mut BootLoaderState<N>,
        areas: &mut AreaCache<N, A>,
        image: usize,
        slot: SlotIndex,
        _ram: &mut R,
        validator: &V,
    ) -> Result<bool, Error> {
        let header = *state.header(image, slot).ok_or(Error::Io)?;
        let area = areas.get_mut(image, slot.as_usize()).ok_or(Error::Io)?;

        if rom_address::is_address_mismatch(area, &header) {
            state.slot_usage[image].invalidate(slot);
            return Ok(false);
        }

        if REVERT {
            let (swap_state, outcome) = revert::select_or_erase(area)?;
            state.slot_usage[image].swap_state = Some(swap_state);
            if outcome == revert::RevertOutcome::Reject {
                state.slot_usage[image].invalidate(slot);
                return Ok(false);
            }
        }

        if !validator.validate(area, &header).is_success() {
            state.slot_usage[image].invalidate(slot);
            return Ok(false);
        }

        Ok(true)
    }
}

/// RAM_LOAD: optional revert gate, copy to RAM, then validation of the RAM
/// copy (the step that gives this mode its TOCTOU protection).
pub struct RamLoad<const REVERT: bool>;

impl<const REVERT: bool> BootMode for RamLoad<REVERT> {
    fn admit<const N: usize, A: FlashArea, V: SignatureValidator, R: RamStage>(
        state: &mut BootLoaderState<N>,
        areas: &mut AreaCache<N, A>,
        image: usize,
        slot: SlotIndex,
        ram: &mut R,
        validator: &V,
    ) -> Result<bool, Error> {
        let header = *state.header(image, slot).ok_or(Error::Io)?;

        {
            let area = areas.get_mut(image, slot.as_usize()).ok_or(Error::Io)?;

            if REVERT {
                let (swap_state, outcome) = revert::select_or_erase(area)?;
                state.slot_usage[image].swap_state = Some(swap_state);
                if outcome == revert::RevertOutcome::Reject {
                    state.slot_usage[image].invalidate(slot);
                    return Ok(false);
                }
            }

            if ram.load_image_to_sram(area, &header).is_err() {
                let _ = ram.remove_image_from_flash(area);
                state.slot_usage[image].invalidate(slot);
                return Ok(false);
            }
        }

        let staged_size = header.hdr_size as u32 + header.img_size + header.protect_tlv_size as u32;
        let view = RamView::new(ram, staged_size);
        let valid = validator.validate(&view, &header).is_success();
        if !valid {
            ram.remove_image_from_sram();
            state.slot_usage[image].invalidate(slot);
            return Ok(false);
        }

        Ok(true)
    }
}

/// Default policy: among available slots, the highest
/// version; ties go to the lowest slot index, since `SlotIndex::ALL` is
/// scanned in order and a later slot only replaces the candidate on a
/// strict win.
fn default_candidate<const N: usize>(state: &BootLoaderState<N>, image: usize) -> Option<SlotIndex> {
    let usage = &state.slot_usage[image];
    let mut best: Option<SlotIndex> = None;
    for slot in SlotIndex::ALL {
        if !usage.is_available(slot) {
            continue;
        }
        best = match best {
            None => Some(slot),
            Some(current_best) => {
                let current = state.header(image, current_best).expect("available slot has a header").version;
                let candidate = state.header(image, slot).expect("available slot has a header").version;
                if candidate.compare(&current) == 1 {
                    Some(slot)
                } else {
                    Some(current_best)
                }
            }
        };
    }
    best
}

/// Drives every non-masked image through selection until it either commits
/// or the boot fails outright. A single image with no remaining candidate
/// fails the whole call, matching the original's single shared return path.
pub fn select_all_images<const N: usize, M: BootMode, A: FlashArea, H: FindSlotHook, V: SignatureValidator, R: RamStage>(
    state: &mut BootLoaderState<N>,
    areas: &mut AreaCache<N, A>,
    hook: &mut H,
    ram: &mut R,
    validator: &V,
) -> Result<(), Error> {
    for image in 0..N {
        if state.is_masked(image) {
            continue;
        }
        loop {
            if state.slot_usage[image].active_slot.is_some() {
                break;
            }

            let candidate = match hook.find_next_slot(image) {
                HookOutcome::Resolved(slot) => Some(slot),
                HookOutcome::None => None,
                HookOutcome::Regular => default_candidate(state, image),
            };

            let candidate = candidate.ok_or(Error::NoCandidate)?;
            info!("image {} selecting slot {}", image, candidate.as_usize());
            state.slot_usage[image].active_slot = Some(candidate);

            if !M::admit::<N, A, V, R>(state, areas, image, candidate, ram, validator)? {
                continue;
            }
            info!("image {} committed to slot {}", image, candidate.as_usize());
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collaborators::NoHook;
    use crate::fih::FihResult;
    use crate::header::ImageHeader;
    use crate::testutil::{flat_id, FakeArea, FakeOpener};
    use crate::version::ImageVersion;

    struct AlwaysValid;
    impl SignatureValidator for AlwaysValid {
        fn validate<A: FlashArea>(&self, _area: &A, _header: &ImageHeader) -> FihResult { FihResult::success() }
    }

    struct AlwaysInvalid;
    impl SignatureValidator for AlwaysInvalid {
        fn validate<A: FlashArea>(&self, _area: &A, _header: &ImageHeader) -> FihResult { FihResult::failure() }
    }

    struct NoRam;
    impl RamStage for NoRam {
        fn load_image_to_sram<A: FlashArea>(&mut self, _area: &A, _header: &ImageHeader) -> Result<(), Error> { Ok(()) }
        fn remove_image_from_sram(&mut self) {}
        fn remove_image_from_flash<A: FlashArea>(&mut self, _area: &mut A) -> Result<(), Error> { Ok(()) }
        fn read(&self, _offset: u32, _buf: &mut [u8]) -> Result<(), Error> { Ok(()) }
    }

    fn scanned_state<const N: usize>(opener: &mut FakeOpener<N>, mask: [bool; N]) -> (BootLoaderState<N>, AreaCache<N, FakeArea>) {
        let areas = AreaCache::<N, FakeArea>::open_all(opener, &mask, flat_id).unwrap();
        let mut state = BootLoaderState::<N>::new(mask);
        crate::scan::scan_headers(&mut state, &areas).unwrap();
        (state, areas)
    }

    #[test]
    fn prefers_higher_version_between_two_valid_slots() {
        let mut opener = FakeOpener::<1>::new();
        opener.area_mut(0, 0).write_valid_header(ImageVersion::new(1, 0, 0, 0), false);
        opener.area_mut(0, 1).write_valid_header(ImageVersion::new(2, 0, 0, 0), false);
        let (mut state, mut areas) = scanned_state(&mut opener, [false]);

        select_all_images::<1, DirectXip<false>, _, _, _, _>(&mut state, &mut areas, &mut NoHook, &mut NoRam, &AlwaysValid).unwrap();
        assert_eq!(state.slot_usage[0].active_slot, Some(SlotIndex::Secondary));
    }

    #[test]
    fn falls_back_to_secondary_when_primary_invalid() {
        let mut opener = FakeOpener::<1>::new();
        opener.area_mut(0, 0).write_header_bytes(&[0u8; crate::header::HEADER_SIZE]);
        opener.area_mut(0, 1).write_valid_header(ImageVersion::new(1, 0, 0, 0), false);
        let (mut state, mut areas) = scanned_state(&mut opener, [false]);

        select_all_images::<1, DirectXip<false>, _, _, _, _>(&mut state, &mut areas, &mut NoHook, &mut NoRam, &AlwaysValid).unwrap();
        assert_eq!(state.slot_usage[0].active_slot, Some(SlotIndex::Secondary));
    }

    #[test]
    fn validation_failure_moves_to_the_other_slot() {
        let mut opener = FakeOpener::<1>::new();
        opener.area_mut(0, 0).write_valid_header(ImageVersion::new(2, 0, 0, 0), false);
        opener.area_mut(0, 1).write_valid_header(ImageVersion::new(1, 0, 0, 0), false);
        let (mut state, mut areas) = scanned_state(&mut opener, [false]);

        struct RejectPrimary;
        impl SignatureValidator for RejectPrimary {
            fn validate<A: FlashArea>(&self, area: &A, _header: &ImageHeader) -> FihResult {
                FihResult::from(area.offset() != 0)
            }
        }

        select_all_images::<1, DirectXip<false>, _, _, _, _>(&mut state, &mut areas, &mut NoHook, &mut NoRam, &RejectPrimary).unwrap();
        assert_eq!(state.slot_usage[0].active_slot, Some(SlotIndex::Secondary));
        assert!(!state.slot_usage[0].is_available(SlotIndex::Primary));
    }

    #[test]
    fn no_candidate_anywhere_fails_selection() {
        let mut opener = FakeOpener::<1>::new();
        let (mut state, mut areas) = scanned_state(&mut opener, [false]);

        let result = select_all_images::<1, DirectXip<false>, _, _, _, _>(&mut state, &mut areas, &mut NoHook, &mut NoRam, &AlwaysValid);
        assert_eq!(result, Err(Error::NoCandidate));
    }

    #[test]
    fn rom_fixed_mismatch_is_rejected_in_favor_of_matching_slot() {
        let mut opener = FakeOpener::<1>::new();
        opener.area_mut(0, 0).write_valid_header(ImageVersion::new(1, 0, 0, 0), true);
        opener.area_mut(0, 0).set_load_addr(0x20000);
        opener.area_mut(0, 1).write_valid_header(ImageVersion::new(1, 0, 0, 0), true);
        let (mut state, mut areas) = scanned_state(&mut opener, [false]);

        select_all_images::<1, DirectXip<false>, _, _, _, _>(&mut state, &mut areas, &mut NoHook, &mut NoRam, &AlwaysValid).unwrap();
        assert_eq!(state.slot_usage[0].active_slot, Some(SlotIndex::Secondary));
    }

    #[test]
    fn ram_load_validates_through_the_ram_view() {
        let mut opener = FakeOpener::<1>::new();
        opener.area_mut(0, 0).write_valid_header(ImageVersion::new(1, 0, 0, 0), false);
        let (mut state, mut areas) = scanned_state(&mut opener, [false]);

        struct Recording {
            data: [u8; crate::testutil::AREA_SIZE],
        }
        impl RamStage for Recording {
            fn load_image_to_sram<A: FlashArea>(&mut self, area: &A, _h: &ImageHeader) -> Result<(), Error> {
                area.read(0, &mut self.data)
            }
            fn remove_image_from_sram(&mut self) {}
            fn remove_image_from_flash<A: FlashArea>(&mut self, _a: &mut A) -> Result<(), Error> { Ok(()) }
            fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
                let offset = offset as usize;
                buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
                Ok(())
            }
        }

        let mut ram = Recording { data: [0; crate::testutil::AREA_SIZE] };

        struct ChecksFirstByte;
        impl SignatureValidator for ChecksFirstByte {
            fn validate<A: FlashArea>(&self, area: &A, _header: &ImageHeader) -> FihResult {
                let mut b = [0u8];
                area.read(0, &mut b).unwrap();
                FihResult::from(b[0] == 0x23)
            }
        }

        select_all_images::<1, RamLoad<false>, _, _, _, _>(&mut state, &mut areas, &mut NoHook, &mut ram, &ChecksFirstByte).unwrap();
        assert_eq!(state.slot_usage[0].active_slot, Some(SlotIndex::Primary));
    }
}
