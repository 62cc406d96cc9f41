//! Header reader / validator.

use defmt_or_log::error;

use crate::area_cache::AreaCache;
use crate::error::Error;
use crate::flash_area::FlashArea;
use crate::header::{ImageHeader, HEADER_SIZE};
use crate::state::BootLoaderState;

/// Reads and sanity-checks the header in both slots of every non-masked
/// image, populating `slot_available` and the cached header. `active_slot`
/// is left at its initial `None`. Only an I/O fault is a hard failure; a
/// header that fails to parse just clears that slot's availability.
pub fn scan_headers<const N: usize, A: FlashArea>(
    state: &mut BootLoaderState<N>,
    areas: &AreaCache<N, A>,
) -> Result<(), Error> {
    for image in 0..N {
        if state.is_masked(image) {
            continue;
        }
        for slot in 0..2 {
            let area = match areas.get(image, slot) {
                Some(area) => area,
                None => continue,
            };
            let mut buf = [0u8; HEADER_SIZE];
            area.read(0, &mut buf).map_err(|_| {
                error!("i/o fault reading header for image {} slot {}", image, slot);
                Error::Io
            })?;
            let header = ImageHeader::parse(&buf, area.size());
            state.slot_usage[image].slot_available[slot] = header.is_some();
            state.headers[image][slot] = header;
        }
        state.slot_usage[image].active_slot = None;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::slot::SlotIndex;
    use crate::testutil::{flat_id, FakeArea, FakeOpener};

    #[test]
    fn io_fault_on_one_slot_fails_the_whole_scan() {
        let mut opener = FakeOpener::<1>::new();
        opener.area_mut(0, 0).write_header_bytes(&[0u8; HEADER_SIZE]);
        opener.area_mut(0, 0).fail_reads();
        let areas = AreaCache::<1, FakeArea>::open_all(&mut opener, &[false], |i, s| flat_id(i, s)).unwrap();
        let mut state = BootLoaderState::<1>::new([false]);
        assert_eq!(scan_headers(&mut state, &areas), Err(Error::Io));
    }

    #[test]
    fn invalid_header_just_marks_slot_unavailable() {
        let mut opener = FakeOpener::<1>::new();
        opener.area_mut(0, 0).write_header_bytes(&[0xAAu8; HEADER_SIZE]);
        opener.area_mut(0, 1).write_valid_header(crate::version::ImageVersion::new(1, 0, 0, 0), false);
        let areas = AreaCache::<1, FakeArea>::open_all(&mut opener, &[false], |i, s| flat_id(i, s)).unwrap();
        let mut state = BootLoaderState::<1>::new([false]);
        scan_headers(&mut state, &areas).unwrap();
        assert!(!state.slot_usage[0].is_available(SlotIndex::Primary));
        assert!(state.slot_usage[0].is_available(SlotIndex::Secondary));
        assert_eq!(state.slot_usage[0].active_slot, None);
    }
}
