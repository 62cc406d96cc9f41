//! Dependency resolver. Runs only when `N > 1`.

use defmt_or_log::debug;

use crate::area_cache::AreaCache;
use crate::collaborators::{RamStage, TlvIterator, TlvStep};
use crate::error::Error;
use crate::flash_area::FlashArea;
use crate::state::BootLoaderState;
use crate::version::ImageVersion;

/// Tag under which the TLV iterator presents a dependency entry.
pub const IMAGE_TLV_DEPENDENCY: u16 = 0x0040;

/// On-flash body: `image_id(1) + pad(3) + image_version(8)`, 12 bytes.
const DEPENDENCY_TLV_LEN: u16 = 12;
static_assertions::const_assert_eq!(DEPENDENCY_TLV_LEN, 12);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageDependency {
    pub image_id: u8,
    pub min_version: ImageVersion,
}

impl ImageDependency {
    fn parse(bytes: &[u8; DEPENDENCY_TLV_LEN as usize]) -> Self {
        let image_id = bytes[0];
        let major = bytes[4];
        let minor = bytes[5];
        let revision = u16::from_le_bytes([bytes[6], bytes[7]]);
        let build = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        ImageDependency { image_id, min_version: ImageVersion::new(major, minor, revision, build) }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DependencyOutcome {
    Done,
    Retry,
}

/// Walks every non-masked image's committed slot for `IMAGE_TLV_DEPENDENCY`
/// entries and checks each against the dependency target's currently
/// committed version. Returns on the *first* image with an unsatisfied or
/// malformed dependency, exactly as the original does; later images are
/// re-checked on the next pass after the orchestrator retries selection.
pub fn resolve<const N: usize, A: FlashArea, T: TlvIterator, R: RamStage>(
    state: &mut BootLoaderState<N>,
    areas: &AreaCache<N, A>,
    tlv: &mut T,
    ram: &mut R,
) -> Result<DependencyOutcome, Error> {
    if N <= 1 {
        // preserved from the degenerate-loop open question: with at most
        // one image there is nothing to depend on, so this never enters
        // the retry loop below.
        return Ok(DependencyOutcome::Done);
    }

    for image in 0..N {
        if state.is_masked(image) {
            continue;
        }
        let slot = match state.slot_usage[image].active_slot {
            Some(slot) => slot,
            None => continue,
        };
        let area = areas.get(image, slot.as_usize()).ok_or(Error::Io)?;
        let header = *state.header(image, slot).ok_or(Error::Io)?;

        tlv.iter_begin(area, &header, IMAGE_TLV_DEPENDENCY, true)?;

        loop {
            let (offset, len) = match tlv.iter_next(area)? {
                TlvStep::Entry { offset, len } => (offset, len),
                TlvStep::End => break,
            };

            if len != DEPENDENCY_TLV_LEN {
                return Err(Error::BadDependencyTlv);
            }

            let mut bytes = [0u8; DEPENDENCY_TLV_LEN as usize];
            area.read(offset, &mut bytes).map_err(|_| Error::Io)?;
            let dep = ImageDependency::parse(&bytes);

            if dep.image_id as usize >= N {
                return Err(Error::BadDependencyTlv);
            }

            let dep_slot = state.slot_usage[dep.image_id as usize].active_slot;
            let satisfied = match dep_slot {
                Some(dep_slot) => state
                    .header(dep.image_id as usize, dep_slot)
                    .map(|dep_header| dep_header.version.compare(&dep.min_version) >= 0)
                    .unwrap_or(false),
                None => false,
            };

            if !satisfied {
                debug!("image {} depends on unsatisfied image {}, retrying selection", image, dep.image_id);
                // DIRECT_XIP builds wire a no-op RamStage, so this is free
                // there; RAM_LOAD builds actually need the SRAM copy of the
                // rejected image cleared before the orchestrator retries.
                ram.remove_image_from_sram();
                state.slot_usage[image].invalidate(slot);
                return Ok(DependencyOutcome::Retry);
            }
        }
    }

    Ok(DependencyOutcome::Done)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::slot::SlotIndex;
    use crate::testutil::{flat_id, FakeArea, FakeOpener};

    /// A [`TlvIterator`] fake keyed by the area's own offset, so each
    /// image's TLV stream can declare a different dependency list instead
    /// of all images sharing one.
    struct TableTlv {
        table: &'static [(u32, &'static [(u8, ImageVersion)])],
        deps: &'static [(u8, ImageVersion)],
        pos: usize,
    }

    impl TableTlv {
        fn new(table: &'static [(u32, &'static [(u8, ImageVersion)])]) -> Self {
            TableTlv { table, deps: &[], pos: 0 }
        }
    }

    impl TlvIterator for TableTlv {
        fn iter_begin<A: FlashArea>(&mut self, area: &A, _header: &crate::header::ImageHeader, _tag: u16, _protected_only: bool) -> Result<(), Error> {
            self.deps = self.table.iter().find(|(offset, _)| *offset == area.offset()).map(|(_, deps)| *deps).unwrap_or(&[]);
            self.pos = 0;
            Ok(())
        }
        fn iter_next<A: FlashArea>(&mut self, _area: &A) -> Result<TlvStep, Error> {
            if self.pos >= self.deps.len() {
                return Ok(TlvStep::End);
            }
            let off = 200 + (self.pos * 100) as u32;
            self.pos += 1;
            Ok(TlvStep::Entry { offset: off, len: DEPENDENCY_TLV_LEN })
        }
    }

    struct NoRam;
    impl RamStage for NoRam {
        fn load_image_to_sram<A: FlashArea>(&mut self, _a: &A, _h: &crate::header::ImageHeader) -> Result<(), Error> { Ok(()) }
        fn remove_image_from_sram(&mut self) {}
        fn remove_image_from_flash<A: FlashArea>(&mut self, _a: &mut A) -> Result<(), Error> { Ok(()) }
        fn read(&self, _offset: u32, _buf: &mut [u8]) -> Result<(), Error> { Ok(()) }
    }

    fn write_dep_at(area: &mut FakeArea, offset: u32, dep_image_id: u8, min_version: ImageVersion) {
        let mut bytes = [0u8; DEPENDENCY_TLV_LEN as usize];
        bytes[0] = dep_image_id;
        bytes[4] = min_version.major;
        bytes[5] = min_version.minor;
        bytes[6..8].copy_from_slice(&min_version.revision.to_le_bytes());
        bytes[8..12].copy_from_slice(&min_version.build.to_le_bytes());
        area.write(offset, &bytes).unwrap();
    }

    #[test]
    fn single_image_never_enters_the_loop() {
        let mut opener = FakeOpener::<1>::new();
        let areas = AreaCache::<1, FakeArea>::open_all(&mut opener, &[false], flat_id).unwrap();
        let mut state = BootLoaderState::<1>::new([false]);
        let mut tlv = TableTlv::new(&[]);
        let mut ram = NoRam;
        assert_eq!(resolve(&mut state, &areas, &mut tlv, &mut ram), Ok(DependencyOutcome::Done));
    }

    #[test]
    fn satisfied_dependency_is_done() {
        let mut opener = FakeOpener::<2>::new();
        opener.area_mut(1, 0).write_valid_header(ImageVersion::new(1, 0, 0, 0), false);
        write_dep_at(opener.area_mut(1, 0), 200, 0, ImageVersion::new(2, 0, 0, 0));
        let mut areas = AreaCache::<2, FakeArea>::open_all(&mut opener, &[false, false], flat_id).unwrap();

        let mut state = BootLoaderState::<2>::new([false, false]);
        state.headers[0][0] = Some(crate::header::ImageHeader {
            magic: crate::header::IMAGE_MAGIC,
            load_addr: 0,
            hdr_size: 32,
            protect_tlv_size: 0,
            img_size: 0,
            flags: 0,
            version: ImageVersion::new(2, 0, 0, 0),
        });
        state.slot_usage[0].slot_available[0] = true;
        state.slot_usage[0].active_slot = Some(SlotIndex::Primary);
        state.headers[1][0] = Some(crate::header::ImageHeader {
            magic: crate::header::IMAGE_MAGIC,
            load_addr: 0,
            hdr_size: 32,
            protect_tlv_size: 0,
            img_size: 0,
            flags: 0,
            version: ImageVersion::new(1, 0, 0, 0),
        });
        state.slot_usage[1].slot_available[0] = true;
        state.slot_usage[1].active_slot = Some(SlotIndex::Primary);

        let mut tlv = TableTlv::new(&[(0x20000, &[(0, const { ImageVersion::new(2, 0, 0, 0)) })])]);
        let mut ram = NoRam;
        assert_eq!(resolve(&mut state, &mut areas, &mut tlv, &mut ram), Ok(DependencyOutcome::Done));
    }

    #[test]
    fn unsatisfied_dependency_invalidates_requester_and_retries() {
        let mut opener = FakeOpener::<2>::new();
        let mut areas = AreaCache::<2, FakeArea>::open_all(&mut opener, &[false, false], flat_id).unwrap();

        let mut state = BootLoaderState::<2>::new([false, false]);
        state.headers[0][0] = Some(crate::header::ImageHeader {
            magic: crate::header::IMAGE_MAGIC,
            load_addr: 0,
            hdr_size: 32,
            protect_tlv_size: 0,
            img_size: 0,
            flags: 0,
            version: ImageVersion::new(1, 0, 0, 0),
        });
        state.slot_usage[0].slot_available[0] = true;
        state.slot_usage[0].active_slot = Some(SlotIndex::Primary);
        state.headers[1][0] = Some(crate::header::ImageHeader {
            magic: crate::header::IMAGE_MAGIC,
            load_addr: 0,
            hdr_size: 32,
            protect_tlv_size: 0,
            img_size: 0,
            flags: 0,
            version: ImageVersion::new(1, 0, 0, 0),
        });
        state.slot_usage[1].slot_available[0] = true;
        state.slot_usage[1].active_slot = Some(SlotIndex::Primary);

        let mut tlv = TableTlv::new(&[(0x20000, &[(0, const { ImageVersion::new(2, 0, 0, 0)) })])]);
        let mut ram = NoRam;
        let outcome = resolve(&mut state, &mut areas, &mut tlv, &mut ram).unwrap();
        assert_eq!(outcome, DependencyOutcome::Retry);
        assert_eq!(state.slot_usage[1].active_slot, None);
        assert!(!state.slot_usage[1].is_available(SlotIndex::Primary));
    }

    #[test]
    fn out_of_range_dependency_is_fatal() {
        let mut opener = FakeOpener::<2>::new();
        let mut areas = AreaCache::<2, FakeArea>::open_all(&mut opener, &[false, false], flat_id).unwrap();
        let mut state = BootLoaderState::<2>::new([false, false]);
        state.headers[0][0] = Some(crate::header::ImageHeader {
            magic: crate::header::IMAGE_MAGIC,
            load_addr: 0,
            hdr_size: 32,
            protect_tlv_size: 0,
            img_size: 0,
            flags: 0,
            version: ImageVersion::new(1, 0, 0, 0),
        });
        state.slot_usage[0].active_slot = Some(SlotIndex::Primary);

        let mut tlv = TableTlv::new(&[(0, &[(5, const { ImageVersion::new(1, 0, 0, 0)) })])]);
        let mut ram = NoRam;
        assert_eq!(resolve(&mut state, &mut areas, &mut tlv, &mut ram), Err(Error::BadDependencyTlv));
    }
}
