//! DIRECT_XIP-only admissibility filter: an image built to run from a
//! fixed ROM address must land in the slot at that address.

use crate::flash_area::FlashArea;
use crate::header::ImageHeader;

/// `true` if the slot is unsuitable: the header declares `ROM_FIXED` and
/// its `load_addr` does not match this slot's flash offset.
pub fn is_address_mismatch<A: FlashArea>(area: &A, header: &ImageHeader) -> bool {
    header.rom_fixed() && header.load_addr != area.offset()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::FakeArea;
    use crate::version::ImageVersion;

    #[test]
    fn matching_address_is_admissible() {
        let mut area = FakeArea::new(0, 0x20000);
        area.write_valid_header(ImageVersion::new(1, 0, 0, 0), true);
        let header = crate::header::ImageHeader::parse(&read_header(&area), area.size()).unwrap();
        assert!(!is_address_mismatch(&area, &header));
    }

    #[test]
    fn mismatching_address_is_rejected() {
        let mut area = FakeArea::new(0, 0x20000);
        area.write_valid_header(ImageVersion::new(1, 0, 0, 0), true);
        area.set_load_addr(0x30000);
        let header = crate::header::ImageHeader::parse(&read_header(&area), area.size()).unwrap();
        assert!(is_address_mismatch(&area, &header));
    }

    #[test]
    fn non_rom_fixed_header_is_never_rejected_on_address() {
        let mut area = FakeArea::new(0, 0x20000);
        area.write_valid_header(ImageVersion::new(1, 0, 0, 0), false);
        area.set_load_addr(0x99999);
        let header = crate::header::ImageHeader::parse(&read_header(&area), area.size()).unwrap();
        assert!(!is_address_mismatch(&area, &header));
    }

    fn read_header(area: &FakeArea) -> [u8; crate::header::HEADER_SIZE] {
        let mut buf = [0u8; crate::header::HEADER_SIZE];
        area.read(0, &mut buf).unwrap();
        buf
    }
}
