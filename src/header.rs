//! Image header: the fixed-layout structure at slot offset 0.
//!
//! Only the fields the selection core actually interprets are modeled:
//! magic, the `ROM_FIXED` flag, `load_addr`, and `version`. Everything
//! else an on-flash header carries (protected-TLV length, image size) is
//! passed through to the validator and TLV iterator, which this crate
//! does not implement, so it is kept here only as far as is needed to
//! judge "structurally plausible".

use crate::utilities::bitwise::BitFlags;
use crate::version::ImageVersion;

/// Magic value at header offset 0, matching the on-flash format this core
/// was built against.
pub const IMAGE_MAGIC: u32 = 0x9699_2823;

/// Bit position of `ROM_FIXED` within the header's flags word.
pub const ROM_FIXED_BIT: u8 = 0;

pub const HEADER_SIZE: usize = 32;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub magic: u32,
    pub load_addr: u32,
    pub hdr_size: u16,
    pub protect_tlv_size: u16,
    pub img_size: u32,
    pub flags: u32,
    pub version: ImageVersion,
}

impl ImageHeader {
    pub fn rom_fixed(&self) -> bool { self.flags.is_set(ROM_FIXED_BIT) }

    /// Parses a fixed 32-byte header out of a slot's leading bytes and
    /// checks magic plus self-consistency of the size fields against the
    /// slot's total size. Layout:
    /// `magic:u32, load_addr:u32, hdr_size:u16, protect_tlv_size:u16,
    /// img_size:u32, flags:u32, major:u8, minor:u8, revision:u16, build:u32`.
    pub fn parse(bytes: &[u8; HEADER_SIZE], slot_size: u32) -> Option<Self> {
        let magic = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        if magic != IMAGE_MAGIC {
            return None;
        }
        let load_addr = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let hdr_size = u16::from_le_bytes(bytes[8..10].try_into().unwrap());
        let protect_tlv_size = u16::from_le_bytes(bytes[10..12].try_into().unwrap());
        let img_size = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        let flags = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        let major = bytes[20];
        let minor = bytes[21];
        let revision = u16::from_le_bytes(bytes[22..24].try_into().unwrap());
        let build = u32::from_le_bytes(bytes[24..28].try_into().unwrap());

        let header = ImageHeader {
            magic,
            load_addr,
            hdr_size,
            protect_tlv_size,
            img_size,
            flags,
            version: ImageVersion::new(major, minor, revision, build),
        };

        if header.is_self_consistent(slot_size) {
            Some(header)
        } else {
            None
        }
    }

    fn is_self_consistent(&self, slot_size: u32) -> bool {
        let hdr_size = self.hdr_size as u32;
        let tlv_size = self.protect_tlv_size as u32;
        hdr_size >= HEADER_SIZE as u32
            && hdr_size
                .checked_add(self.img_size)
                .and_then(|total| total.checked_add(tlv_size))
                .map(|total| total <= slot_size)
                .unwrap_or(false)
    }
}
