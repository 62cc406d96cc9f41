//! Slot trailer: the swap-state record at the end of a slot.
//!
//! Each field lives in its own erase-granularity region on flash so it can
//! be written independently of the others, which is why `copy_done` can be
//! set without touching `magic` or `image_ok`.

use num_enum::FromPrimitive;

pub const TRAILER_MAGIC_SIZE: usize = 16;

/// Magic, then copy_done, image_ok and swap_type as three trailing bytes,
/// each in its own erase-granularity region.
pub const TRAILER_SIZE: usize = TRAILER_MAGIC_SIZE + 3;

/// The magic byte pattern read back when `boot_select_or_erase` has never
/// scrambled this slot's trailer.
pub const GOOD_MAGIC: [u8; TRAILER_MAGIC_SIZE] = [
    0x77, 0xc2, 0x95, 0xf3, 0x60, 0xd2, 0xef, 0x7f, 0x35, 0x52, 0x50, 0x0f, 0x2c, 0xb6, 0x79, 0x80,
];

const FLAG_SET: u8 = 0x01;
const FLAG_UNSET: u8 = 0xff;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrailerMagic {
    Good,
    Bad,
    Unset,
}

impl TrailerMagic {
    pub fn from_bytes(bytes: &[u8; TRAILER_MAGIC_SIZE]) -> Self {
        if *bytes == GOOD_MAGIC {
            TrailerMagic::Good
        } else if bytes.iter().all(|b| *b == 0xff) {
            TrailerMagic::Unset
        } else {
            TrailerMagic::Bad
        }
    }
}

/// A single-byte trailer flag: `set = 0x01`, `unset = 0xff` (erased),
/// anything else is `bad`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum TrailerFlag {
    Set = FLAG_SET,
    Unset = FLAG_UNSET,
    #[num_enum(catch_all)]
    Bad(u8) = 0,
}

impl TrailerFlag {
    pub fn is_set(&self) -> bool { matches!(self, TrailerFlag::Set) }
}

#[derive(Debug, Copy, Clone)]
pub struct SwapState {
    pub magic: TrailerMagic,
    pub copy_done: TrailerFlag,
    pub image_ok: TrailerFlag,
    pub swap_type: u8,
}

impl SwapState {
    pub fn parse(magic: &[u8; TRAILER_MAGIC_SIZE], copy_done: u8, image_ok: u8, swap_type: u8) -> Self {
        SwapState {
            magic: TrailerMagic::from_bytes(magic),
            copy_done: TrailerFlag::from(copy_done),
            image_ok: TrailerFlag::from(image_ok),
            swap_type,
        }
    }
}
