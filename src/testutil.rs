//! In-memory flash fakes for tests, in place of a mocking framework: a
//! fixed-size byte buffer per slot plus a few fault-injection switches,
//! along the same lines as the hand-written fakes this codebase already
//! tests its own hardware traits against.

#![cfg(test)]

use crate::error::Error;
use crate::flash_area::{FlashArea, FlashAreaId, FlashAreaOpener};
use crate::header::{HEADER_SIZE, IMAGE_MAGIC};
use crate::trailer::{GOOD_MAGIC, TRAILER_MAGIC_SIZE, TRAILER_SIZE};
use crate::version::ImageVersion;

pub const AREA_SIZE: usize = 512;
pub const TRAILER_OFFSET: usize = AREA_SIZE - TRAILER_SIZE;

#[derive(Clone)]
pub struct FakeArea {
    data: [u8; AREA_SIZE],
    device_id: u8,
    offset: u32,
    fail_reads: bool,
    fail_writes: bool,
    fail_erases: bool,
}

impl FakeArea {
    pub fn new(device_id: u8, offset: u32) -> Self {
        FakeArea { data: [0xffu8; AREA_SIZE], device_id, offset, fail_reads: false, fail_writes: false, fail_erases: false }
    }

    pub fn fail_reads(&mut self) { self.fail_reads = true; }
    pub fn fail_writes(&mut self) { self.fail_writes = true; }
    pub fn fail_erases(&mut self) { self.fail_erases = true; }

    pub fn write_header_bytes(&mut self, bytes: &[u8; HEADER_SIZE]) {
        self.data[0..HEADER_SIZE].copy_from_slice(bytes);
    }

    /// Writes a structurally valid header. `load_addr` defaults to this
    /// area's own offset, so the ROM_FIXED check passes unless the caller
    /// later mutates it with [`FakeArea::set_load_addr`].
    pub fn write_valid_header(&mut self, version: ImageVersion, rom_fixed: bool) {
        let img_size = (AREA_SIZE - HEADER_SIZE - TRAILER_SIZE) as u32;
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&IMAGE_MAGIC.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.offset.to_le_bytes());
        bytes[8..10].copy_from_slice(&(HEADER_SIZE as u16).to_le_bytes());
        bytes[10..12].copy_from_slice(&0u16.to_le_bytes());
        bytes[12..16].copy_from_slice(&img_size.to_le_bytes());
        bytes[16..20].copy_from_slice(&(if rom_fixed { 1u32 } else { 0 }).to_le_bytes());
        bytes[20] = version.major;
        bytes[21] = version.minor;
        bytes[22..24].copy_from_slice(&version.revision.to_le_bytes());
        bytes[24..28].copy_from_slice(&version.build.to_le_bytes());
        self.write_header_bytes(&bytes);
    }

    pub fn set_load_addr(&mut self, load_addr: u32) {
        self.data[4..8].copy_from_slice(&load_addr.to_le_bytes());
    }

    /// Writes a good-magic trailer with the given flags.
    pub fn write_trailer(&mut self, magic_good: bool, copy_done: u8, image_ok: u8) {
        let magic = if magic_good { GOOD_MAGIC } else { [0xffu8; TRAILER_MAGIC_SIZE] };
        self.data[TRAILER_OFFSET..TRAILER_OFFSET + TRAILER_MAGIC_SIZE].copy_from_slice(&magic);
        self.data[TRAILER_OFFSET + TRAILER_MAGIC_SIZE] = copy_done;
        self.data[TRAILER_OFFSET + TRAILER_MAGIC_SIZE + 1] = image_ok;
        self.data[TRAILER_OFFSET + TRAILER_MAGIC_SIZE + 2] = 0xff;
    }

    pub fn is_erased(&self) -> bool { self.data.iter().all(|b| *b == 0xff) }

    pub fn mutate_byte(&mut self, offset: usize, value: u8) { self.data[offset] = value; }
}

impl FlashArea for FakeArea {
    fn device_id(&self) -> u8 { self.device_id }
    fn offset(&self) -> u32 { self.offset }
    fn size(&self) -> u32 { AREA_SIZE as u32 }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), Error> {
        if self.fail_reads {
            return Err(Error::Io);
        }
        let offset = offset as usize;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: u32, buf: &[u8]) -> Result<(), Error> {
        if self.fail_writes {
            return Err(Error::Io);
        }
        let offset = offset as usize;
        self.data[offset..offset + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn scramble(&mut self, offset: u32, len: u32, _preserve: bool) -> Result<(), Error> {
        if self.fail_erases {
            return Err(Error::Io);
        }
        let offset = offset as usize;
        let len = len as usize;
        self.data[offset..offset + len].iter_mut().for_each(|b| *b = 0xff);
        Ok(())
    }
}

/// Opens pre-populated [`FakeArea`]s by a flat id: `image * 2 + slot`.
pub struct FakeOpener<const N: usize> {
    areas: [[FakeArea; 2]; N],
    /// `open` fails (without consuming a slot) once `opened` reaches this.
    fail_after: Option<usize>,
    opened: usize,
    pub closed: usize,
}

impl<const N: usize> FakeOpener<N> {
    pub fn new() -> Self {
        let areas = core::array::from_fn(|image| {
            core::array::from_fn(|slot| FakeArea::new((image * 2 + slot) as u8, (image * 0x20000 + slot * 0x10000) as u32))
        });
        FakeOpener { areas, fail_after: None, opened: 0, closed: 0 }
    }

    pub fn area_mut(&mut self, image: usize, slot: usize) -> &mut FakeArea { &mut self.areas[image][slot] }

    /// Makes the `n`th call to `open` (zero-indexed) fail, so callers can
    /// exercise the partway-through-opening error path.
    pub fn fail_after(&mut self, n: usize) { self.fail_after = Some(n); }
}

impl<const N: usize> FlashAreaOpener for FakeOpener<N> {
    type Area = FakeArea;

    fn open(&mut self, id: FlashAreaId) -> Result<Self::Area, Error> {
        if self.fail_after == Some(self.opened) {
            return Err(Error::Io);
        }
        self.opened += 1;
        let image = (id / 2) as usize;
        let slot = (id % 2) as usize;
        Ok(self.areas[image][slot].clone())
    }

    fn close(&mut self, _area: Self::Area) { self.closed += 1; }
}

pub fn flat_id(image: usize, slot: usize) -> FlashAreaId { (image * 2 + slot) as FlashAreaId }
