//! RAM_LOAD-only admissibility filter. The load step itself is a
//! single call into the external [`RamStage`] collaborator; this module's
//! own job is [`RamView`], the thin [`FlashArea`] adapter that lets the
//! rest of the core (in particular the signature validator and the
//! dependency TLV iterator) keep reading through the same trait after the
//! image has moved from flash to RAM. Everything past this point reads
//! the RAM copy and never flash again: that substitution is what gives
//! RAM_LOAD its TOCTOU property.

use crate::collaborators::RamStage;
use crate::error::Error;
use crate::flash_area::FlashArea;

pub struct RamView<'a, R: RamStage> {
    ram: &'a R,
    size: u32,
}

impl<'a, R: RamStage> RamView<'a, R> {
    pub fn new(ram: &'a R, size: u32) -> Self { RamView { ram, size } }
}

impl<'a, R: RamStage> FlashArea for RamView<'a, R> {
    fn device_id(&self) -> u8 { 0 }
    fn offset(&self) -> u32 { 0 }
    fn size(&self) -> u32 { self.size }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), Error> { self.ram.read(offset, buf) }

    fn write(&mut self, _offset: u32, _buf: &[u8]) -> Result<(), Error> {
        // The RAM copy is written only by the RamStage collaborator during
        // load; nothing downstream of that writes through this view.
        Err(Error::Io)
    }

    fn scramble(&mut self, _offset: u32, _len: u32, _preserve: bool) -> Result<(), Error> {
        Err(Error::Io)
    }
}
