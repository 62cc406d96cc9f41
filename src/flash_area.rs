//! Flash primitives consumed by the core. The core never talks to a flash
//! chip directly, it is generic over whatever opens, reads, writes and
//! erases a named region ("area"), mirroring the `hal::flash` split the
//! rest of this codebase uses for its device traits, adapted here to a
//! synchronous-only model for the boot path (no `nb::WouldBlock`: flash
//! I/O in early boot runs to completion before returning).

use crate::error::Error;

/// Identifies one configured flash area among the ones declared for the
/// build (one per image per slot).
pub type FlashAreaId = u8;

/// An opaque, already-open flash region: one slot.
pub trait FlashArea {
    fn device_id(&self) -> u8;
    fn offset(&self) -> u32;
    fn size(&self) -> u32;
    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), Error>;
    fn write(&mut self, offset: u32, buf: &[u8]) -> Result<(), Error>;
    /// Erases `len` bytes at `offset`, leaving the region in its erased
    /// state. `preserve` is passed through from callers that ask the
    /// platform to keep unrelated sub-regions (e.g. a separate trailer
    /// byte) intact; a flat implementation may ignore it.
    fn scramble(&mut self, offset: u32, len: u32, preserve: bool) -> Result<(), Error>;
}

/// Opens and closes the areas named by [`FlashAreaId`]. Opening is
/// fallible; closing is infallible and idempotent (the area cache's "best effort"
/// close never overrides an already-successful boot result, so the trait
/// gives it no `Result` to fail with).
pub trait FlashAreaOpener {
    type Area: FlashArea;

    fn open(&mut self, id: FlashAreaId) -> Result<Self::Area, Error>;
    fn close(&mut self, area: Self::Area);
}
