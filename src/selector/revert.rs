//! Revert/erase gate. Only consulted in revert-enabled modes.

use defmt_or_log::warn;

use crate::error::Error;
use crate::flash_area::FlashArea;
use crate::trailer::{SwapState, TrailerMagic, TRAILER_MAGIC_SIZE, TRAILER_SIZE};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RevertOutcome {
    Accept,
    Reject,
}

pub fn read_swap_state<A: FlashArea>(area: &A) -> Result<SwapState, Error> {
    let trailer_off = area.size().checked_sub(TRAILER_SIZE as u32).ok_or(Error::Io)?;
    let mut magic = [0u8; TRAILER_MAGIC_SIZE];
    area.read(trailer_off, &mut magic).map_err(|_| Error::Io)?;
    let mut flags = [0u8; 3];
    area.read(trailer_off + TRAILER_MAGIC_SIZE as u32, &mut flags).map_err(|_| Error::Io)?;
    Ok(SwapState::parse(&magic, flags[0], flags[1], flags[2]))
}

/// Reads the tentative active slot's trailer and decides whether it may be
/// selected, erasing it first if a previous boot selected it but it was
/// never confirmed.
pub fn select_or_erase<A: FlashArea>(area: &mut A) -> Result<(SwapState, RevertOutcome), Error> {
    let swap_state = read_swap_state(area)?;

    if swap_state.magic != TrailerMagic::Good
        || (swap_state.copy_done.is_set() && !swap_state.image_ok.is_set())
    {
        warn!("erasing unconfirmed or malformed slot before rejecting it");
        area.scramble(0, area.size(), false).map_err(|_| Error::Scramble)?;
        return Ok((swap_state, RevertOutcome::Reject));
    }

    if !swap_state.copy_done.is_set() {
        let trailer_off = area.size() - TRAILER_SIZE as u32;
        // preserved literally, see DESIGN.md: a failure to persist
        // copy_done is logged and ignored upstream, not turned into a
        // rejection, the image still boots this time.
        let _ = area.write(trailer_off + TRAILER_MAGIC_SIZE as u32, &[0x01]);
    }

    Ok((swap_state, RevertOutcome::Accept))
}
