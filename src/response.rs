//! Boot-response filler.

use crate::area_cache::AreaCache;
use crate::flash_area::FlashArea;
use crate::header::ImageHeader;
use crate::state::BootLoaderState;

/// What the orchestrator hands back to its caller: where to find the image
/// that was selected. Left untouched (never constructed) on any failure
/// path: the caller reads "no response" as "no bootable image".
#[derive(Debug, Copy, Clone)]
pub struct BootResponse {
    pub flash_dev_id: u8,
    pub image_off: u32,
    pub header: ImageHeader,
}

/// Builds the response for the lowest-indexed non-masked image. `None` if
/// every image is masked, or if that image somehow has no committed slot
/// (the original leaves `rsp` untouched in both cases; there is nothing
/// meaningful to return).
pub fn fill_response<const N: usize, A: FlashArea>(
    state: &BootLoaderState<N>,
    areas: &AreaCache<N, A>,
) -> Option<BootResponse> {
    let image = state.first_unmasked()?;
    let slot = state.slot_usage[image].active_slot?;
    let area = areas.get(image, slot.as_usize())?;
    let header = *state.header(image, slot)?;
    Some(BootResponse { flash_dev_id: area.device_id(), image_off: area.offset(), header })
}
