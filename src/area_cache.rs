//! Flash-area handle cache.
//!
//! Opens every configured slot's flash area once, on entry, and releases
//! all of them on every exit path. Areas for masked images are never
//! opened. `close` is idempotent and best-effort by construction: it takes
//! `self`, so there is nothing left afterwards to fail a second time, and
//! [`AreaCache::close_all`] cannot itself fail the boot: a close failure
//! never overrides an already-successful result.

use crate::error::Error;
use crate::flash_area::{FlashArea, FlashAreaId, FlashAreaOpener};

pub struct AreaCache<const N: usize, A: FlashArea> {
    areas: [[Option<A>; 2]; N],
}

impl<const N: usize, A: FlashArea> AreaCache<N, A> {
    /// Opens the primary and secondary area for every non-masked image.
    /// `area_id` maps `(image, slot)` to the platform's flash-area id.
    pub fn open_all<O: FlashAreaOpener<Area = A>>(
        opener: &mut O,
        mask: &[bool; N],
        area_id: impl Fn(usize, usize) -> FlashAreaId,
    ) -> Result<Self, Error> {
        let mut areas: [[Option<A>; 2]; N] = core::array::from_fn(|_| [None, None]);
        for image in 0..N {
            if mask[image] {
                continue;
            }
            for slot in 0..2 {
                match opener.open(area_id(image, slot)) {
                    Ok(area) => areas[image][slot] = Some(area),
                    Err(err) => {
                        AreaCache { areas }.close_all(opener);
                        return Err(err);
                    }
                }
            }
        }
        Ok(AreaCache { areas })
    }

    pub fn get(&self, image: usize, slot: usize) -> Option<&A> { self.areas[image][slot].as_ref() }

    pub fn get_mut(&mut self, image: usize, slot: usize) -> Option<&mut A> {
        self.areas[image][slot].as_mut()
    }

    pub fn close_all<O: FlashAreaOpener<Area = A>>(mut self, opener: &mut O) {
        for image in 0..N {
            for slot in 0..2 {
                if let Some(area) = self.areas[image][slot].take() {
                    opener.close(area);
                }
            }
        }
    }
}
