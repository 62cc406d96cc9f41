//! External collaborators the core consumes but does not implement:
//! signature validation, the find-slot hook, the security counter
//! service, RAM staging, shared-data injection, and the dependency TLV
//! iterator. Each trait is generic over the concrete [`FlashArea`] rather
//! than boxing it, since this crate has no allocator.

use crate::fih::FihResult;
use crate::flash_area::FlashArea;
use crate::header::ImageHeader;
use crate::slot::SlotIndex;
use crate::error::Error;

/// Cryptographic signature / hash verification of a candidate slot. Routed
/// through [`FihResult`], not `Result`, matching the one call the original
/// loader hardens against fault injection.
pub trait SignatureValidator {
    fn validate<A: FlashArea>(&self, area: &A, header: &ImageHeader) -> FihResult;
}

/// Outcome of consulting the platform's slot-selection hook before the
/// default highest-version scan runs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// Defer to the default slot-selection policy.
    Regular,
    /// The hook has already chosen a slot.
    Resolved(SlotIndex),
    /// The hook asserts this image has no candidate at all.
    None,
}

pub trait FindSlotHook {
    fn find_next_slot(&mut self, image: usize) -> HookOutcome;
}

/// A hook that always defers to the default policy, for builds with no
/// platform override.
pub struct NoHook;

impl FindSlotHook for NoHook {
    fn find_next_slot(&mut self, _image: usize) -> HookOutcome { HookOutcome::Regular }
}

/// Monotonic anti-rollback counter, one per image.
pub trait SecurityCounterService {
    fn read(&self, image: usize, slot: SlotIndex) -> Result<u32, Error>;
    fn write(&mut self, image: usize, slot: SlotIndex, value: u32) -> Result<(), Error>;
    fn lock(&mut self, image: usize) -> Result<(), Error>;
}

/// RAM staging for RAM_LOAD mode. After a successful load, subsequent
/// reads for validation and TLV iteration must target the RAM copy, not
/// flash. That substitution is what gives RAM_LOAD its TOCTOU property.
pub trait RamStage {
    fn load_image_to_sram<A: FlashArea>(&mut self, area: &A, header: &ImageHeader) -> Result<(), Error>;
    fn remove_image_from_sram(&mut self);
    fn remove_image_from_flash<A: FlashArea>(&mut self, area: &mut A) -> Result<(), Error>;
    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), Error>;
}

/// Publishes the selected image's metadata to later boot stages.
pub trait SharedDataInjector {
    fn add_shared_data(&mut self, image: usize, slot: SlotIndex) -> Result<(), Error>;
}

/// One step of `iter_begin`/`iter_next` over an image's TLV stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TlvStep {
    Entry { offset: u32, len: u16 },
    End,
}

pub trait TlvIterator {
    fn iter_begin<A: FlashArea>(
        &mut self,
        area: &A,
        header: &ImageHeader,
        tag: u16,
        protected_only: bool,
    ) -> Result<(), Error>;

    fn iter_next<A: FlashArea>(&mut self, area: &A) -> Result<TlvStep, Error>;
}
