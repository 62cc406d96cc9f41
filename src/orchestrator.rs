//! The orchestrator. One generic `boot_go` drives both boot modes
//! (the original's `context_boot_go_direct_xip` and
//! `context_boot_go_ram_load` are otherwise near-identical copies of the
//! same open/scan/select/resolve/rollback/respond/close shape), and two
//! thin wrappers below fix the mode for callers that don't want to name
//! the generic themselves, mirroring `loader_public.c`'s
//! `context_boot_go` dispatch.

use crate::area_cache::AreaCache;
use crate::collaborators::{FindSlotHook, RamStage, SecurityCounterService, SharedDataInjector, SignatureValidator, TlvIterator};
use crate::dependency::{self, DependencyOutcome};
use crate::error::Error;
use crate::fih::FihResult;
use crate::flash_area::{FlashArea, FlashAreaId, FlashAreaOpener};
use crate::response::{self, BootResponse};
use crate::rollback::{self, RevertGate};
use crate::scan;
#[cfg(any(test, feature = "direct-xip"))]
use crate::selector::DirectXip;
#[cfg(feature = "ram-load")]
use crate::selector::RamLoad;
use crate::selector::{self, BootMode};
use crate::state::BootLoaderState;

/// `true` when the `revert` feature is enabled, used to fix the `REVERT`
/// const generic on the two mode wrappers below.
#[cfg(any(feature = "direct-xip", feature = "ram-load"))]
const REVERT: bool = cfg!(feature = "revert");

/// Bounds the dependency-resolution retry loop: each retry invalidates
/// exactly one (image, slot) pair and availability only ever shrinks, so
/// the loop cannot run more than twice per image before every image's
/// candidates are exhausted and selection itself fails with
/// [`Error::NoCandidate`].
const MAX_DEPENDENCY_ROUNDS_PER_IMAGE: usize = 2;

/// Drives one full boot decision: open every configured area, scan
/// headers, select a slot per image (retrying under dependency pressure),
/// update anti-rollback counters, publish shared data, fill the response
/// and close every area on every exit path. Routed through [`FihResult`]
/// because this is the outer return value the original hardens against
/// fault injection: a single bit flip here must not turn a failed boot
/// decision into a successful one.
#[allow(clippy::too_many_arguments)]
pub fn boot_go<
    const N: usize,
    M: BootMode,
    A: FlashArea,
    O: FlashAreaOpener<Area = A>,
    H: FindSlotHook,
    V: SignatureValidator,
    R: RamStage,
    S: SecurityCounterService,
    D: SharedDataInjector,
    T: TlvIterator,
>(
    mask: [bool; N],
    area_id: impl Fn(usize, usize) -> FlashAreaId,
    opener: &mut O,
    hook: &mut H,
    validator: &V,
    ram: &mut R,
    counters: &mut S,
    shared_data: &mut D,
    tlv: &mut T,
    revert_gate: RevertGate,
    lock_counters: bool,
) -> FihResult {
    match boot_go_inner::<N, M, A, O, H, V, R, S, D, T>(
        mask,
        area_id,
        opener,
        hook,
        validator,
        ram,
        counters,
        shared_data,
        tlv,
        revert_gate,
        lock_counters,
    ) {
        Ok(Some(_)) => FihResult::success(),
        Ok(None) | Err(_) => FihResult::failure(),
    }
}

/// Same as [`boot_go`] but returns the actual [`BootResponse`], for
/// callers that need where to jump rather than only whether to jump.
#[allow(clippy::too_many_arguments)]
pub fn boot_go_response<
    const N: usize,
    M: BootMode,
    A: FlashArea,
    O: FlashAreaOpener<Area = A>,
    H: FindSlotHook,
    V: SignatureValidator,
    R: RamStage,
    S: SecurityCounterService,
    D: SharedDataInjector,
    T: TlvIterator,
>(
    mask: [bool; N],
    area_id: impl Fn(usize, usize) -> FlashAreaId,
    opener: &mut O,
    hook: &mut H,
    validator: &V,
    ram: &mut R,
    counters: &mut S,
    shared_data: &mut D,
    tlv: &mut T,
    revert_gate: RevertGate,
    lock_counters: bool,
) -> Result<BootResponse, Error> {
    boot_go_inner::<N, M, A, O, H, V, R, S, D, T>(
        mask,
        area_id,
        opener,
        hook,
        validator,
        ram,
        counters,
        shared_data,
        tlv,
        revert_gate,
        lock_counters,
    )?
    .ok_or(Error::NoCandidate)
}

/// Thin wrapper fixing the mode to DIRECT_XIP, `REVERT` taken from the
/// `revert` feature. Mirrors `context_boot_go`'s dispatch to
/// `context_boot_go_direct_xip` for callers that don't want to name the
/// `BootMode` generic themselves.
#[cfg(feature = "direct-xip")]
#[allow(clippy::too_many_arguments)]
pub fn boot_go_direct_xip<
    const N: usize,
    A: FlashArea,
    O: FlashAreaOpener<Area = A>,
    H: FindSlotHook,
    V: SignatureValidator,
    R: RamStage,
    S: SecurityCounterService,
    D: SharedDataInjector,
    T: TlvIterator,
>(
    mask: [bool; N],
    area_id: impl Fn(usize, usize) -> FlashAreaId,
    opener: &mut O,
    hook: &mut H,
    validator: &V,
    ram: &mut R,
    counters: &mut S,
    shared_data: &mut D,
    tlv: &mut T,
    lock_counters: bool,
) -> FihResult {
    let gate = if REVERT { RevertGate::DirectXipRevert } else { RevertGate::Ungated };
    boot_go::<N, DirectXip<REVERT>, A, O, H, V, R, S, D, T>(
        mask, area_id, opener, hook, validator, ram, counters, shared_data, tlv, gate, lock_counters,
    )
}

/// Thin wrapper fixing the mode to RAM_LOAD, `REVERT` taken from the
/// `revert` feature. Mirrors `context_boot_go`'s dispatch to
/// `context_boot_go_ram_load`.
#[cfg(feature = "ram-load")]
#[allow(clippy::too_many_arguments)]
pub fn boot_go_ram_load<
    const N: usize,
    A: FlashArea,
    O: FlashAreaOpener<Area = A>,
    H: FindSlotHook,
    V: SignatureValidator,
    R: RamStage,
    S: SecurityCounterService,
    D: SharedDataInjector,
    T: TlvIterator,
>(
    mask: [bool; N],
    area_id: impl Fn(usize, usize) -> FlashAreaId,
    opener: &mut O,
    hook: &mut H,
    validator: &V,
    ram: &mut R,
    counters: &mut S,
    shared_data: &mut D,
    tlv: &mut T,
    lock_counters: bool,
) -> FihResult {
    // RAM_LOAD has no DIRECT_XIP-revert counter gate: revert there only
    // affects slot admissibility, never the rollback-counter update.
    boot_go::<N, RamLoad<REVERT>, A, O, H, V, R, S, D, T>(
        mask, area_id, opener, hook, validator, ram, counters, shared_data, tlv, RevertGate::Ungated, lock_counters,
    )
}

#[allow(clippy::too_many_arguments)]
fn boot_go_inner<
    const N: usize,
    M: BootMode,
    A: FlashArea,
    O: FlashAreaOpener<Area = A>,
    H: FindSlotHook,
    V: SignatureValidator,
    R: RamStage,
    S: SecurityCounterService,
    D: SharedDataInjector,
    T: TlvIterator,
>(
    mask: [bool; N],
    area_id: impl Fn(usize, usize) -> FlashAreaId,
    opener: &mut O,
    hook: &mut H,
    validator: &V,
    ram: &mut R,
    counters: &mut S,
    shared_data: &mut D,
    tlv: &mut T,
    revert_gate: RevertGate,
    lock_counters: bool,
) -> Result<Option<BootResponse>, Error> {
    let mut areas = AreaCache::<N, A>::open_all(opener, &mask, area_id)?;
    let mut state = BootLoaderState::<N>::new(mask);

    let result = boot_decide::<N, M, A, H, V, R, S, D, T>(&mut state, &mut areas, hook, validator, ram, counters, shared_data, tlv, revert_gate, lock_counters);

    let response = match result {
        Ok(()) => response::fill_response(&state, &areas),
        Err(err) => {
            areas.close_all(opener);
            return Err(err);
        }
    };

    areas.close_all(opener);
    Ok(response)
}

#[allow(clippy::too_many_arguments)]
fn boot_decide<const N: usize, M: BootMode, A: FlashArea, H: FindSlotHook, V: SignatureValidator, R: RamStage, S: SecurityCounterService, D: SharedDataInjector, T: TlvIterator>(
    state: &mut BootLoaderState<N>,
    areas: &mut AreaCache<N, A>,
    hook: &mut H,
    validator: &V,
    ram: &mut R,
    counters: &mut S,
    shared_data: &mut D,
    tlv: &mut T,
    revert_gate: RevertGate,
    lock_counters: bool,
) -> Result<(), Error> {
    scan::scan_headers(state, areas)?;

    let max_rounds = N.saturating_mul(MAX_DEPENDENCY_ROUNDS_PER_IMAGE).max(1);
    for _ in 0..max_rounds {
        selector::select_all_images::<N, M, A, H, V, R>(state, areas, hook, ram, validator)?;

        if N <= 1 {
            break;
        }
        if dependency::resolve(state, areas, tlv, ram)? == DependencyOutcome::Done {
            break;
        }
    }

    rollback::update_all(state, counters, revert_gate, lock_counters)?;

    for image in 0..N {
        if state.is_masked(image) {
            continue;
        }
        if let Some(slot) = state.slot_usage[image].active_slot {
            shared_data.add_shared_data(image, slot)?;
        }
    }

    Ok(())
}


    #[test]
    fn a_hook_that_refuses_every_slot_fails_the_boot() {
        struct RefuseHook;
        impl FindSlotHook for RefuseHook {
            fn find_next_slot(&mut self, _image: usize) -> HookOutcome { HookOutcome::None }
        }

        let mut opener = FakeOpener::<1>::new();
        opener.area_mut(0, 0).write_valid_header(ImageVersion::new(1, 0, 0, 0), false);

        let outcome = boot_go::<1, DirectXip<false>, FakeArea, FakeOpener<1>, RefuseHook, AlwaysValid, NoRam, NoCounters, NoSharedData, EmptyTlv>(
            [false],
            flat_id,
            &mut opener,
            &mut RefuseHook,
            &AlwaysValid,
            &mut NoRam,
            &mut NoCounters,
            &mut NoSharedData,
            &mut EmptyTlv,
            RevertGate::Ungated,
            false,
        );
        assert!(!outcome.is_success());
    }
}
