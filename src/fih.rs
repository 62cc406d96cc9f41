//! Fault-injection-hardened result, for the two call sites the original
//! loader routes through `fih_ret`: signature validation and the outer
//! return of `boot_go`. Everything else uses plain `Result<T, Error>`.
//!
//! `FihSuccess` and `FihFailure` are not `0`/`1` or `true`/`false`: they are
//! two distinct, far-apart bit patterns, and `FihResult` carries the value
//! twice. A single bit flip on either copy, or on only one of the two
//! fields, is caught by [`FihResult::decode`] rather than silently read as
//! success.

const SUCCESS_A: u32 = 0xA5A5_5A5A;
const SUCCESS_B: u32 = !SUCCESS_A;
const FAILURE_A: u32 = 0x1234_5678;
const FAILURE_B: u32 = !FAILURE_A;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FihValue {
    Success,
    Failure,
}

/// A two-field mirrored result. Construct with [`FihResult::success`] or
/// [`FihResult::failure`]; read back with [`FihResult::decode`].
#[derive(Debug, Copy, Clone)]
pub struct FihResult {
    a: u32,
    b: u32,
}

impl FihResult {
    pub fn success() -> Self { FihResult { a: SUCCESS_A, b: SUCCESS_B } }

    pub fn failure() -> Self { FihResult { a: FAILURE_A, b: FAILURE_B } }

    /// Returns `Failure` for any bit pattern other than the exact encoding
    /// of `success()`, including a pattern with only one field corrupted.
    pub fn decode(&self) -> FihValue {
        if self.a == SUCCESS_A && self.b == SUCCESS_B && self.a == !self.b {
            FihValue::Success
        } else {
            FihValue::Failure
        }
    }

    pub fn is_success(&self) -> bool { self.decode() == FihValue::Success }
}

impl From<bool> for FihResult {
    fn from(ok: bool) -> Self {
        if ok {
            FihResult::success()
        } else {
            FihResult::failure()
        }
    }
}
