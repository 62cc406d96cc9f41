//! Error type for the boot core as a whole.

/// Hard failures that cross a function boundary and abort the boot.
///
/// Everything else in the selection taxonomy (invalid header, failed
/// validation, ROM mismatch, revert erase, RAM-load failure, unsatisfied
/// dependency) is recoverable and is absorbed into a slot-availability
/// transition instead of an `Error`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A flash primitive (open/read/write/erase) reported failure.
    Io,
    /// A slot that had to be erased did not report a successful erase.
    Scramble,
    /// A dependency TLV had the wrong size or named an out-of-range image.
    BadDependencyTlv,
    /// The security counter service rejected a read, write or lock.
    RollbackUpdate,
    /// Publishing the selected image's metadata to later boot stages failed.
    SharedData,
    /// Every non-masked image exhausted its candidates without committing.
    NoCandidate,
}
