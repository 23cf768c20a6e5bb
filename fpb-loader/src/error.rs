//! Device-side error taxonomy.
//!
//! Closed set mirroring the error classes the core is allowed to surface.
//! Every handler in [`crate::command`] converts a `LoaderError` into
//! response text at the command-processor boundary; nothing in this crate
//! panics or unwraps outside `#[cfg(test)]`.

use core::fmt;

/// A device-side failure, as classified by the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderError {
    /// A required flag was absent from the command line.
    MissingArgument(&'static str),
    /// A flag was present but its value could not be parsed.
    InvalidArgument(&'static str),
    /// The command name itself was not recognized.
    UnknownCommand,
    /// The allocator has no allocator configured, or the pool is exhausted.
    AllocFailed,
    /// A slot/comparator index is out of range.
    InvalidComparator,
    /// An upload's declared CRC did not match the decoded payload.
    CrcMismatch {
        /// CRC value the caller asserted via `--crc`.
        given: u16,
        /// CRC actually computed over the decoded payload.
        computed: u16,
    },
    /// The FPB unit, or the DebugMonitor back-end, is not available.
    HardwareUnavailable,
    /// A VFS back-end reported an error; back-end message is not modeled
    /// here (no heap to own it), so handlers format it directly.
    FilesystemError,
}

impl fmt::Display for LoaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoaderError::MissingArgument(name) => write!(f, "Missing {name}"),
            LoaderError::InvalidArgument(name) => write!(f, "Invalid {name}"),
            LoaderError::UnknownCommand => write!(f, "Unknown command"),
            LoaderError::AllocFailed => write!(f, "Alloc failed"),
            LoaderError::InvalidComparator => write!(f, "Invalid comp"),
            LoaderError::CrcMismatch { given, computed } => {
                write!(f, "CRC mismatch: {given:#06x} != {computed:#06x}")
            }
            LoaderError::HardwareUnavailable => write!(f, "Hardware unavailable"),
            LoaderError::FilesystemError => write!(f, "Filesystem error"),
        }
    }
}
