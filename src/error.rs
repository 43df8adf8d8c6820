//! Failure conditions of a test run.

use std::{collections::TryReserveError, io, path::PathBuf};
use thiserror::Error;

/// Maximum number of marker mismatches tolerated before verification gives up.
pub const MAX_MISMATCHES: u32 = 8;

/// Conditions that end the whole test run, each with its own process exit status.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("Could not open {path:?} for {mode}")]
    Open {
        path: PathBuf,
        mode: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Could not seek to the end of {path:?}")]
    Seek {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not open entropy source {path:?}")]
    EntropySource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// `source` is `None` when the buffer size does not even fit in memory's address space.
    #[error("Could not allocate a data buffer of {blocks} blocks of {block_size} bytes")]
    Allocation {
        blocks: usize,
        block_size: usize,
        #[source]
        source: Option<TryReserveError>,
    },

    #[error("Could not fill the data buffer with {bytes} bytes from the entropy source")]
    Fill {
        bytes: usize,
        #[source]
        source: io::Error,
    },

    #[error("Could not reopen {path:?} for reading back")]
    Reopen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Error count exceeded after {mismatches} mismatches; the target media does not contain the same data that was written")]
    VerifyThresholdExceeded { mismatches: u32 },
}

impl TestError {
    /// The process exit status this error terminates with.
    pub fn exit_code(&self) -> u8 {
        match self {
            TestError::Open { .. } | TestError::Seek { .. } => 2,
            TestError::EntropySource { .. } => 3,
            TestError::Allocation { .. } => 4,
            TestError::Fill { .. } => 5,
            TestError::Reopen { .. } => 6,
            TestError::VerifyThresholdExceeded { .. } => 7,
        }
    }
}

/// Why a chunk could not be written. Ends the write phase, never the run.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WriteFailure {
    #[error("End of target reported")]
    EndOfTarget,
    #[error("Logical I/O error")]
    Logical,
    #[error("Write I/O error")]
    Hardware,
}

const ENOSPC: i32 = 28;
const EFBIG: i32 = 27;

impl WriteFailure {
    pub fn classify(error: &io::Error) -> Self {
        match error.raw_os_error() {
            Some(ENOSPC) | Some(EFBIG) => return WriteFailure::EndOfTarget,
            _ => {}
        }
        match error.kind() {
            io::ErrorKind::WriteZero | io::ErrorKind::UnexpectedEof => WriteFailure::EndOfTarget,
            io::ErrorKind::InvalidInput
            | io::ErrorKind::InvalidData
            | io::ErrorKind::PermissionDenied
            | io::ErrorKind::Unsupported => WriteFailure::Logical,
            _ => WriteFailure::Hardware,
        }
    }
}

/// A phase processed a different number of bytes than the device claims to hold.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Target size: {bytes_claimed} bytes, {verb} {bytes_actual} bytes")]
pub struct CapacityDiscrepancy {
    pub bytes_claimed: u64,
    pub bytes_actual: u64,
    pub verb: &'static str,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classifies_device_full_as_end_of_target() {
        let full = io::Error::from_raw_os_error(ENOSPC);
        assert_eq!(WriteFailure::classify(&full), WriteFailure::EndOfTarget);
        let zero = io::Error::from(io::ErrorKind::WriteZero);
        assert_eq!(WriteFailure::classify(&zero), WriteFailure::EndOfTarget);
    }

    #[test]
    fn classifies_other_failures() {
        let eio = io::Error::from_raw_os_error(5);
        assert_eq!(WriteFailure::classify(&eio), WriteFailure::Hardware);
        let invalid = io::Error::from(io::ErrorKind::InvalidInput);
        assert_eq!(WriteFailure::classify(&invalid), WriteFailure::Logical);
    }

    #[test]
    fn exit_codes_are_distinct() {
        let err = TestError::VerifyThresholdExceeded { mismatches: 9 };
        assert_eq!(err.exit_code(), 7);
        let err = TestError::Fill {
            bytes: 1,
            source: io::Error::from(io::ErrorKind::UnexpectedEof),
        };
        assert_eq!(err.exit_code(), 5);
        let err = TestError::Allocation {
            blocks: usize::MAX,
            block_size: 512,
            source: None,
        };
        assert_eq!(err.exit_code(), 4);
    }
}
