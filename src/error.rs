//! Error types for agrad.

use std::collections::TryReserveError;

use thiserror::Error;

/// Structural failures of the AD engine.
///
/// Numerical problems (NaN, infinities) are not errors here: they propagate
/// through values and adjoints with IEEE semantics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdError {
    /// The arena could not obtain a new block from the system allocator.
    #[error("arena allocation of {requested} slots failed: {reason}")]
    OutOfMemory {
        /// Number of slots the failed block would have held.
        requested: usize,
        /// Allocator diagnostic.
        reason: String,
    },

    /// Two inputs that must have equal length did not.
    #[error("size mismatch in {context}: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Operation that detected the mismatch.
        context: &'static str,
        /// Length of the reference input.
        expected: usize,
        /// Length of the offending input.
        actual: usize,
    },

    /// A handle refers to a node from an epoch that has been recovered.
    #[error("stale handle: node {index} of epoch {epoch} is no longer on the tape")]
    StaleHandle {
        /// Node index carried by the handle.
        index: u32,
        /// Epoch carried by the handle.
        epoch: u64,
    },

    /// `recover_memory_nested` was called with no nested scope open.
    #[error("no nested scope is open")]
    NotNested,

    /// A nested scope was closed while a deeper one was still open.
    #[error("nested scope closed out of order: scope depth {expected}, tape depth {actual}")]
    NestingMismatch {
        /// Depth the closing scope was opened at.
        expected: usize,
        /// Depth of the tape when it was closed.
        actual: usize,
    },

    /// A coordinate index was outside the input vector.
    #[error("index {index} out of range for input of length {len}")]
    IndexOutOfRange {
        /// Requested coordinate.
        index: usize,
        /// Input length.
        len: usize,
    },

    /// No tape is active on the current thread.
    #[error("no active tape on this thread")]
    NoActiveTape,
}

impl AdError {
    pub(crate) fn out_of_memory(requested: usize, err: TryReserveError) -> Self {
        AdError::OutOfMemory {
            requested,
            reason: err.to_string(),
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, AdError>;
