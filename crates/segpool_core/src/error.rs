//! # Pool Error Types
//!
//! All errors that can occur while borrowing segments or building buffers.

use thiserror::Error;

use crate::memory::SegmentStatus;

/// Errors that can occur in the segment pool and writer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// No free segment was left to satisfy an acquisition.
    ///
    /// Recoverable: retry after other writers release, or size the pool larger.
    #[error("segment pool exhausted: all {segment_count} segments are borrowed")]
    PoolExhausted {
        /// Total number of segments the pool was partitioned into.
        segment_count: usize,
    },

    /// A segment was returned that is not currently borrowed from this pool.
    ///
    /// Raised for segments that are already pooled and for segments carved
    /// from a different pool.
    #[error("segment in state {status:?} is not borrowed from this pool")]
    InvalidState {
        /// Status the rejected segment was in.
        status: SegmentStatus,
    },

    /// A release was attempted without a segment.
    #[error("no segment was passed to release")]
    NilSegment,

    /// A value straddles a segment boundary and no encoder was supplied.
    #[error("value spans segments and requires an encoder")]
    SerializationFunctionRequired,

    /// A write was issued against a segment without enough room left.
    ///
    /// Never reachable through [`crate::SegmentWriter`]; seeing it means the
    /// capacity bookkeeping is broken.
    #[error("segment capacity exceeded: requested {requested} bytes, {available} left")]
    CapacityExceeded {
        /// Bytes the write needed.
        requested: usize,
        /// Bytes the segment had left.
        available: usize,
    },

    /// A caller-supplied encoder failed.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// A patch reached outside the region already written.
    #[error("patch of {len} bytes at byte {start} exceeds written length {written}")]
    PatchOutOfRange {
        /// Absolute byte offset the patch starts at.
        start: usize,
        /// Length of the patch.
        len: usize,
        /// Bytes written (or skipped) so far.
        written: usize,
    },

    /// Invalid configuration file or values.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;
