//! # Segment
//!
//! A fixed-size window of the pool's arena with a write cursor.

use std::fmt;
use std::sync::Weak;

use bytes::BytesMut;

use super::pool::FreeList;
use crate::error::{PoolError, PoolResult};

/// Lifecycle state of a [`Segment`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentStatus {
    /// Carved from the arena, never yet placed in the free list.
    Init,
    /// Sitting in the free list, available to borrow.
    Pooling,
    /// Checked out to a writer.
    Borrowed,
}

impl SegmentStatus {
    /// Whether a segment in this state may be handed (back) to the free list.
    #[inline]
    #[must_use]
    pub const fn is_releasable(self) -> bool {
        matches!(self, Self::Init | Self::Borrowed)
    }
}

/// One `[offset, offset + segment_size)` window of a pool's arena.
///
/// The window is an owned `BytesMut` split off the arena allocation, so no
/// two segments can ever reach the same bytes. Whoever holds the `Segment`
/// value (the pool while free, a writer while borrowed) is its only writer.
///
/// `used() + bytes_left() == capacity()` holds at all times.
pub struct Segment {
    /// The backing window. Its length is the segment size.
    data: BytesMut,
    /// Write cursor.
    used: usize,
    /// Position of this window in the arena, in segments.
    index: usize,
    /// Free list of the pool that carved this window.
    home: Weak<FreeList>,
    status: SegmentStatus,
}

impl Segment {
    pub(crate) fn new(data: BytesMut, index: usize, home: Weak<FreeList>) -> Self {
        Self {
            data,
            used: 0,
            index,
            home,
            status: SegmentStatus::Init,
        }
    }

    /// Size of the window in bytes.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes written (or skipped) so far.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    /// Bytes still free behind the cursor.
    #[inline]
    #[must_use]
    pub fn bytes_left(&self) -> usize {
        self.capacity() - self.used
    }

    /// Returns true if `n` more bytes fit.
    #[inline]
    #[must_use]
    pub fn has_capacity(&self, n: usize) -> bool {
        self.bytes_left() >= n
    }

    /// Position of this segment in the arena.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Current lifecycle state.
    #[inline]
    #[must_use]
    pub const fn status(&self) -> SegmentStatus {
        self.status
    }

    /// The written prefix `[0, used)`.
    #[inline]
    #[must_use]
    pub fn written(&self) -> &[u8] {
        &self.data[..self.used]
    }

    /// Copies `bytes` at the cursor and advances it.
    ///
    /// # Errors
    ///
    /// [`PoolError::CapacityExceeded`] if `bytes` does not fit; callers are
    /// expected to check [`Segment::has_capacity`] first.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> PoolResult<()> {
        let end = self.reserve(bytes.len())?;
        self.data[self.used..end].copy_from_slice(bytes);
        self.used = end;
        Ok(())
    }

    /// Encodes `value` little-endian at the cursor.
    ///
    /// # Errors
    ///
    /// [`PoolError::CapacityExceeded`] if fewer than 4 bytes are left.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> PoolResult<()> {
        self.write_array(value.to_le_bytes())
    }

    /// Encodes `value` little-endian at the cursor.
    ///
    /// # Errors
    ///
    /// [`PoolError::CapacityExceeded`] if fewer than 8 bytes are left.
    #[inline]
    pub fn write_u64(&mut self, value: u64) -> PoolResult<()> {
        self.write_array(value.to_le_bytes())
    }

    /// Advances the cursor by `n` without touching the bytes.
    ///
    /// # Errors
    ///
    /// [`PoolError::CapacityExceeded`] if `n` does not fit.
    pub fn skip(&mut self, n: usize) -> PoolResult<()> {
        self.used = self.reserve(n)?;
        Ok(())
    }

    /// Overwrites already-written bytes starting at `offset`.
    pub(crate) fn overwrite(&mut self, offset: usize, bytes: &[u8]) -> PoolResult<()> {
        let end = offset.saturating_add(bytes.len());
        if end > self.used {
            return Err(PoolError::CapacityExceeded {
                requested: end,
                available: self.used,
            });
        }
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Rewinds the cursor. Stale bytes stay until overwritten.
    pub(crate) fn reset(&mut self) {
        self.used = 0;
    }

    pub(crate) fn set_status(&mut self, status: SegmentStatus) {
        self.status = status;
    }

    pub(crate) const fn home(&self) -> &Weak<FreeList> {
        &self.home
    }

    #[inline]
    fn write_array<const N: usize>(&mut self, bytes: [u8; N]) -> PoolResult<()> {
        let end = self.reserve(N)?;
        self.data[self.used..end].copy_from_slice(&bytes);
        self.used = end;
        Ok(())
    }

    /// Returns the cursor position after `n` more bytes, or why it cannot move there.
    #[inline]
    fn reserve(&self, n: usize) -> PoolResult<usize> {
        if !self.has_capacity(n) {
            return Err(PoolError::CapacityExceeded {
                requested: n,
                available: self.bytes_left(),
            });
        }
        Ok(self.used + n)
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("index", &self.index)
            .field("used", &self.used)
            .field("capacity", &self.capacity())
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}
