//! # Segment Writer
//!
//! Builds one output buffer out of as many pool segments as it needs.
//!
//! ## Layout
//!
//! ```text
//!   write_u32  write_bytes(300)             skip(4)
//!   ┌──────┬──────────────────┐ ┌────────────────┬────┐ ┌──────────┐
//!   │ 4 B  │     252 B        │ │     48 B       │ 4 B│ │  free    │
//!   └──────┴──────────────────┘ └────────────────┴────┘ └──────────┘
//!        segment 0 (full)           segment 1 (partial)   not yet acquired
//! ```
//!
//! Segments are acquired lazily, in order, only when the last one runs out
//! of room. A write that does not fit is split across segment boundaries.
//! [`SegmentWriter::into_buffer`] concatenates the written prefixes and hands
//! every segment back to the pool.
//!
//! ## Ownership
//!
//! Each held segment is owned by the writer until release, so nothing else
//! can read or write its bytes meanwhile. A writer is `Send` but not meant
//! to be shared: one producer at a time.

use bytemuck::Pod;

use super::pool::SegmentPool;
use super::segment::Segment;
use crate::encode::Encoder;
use crate::error::{PoolError, PoolResult};

/// A location inside a writer's output: which held segment, and how far into it.
///
/// Ordered lexicographically, so positions from forward-only writes never decrease.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// Index into the writer's held segments.
    pub segment_index: usize,
    /// Byte offset within that segment.
    pub offset: usize,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub const fn new(segment_index: usize, offset: usize) -> Self {
        Self {
            segment_index,
            offset,
        }
    }
}

/// Per-buffer builder that borrows segments from a [`SegmentPool`].
///
/// Created empty by [`SegmentPool::new_writer`]. Finished with either
/// [`SegmentWriter::into_buffer`] or [`SegmentWriter::close`]; both return
/// every held segment to the pool. Dropping a writer that still holds
/// segments releases them too.
///
/// # Partial failure
///
/// If the pool runs dry halfway through acquiring segments for one write,
/// the segments obtained so far stay with the writer and nothing is
/// written. The writer remains usable; call [`SegmentWriter::close`] to
/// give everything back.
///
/// # Example
///
/// ```rust
/// use segpool_core::{LittleEndian, SegmentPool};
///
/// let pool = SegmentPool::initialize(1024, 6)?;
/// let mut writer = pool.new_writer();
///
/// writer.write_u32(10, None)?;
/// // Only 2 bytes left in the first segment: this value straddles.
/// writer.write_u32(11, Some(&LittleEndian))?;
///
/// let buffer = writer.into_buffer()?;
/// assert_eq!(buffer, [10, 0, 0, 0, 11, 0, 0, 0]);
/// assert_eq!(pool.borrowed_count(), 0);
/// # Ok::<(), segpool_core::PoolError>(())
/// ```
#[derive(Debug)]
pub struct SegmentWriter<'pool> {
    pool: &'pool SegmentPool,
    /// Held segments in acquisition order.
    segments: Vec<Segment>,
    /// Bytes written or skipped so far.
    len: usize,
    /// Reused output for encoders on the spanning path.
    scratch: Vec<u8>,
}

impl<'pool> SegmentWriter<'pool> {
    pub(crate) fn new(pool: &'pool SegmentPool) -> Self {
        Self {
            pool,
            segments: Vec::new(),
            len: 0,
            scratch: Vec::new(),
        }
    }

    /// The pool this writer borrows from.
    #[inline]
    #[must_use]
    pub const fn pool(&self) -> &'pool SegmentPool {
        self.pool
    }

    /// Number of segments currently held.
    #[inline]
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Bytes written or skipped so far.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing has been written or skipped.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cursor of the last held segment, or `(0, 0)` before the first acquisition.
    #[must_use]
    pub fn position(&self) -> Position {
        self.segments.last().map_or_else(Position::default, |segment| {
            Position::new(self.segments.len() - 1, segment.used())
        })
    }

    /// Writes a 4-byte little-endian integer.
    ///
    /// `encoder` is only consulted when the value would straddle two
    /// segments; inside one segment the value is encoded directly.
    ///
    /// # Errors
    ///
    /// - [`PoolError::PoolExhausted`] if no segment is left to extend into.
    /// - [`PoolError::SerializationFunctionRequired`] if the value straddles
    ///   and `encoder` is `None`.
    /// - Whatever `encoder` returns.
    pub fn write_u32(&mut self, value: u32, encoder: Option<&dyn Encoder<u32>>) -> PoolResult<()> {
        self.write_fixed(&value, 4, encoder, |segment| segment.write_u32(value))
    }

    /// Writes a 4-byte little-endian signed integer. See [`SegmentWriter::write_u32`].
    ///
    /// # Errors
    ///
    /// Same as [`SegmentWriter::write_u32`].
    pub fn write_i32(&mut self, value: i32, encoder: Option<&dyn Encoder<i32>>) -> PoolResult<()> {
        let bits = u32::from_le_bytes(value.to_le_bytes());
        self.write_fixed(&value, 4, encoder, |segment| segment.write_u32(bits))
    }

    /// Writes an 8-byte little-endian integer. See [`SegmentWriter::write_u32`].
    ///
    /// # Errors
    ///
    /// Same as [`SegmentWriter::write_u32`].
    pub fn write_u64(&mut self, value: u64, encoder: Option<&dyn Encoder<u64>>) -> PoolResult<()> {
        self.write_fixed(&value, 8, encoder, |segment| segment.write_u64(value))
    }

    /// Writes an 8-byte little-endian signed integer. See [`SegmentWriter::write_u32`].
    ///
    /// # Errors
    ///
    /// Same as [`SegmentWriter::write_u32`].
    pub fn write_i64(&mut self, value: i64, encoder: Option<&dyn Encoder<i64>>) -> PoolResult<()> {
        let bits = u64::from_le_bytes(value.to_le_bytes());
        self.write_fixed(&value, 8, encoder, |segment| segment.write_u64(bits))
    }

    /// Writes a string through `encoder`. The empty string is a no-op.
    ///
    /// # Errors
    ///
    /// - [`PoolError::SerializationFunctionRequired`] if `value` is non-empty
    ///   and `encoder` is `None`.
    /// - [`PoolError::PoolExhausted`] or whatever `encoder` returns.
    pub fn write_string(&mut self, value: &str, encoder: Option<&dyn Encoder<str>>) -> PoolResult<()> {
        if value.is_empty() {
            return Ok(());
        }
        let encoder = encoder.ok_or(PoolError::SerializationFunctionRequired)?;
        self.write_encoded(value, encoder)
    }

    /// Writes the raw bytes of a plain-old-data value, split as needed.
    ///
    /// # Errors
    ///
    /// [`PoolError::PoolExhausted`] if no segment is left to extend into.
    #[inline]
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> PoolResult<()> {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// Appends `data`, acquiring and spanning segments as needed.
    ///
    /// # Errors
    ///
    /// [`PoolError::PoolExhausted`] if no segment is left to extend into.
    /// Nothing is written in that case.
    pub fn write_bytes(&mut self, data: &[u8]) -> PoolResult<()> {
        self.spread(data.len(), |segment, placed, take| {
            segment.write_bytes(&data[placed..placed + take])
        })
    }

    /// Reserves `n` bytes without writing them, for patching in later.
    ///
    /// `skip(0)` does nothing.
    ///
    /// # Errors
    ///
    /// [`PoolError::PoolExhausted`] if no segment is left to extend into.
    pub fn skip(&mut self, n: usize) -> PoolResult<()> {
        self.spread(n, |segment, _, take| segment.skip(take))
    }

    /// Overwrites already written (or skipped) bytes starting at `at`.
    ///
    /// The patched range may cross segment boundaries.
    ///
    /// # Errors
    ///
    /// [`PoolError::PatchOutOfRange`] if the range reaches past what has
    /// been written. Nothing is modified in that case.
    pub fn patch_bytes(&mut self, at: Position, data: &[u8]) -> PoolResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        // `at` is caller-built, so its offset may be anything up to usize::MAX.
        let start = self
            .segments
            .iter()
            .take(at.segment_index)
            .map(Segment::used)
            .sum::<usize>()
            .saturating_add(at.offset);
        let in_range = self
            .segments
            .get(at.segment_index)
            .is_some_and(|segment| at.offset <= segment.used())
            && start
                .checked_add(data.len())
                .is_some_and(|end| end <= self.len);
        if !in_range {
            return Err(PoolError::PatchOutOfRange {
                start,
                len: data.len(),
                written: self.len,
            });
        }

        let mut placed = 0;
        let mut offset = at.offset;
        for segment in &mut self.segments[at.segment_index..] {
            if placed == data.len() {
                break;
            }
            let take = (data.len() - placed).min(segment.used() - offset);
            segment.overwrite(offset, &data[placed..placed + take])?;
            placed += take;
            offset = 0;
        }
        Ok(())
    }

    /// Overwrites 4 bytes at `at` with `value`, little-endian.
    ///
    /// Meant for length prefixes reserved with [`SegmentWriter::skip`].
    ///
    /// # Errors
    ///
    /// Same as [`SegmentWriter::patch_bytes`].
    pub fn patch_u32(&mut self, at: Position, value: u32) -> PoolResult<()> {
        self.patch_bytes(at, &value.to_le_bytes())
    }

    /// Flattens the written bytes into one buffer and releases every segment.
    ///
    /// Returns an empty buffer if nothing was ever acquired.
    ///
    /// # Errors
    ///
    /// Propagates a rejected release. All segments are still handed back.
    pub fn into_buffer(mut self) -> PoolResult<Vec<u8>> {
        let mut buffer = Vec::with_capacity(self.len);
        for segment in &self.segments {
            buffer.extend_from_slice(segment.written());
        }
        self.release_all()?;
        Ok(buffer)
    }

    /// Releases every segment without producing output.
    ///
    /// # Errors
    ///
    /// Propagates a rejected release. All segments are still handed back.
    pub fn close(mut self) -> PoolResult<()> {
        self.release_all()
    }

    /// Fixed-width write: direct encode when the value lands in one segment,
    /// `encoder` otherwise.
    fn write_fixed<T>(
        &mut self,
        value: &T,
        width: usize,
        encoder: Option<&dyn Encoder<T>>,
        direct: impl FnOnce(&mut Segment) -> PoolResult<()>,
    ) -> PoolResult<()> {
        if !self.fits_in_one_segment(width) {
            let encoder = encoder.ok_or(PoolError::SerializationFunctionRequired)?;
            return self.write_encoded(value, encoder);
        }

        let first = self.acquire_capacity(width)?;
        direct(&mut self.segments[first])?;
        self.len += width;
        Ok(())
    }

    fn write_encoded<T: ?Sized>(&mut self, value: &T, encoder: &dyn Encoder<T>) -> PoolResult<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        let result = encoder
            .encode(value, &mut scratch)
            .and_then(|()| self.write_bytes(&scratch));
        self.scratch = scratch;
        result
    }

    /// Whether `n` bytes would land entirely inside a single segment.
    fn fits_in_one_segment(&self, n: usize) -> bool {
        match self.segments.last() {
            Some(last) if last.has_capacity(n) => true,
            Some(last) if last.bytes_left() > 0 => false,
            _ => self.pool.segment_size() >= n,
        }
    }

    /// Makes room for `n` more bytes, acquiring `ceil(deficit / segment_size)`
    /// segments when the last one is short.
    ///
    /// Returns the index of the segment the bytes start in.
    fn acquire_capacity(&mut self, n: usize) -> PoolResult<usize> {
        let held = self.segments.len();
        let last_left = self.segments.last().map_or(0, Segment::bytes_left);
        if last_left >= n {
            return Ok(held.saturating_sub(1));
        }

        let needed = (n - last_left).div_ceil(self.pool.segment_size());
        tracing::trace!(held, needed, bytes = n, "Writer acquiring segments");
        for _ in 0..needed {
            // No rollback: segments acquired before a failure stay held.
            self.segments.push(self.pool.acquire()?);
        }

        Ok(if last_left > 0 { held - 1 } else { held })
    }

    /// Places `n` bytes across segments starting at the current cursor.
    ///
    /// `place(segment, placed, take)` puts `take` bytes into `segment`, where
    /// `placed` is the running total already placed by this call.
    fn spread(
        &mut self,
        n: usize,
        mut place: impl FnMut(&mut Segment, usize, usize) -> PoolResult<()>,
    ) -> PoolResult<()> {
        if n == 0 {
            return Ok(());
        }

        let first = self.acquire_capacity(n)?;
        let mut placed = 0;
        for segment in &mut self.segments[first..] {
            if placed == n {
                break;
            }
            let take = (n - placed).min(segment.bytes_left());
            place(segment, placed, take)?;
            placed += take;
        }
        debug_assert_eq!(placed, n, "acquired capacity did not cover the write");

        self.len += placed;
        Ok(())
    }

    fn release_all(&mut self) -> PoolResult<()> {
        let pool = self.pool;
        let mut result = Ok(());
        for segment in self.segments.drain(..) {
            let released = pool.release(segment);
            if result.is_ok() {
                result = released;
            }
        }
        self.len = 0;
        result
    }
}

impl Drop for SegmentWriter<'_> {
    fn drop(&mut self) {
        if self.segments.is_empty() {
            return;
        }
        tracing::debug!(
            segments = self.segments.len(),
            "Writer dropped while holding segments, releasing"
        );
        if let Err(error) = self.release_all() {
            tracing::warn!(%error, "Failed to release segments of dropped writer");
        }
    }
}
