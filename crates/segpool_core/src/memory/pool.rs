//! # Segment Pool
//!
//! Fixed-size segment allocator backed by one pre-allocated arena.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;

use super::segment::{Segment, SegmentStatus};
use super::writer::SegmentWriter;
use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult};

/// Source of pool identities, so log lines can tell arenas apart.
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// A pool of fixed-size segments carved from a single arena.
///
/// The arena is allocated once at construction and partitioned into
/// `floor(total_size / segment_size)` segments. Remainder bytes are never
/// handed out. Segments are borrowed with [`SegmentPool::acquire`] and
/// returned with [`SegmentPool::release`]; most callers go through a
/// [`SegmentWriter`] instead.
///
/// # Thread Safety
///
/// `acquire` and `release` may be called concurrently from any number of
/// threads. The lock is held only for a single pop or push.
///
/// # Example
///
/// ```rust
/// use segpool_core::{PoolConfig, SegmentPool};
///
/// let pool = SegmentPool::new(PoolConfig::new(4096, 256))?;
/// assert_eq!(pool.free_count(), 16);
///
/// let segment = pool.acquire()?;
/// assert_eq!(pool.free_count(), 15);
///
/// pool.release(segment)?;
/// assert_eq!(pool.free_count(), 16);
/// # Ok::<(), segpool_core::PoolError>(())
/// ```
pub struct SegmentPool {
    /// Resolved sizing.
    config: PoolConfig,
    /// Number of segments the arena was partitioned into.
    segment_count: usize,
    /// Segments not currently borrowed. Every segment holds a weak handle to it.
    free: Arc<FreeList>,
}

/// Free-list state of one pool.
///
/// Segments point back here weakly, so a segment handed to the wrong pool
/// can still be returned to the one that carved it.
pub(crate) struct FreeList {
    /// Unique identity, for logs.
    id: u64,
    /// LIFO stack of segments not currently borrowed.
    segments: Mutex<Vec<Segment>>,
    /// Mirror of `segments.len()`, written under the lock, readable without it.
    count: AtomicUsize,
}

impl FreeList {
    /// Rewinds a segment and pushes it on top of the stack (`Init`/`Borrowed` -> `Pooling`).
    ///
    /// The caller has already checked that the segment belongs here.
    fn push(&self, mut segment: Segment) {
        segment.reset();
        segment.set_status(SegmentStatus::Pooling);

        let mut segments = self.segments.lock();
        segments.push(segment);
        self.count.fetch_add(1, Ordering::Release);
    }
}

/// Point-in-time counters of a [`SegmentPool`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total segments in the arena.
    pub segment_count: usize,
    /// Segments sitting in the free list.
    pub free_count: usize,
    /// Segments checked out.
    pub borrowed_count: usize,
    /// Size of one segment in bytes.
    pub segment_size: usize,
    /// Arena bytes that fall outside every segment.
    pub unused_bytes: usize,
}

impl SegmentPool {
    /// Creates a pool, allocating and partitioning the arena.
    ///
    /// Zero sizes in `config` fall back to the defaults. A segment size
    /// larger than the arena yields a pool with no segments, whose every
    /// acquisition reports [`PoolError::PoolExhausted`].
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` is kept so sizing checks can be
    /// added without breaking callers.
    pub fn new(config: PoolConfig) -> PoolResult<Self> {
        let config = config.resolved();
        let segment_count = config.segment_count();
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            pool_id = id,
            total_size = config.total_size,
            segment_size = config.segment_size,
            segment_count,
            unused_bytes = config.total_size - segment_count * config.segment_size,
            "Initializing segment pool"
        );

        let free = Arc::new(FreeList {
            id,
            segments: Mutex::new(Vec::with_capacity(segment_count)),
            count: AtomicUsize::new(0),
        });

        // One allocation. Every segment is a disjoint window split off it;
        // the remainder left in `arena` is dropped and never addressed.
        let mut arena = BytesMut::zeroed(config.total_size);
        let segments: Vec<Segment> = (0..segment_count)
            .map(|index| {
                Segment::new(
                    arena.split_to(config.segment_size),
                    index,
                    Arc::downgrade(&free),
                )
            })
            .collect();

        // Reverse so segment 0 sits on top of the stack.
        for segment in segments.into_iter().rev() {
            free.push(segment);
        }

        Ok(Self {
            config,
            segment_count,
            free,
        })
    }

    /// Creates a pool from positional sizes. `0` means "use the default".
    ///
    /// # Errors
    ///
    /// Same as [`SegmentPool::new`].
    pub fn initialize(total_size: usize, segment_size: usize) -> PoolResult<Self> {
        Self::new(PoolConfig::new(total_size, segment_size))
    }

    /// Borrows the most recently returned segment.
    ///
    /// This is a **O(1)** operation with **zero heap allocations**. It never
    /// waits: an empty free list is reported immediately.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::PoolExhausted`] if every segment is borrowed.
    pub fn acquire(&self) -> PoolResult<Segment> {
        let mut free = self.free.segments.lock();
        let Some(mut segment) = free.pop() else {
            tracing::debug!(
                pool_id = self.free.id,
                segment_count = self.segment_count,
                "Segment pool exhausted"
            );
            return Err(PoolError::PoolExhausted {
                segment_count: self.segment_count,
            });
        };

        segment.set_status(SegmentStatus::Borrowed);
        self.free.count.fetch_sub(1, Ordering::Release);
        Ok(segment)
    }

    /// Returns a segment to the free list.
    ///
    /// The segment's cursor is rewound; its bytes are left as they are.
    /// Accepts either a `Segment` or an `Option<Segment>`, where `None`
    /// stands for a missing segment.
    ///
    /// A `Borrowed` segment carved by another pool is rejected here but not
    /// lost: it goes back to the free list of its own pool, if that pool is
    /// still alive.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NilSegment`] if `None` is passed.
    /// - [`PoolError::InvalidState`] if the segment is not `Borrowed`/`Init`
    ///   or was carved from another pool.
    pub fn release(&self, segment: impl Into<Option<Segment>>) -> PoolResult<()> {
        let Some(segment) = segment.into() else {
            tracing::warn!(pool_id = self.free.id, "Rejected release of a missing segment");
            return Err(PoolError::NilSegment);
        };

        let status = segment.status();
        let is_own = std::ptr::eq(segment.home().as_ptr(), Arc::as_ptr(&self.free));
        if is_own && status.is_releasable() {
            self.free.push(segment);
            return Ok(());
        }

        let home = segment.home().upgrade();
        tracing::warn!(
            pool_id = self.free.id,
            segment_pool_id = home.as_ref().map(|home| home.id),
            segment_index = segment.index(),
            ?status,
            "Rejected release of a segment not borrowed from this pool"
        );

        // Our own lock is not held here, so pushing to the origin cannot deadlock.
        if let Some(home) = home.filter(|_| !is_own && status.is_releasable()) {
            home.push(segment);
        }
        Err(PoolError::InvalidState { status })
    }

    /// Creates an empty writer bound to this pool. Acquires nothing yet.
    #[inline]
    #[must_use]
    pub fn new_writer(&self) -> SegmentWriter<'_> {
        SegmentWriter::new(self)
    }

    /// Number of segments available to borrow.
    ///
    /// Read without taking the lock, so it may lag a concurrent acquire/release.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.count.load(Ordering::Acquire)
    }

    /// Number of segments currently checked out.
    #[inline]
    #[must_use]
    pub fn borrowed_count(&self) -> usize {
        self.segment_count - self.free_count()
    }

    /// Total number of segments.
    #[inline]
    #[must_use]
    pub const fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Size of each segment in bytes.
    #[inline]
    #[must_use]
    pub const fn segment_size(&self) -> usize {
        self.config.segment_size
    }

    /// Resolved sizing this pool was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> PoolConfig {
        self.config
    }

    /// Arena bytes past the last whole segment.
    #[inline]
    #[must_use]
    pub const fn unused_bytes(&self) -> usize {
        self.config.total_size - self.segment_count * self.config.segment_size
    }

    /// Snapshot of the pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let free_count = self.free_count();
        PoolStats {
            segment_count: self.segment_count,
            free_count,
            borrowed_count: self.segment_count - free_count,
            segment_size: self.config.segment_size,
            unused_bytes: self.unused_bytes(),
        }
    }
}

impl fmt::Debug for SegmentPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentPool")
            .field("id", &self.free.id)
            .field("segment_size", &self.config.segment_size)
            .field("segment_count", &self.segment_count)
            .field("free_count", &self.free_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_partition() {
        let pool = SegmentPool::initialize(1000, 64).unwrap();
        assert_eq!(pool.segment_count(), 15);
        assert_eq!(pool.free_count(), 15);
        assert_eq!(pool.borrowed_count(), 0);
        assert_eq!(pool.unused_bytes(), 40);

        let segment = pool.acquire().unwrap();
        assert_eq!(segment.capacity(), 64);
        assert_eq!(segment.bytes_left(), 64);
        assert_eq!(segment.status(), SegmentStatus::Borrowed);
    }

    #[test]
    fn test_pool_defaults() {
        let pool = SegmentPool::initialize(0, 0).unwrap();
        assert_eq!(pool.segment_size(), PoolConfig::DEFAULT_SEGMENT_SIZE);
        assert_eq!(
            pool.segment_count(),
            PoolConfig::DEFAULT_TOTAL_SIZE / PoolConfig::DEFAULT_SEGMENT_SIZE
        );
    }

    #[test]
    fn test_pool_acquire_release() {
        let pool = SegmentPool::initialize(256, 64).unwrap();

        let segment = pool.acquire().unwrap();
        assert_eq!(pool.free_count(), 3);
        assert_eq!(pool.borrowed_count(), 1);

        pool.release(segment).unwrap();
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn test_pool_full() {
        let pool = SegmentPool::initialize(128, 64).unwrap();

        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert_eq!(
            pool.acquire().unwrap_err(),
            PoolError::PoolExhausted { segment_count: 2 }
        );
        assert_eq!(pool.free_count(), 0);
    }

    #[test]
    fn test_pool_reuse_is_lifo() {
        let pool = SegmentPool::initialize(256, 64).unwrap();

        let first = pool.acquire().unwrap();
        assert_eq!(first.index(), 0);
        let second = pool.acquire().unwrap();
        assert_eq!(second.index(), 1);

        pool.release(first).unwrap();
        pool.release(second).unwrap();

        // Last returned, first out.
        assert_eq!(pool.acquire().unwrap().index(), 1);
    }

    #[test]
    fn test_release_resets_cursor() {
        let pool = SegmentPool::initialize(64, 64).unwrap();

        let mut segment = pool.acquire().unwrap();
        segment.write_bytes(&[1, 2, 3]).unwrap();
        pool.release(segment).unwrap();

        let segment = pool.acquire().unwrap();
        assert_eq!(segment.used(), 0);
        assert_eq!(segment.bytes_left(), 64);
    }

    #[test]
    fn test_release_nil_segment() {
        let pool = SegmentPool::initialize(128, 64).unwrap();
        assert_eq!(pool.release(None::<Segment>), Err(PoolError::NilSegment));
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn test_release_pooling_segment_rejected() {
        let pool = SegmentPool::initialize(128, 64).unwrap();
        let mut segment = pool.acquire().unwrap();
        segment.set_status(SegmentStatus::Pooling);

        assert_eq!(
            pool.release(segment),
            Err(PoolError::InvalidState {
                status: SegmentStatus::Pooling
            })
        );
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_release_foreign_segment_rejected() {
        let a = SegmentPool::initialize(128, 64).unwrap();
        let b = SegmentPool::initialize(128, 64).unwrap();

        let segment = a.acquire().unwrap();
        assert_eq!(
            b.release(segment),
            Err(PoolError::InvalidState {
                status: SegmentStatus::Borrowed
            })
        );
        assert_eq!(b.free_count(), 2);
        // Forwarded home rather than dropped.
        assert_eq!(a.free_count(), 2);
        assert_eq!(a.borrowed_count(), 0);
    }

    #[test]
    fn test_foreign_segment_outliving_its_pool() {
        let b = SegmentPool::initialize(128, 64).unwrap();
        let segment = {
            let a = SegmentPool::initialize(128, 64).unwrap();
            a.acquire().unwrap()
        };

        assert_eq!(
            b.release(segment),
            Err(PoolError::InvalidState {
                status: SegmentStatus::Borrowed
            })
        );
        assert_eq!(b.free_count(), 2);
    }

    #[test]
    fn test_segments_do_not_alias() {
        let pool = SegmentPool::initialize(128, 64).unwrap();

        let mut a = pool.acquire().unwrap();
        let mut b = pool.acquire().unwrap();
        a.write_bytes(&[0xAA; 64]).unwrap();
        b.write_bytes(&[0xBB; 64]).unwrap();

        assert!(a.written().iter().all(|&byte| byte == 0xAA));
        assert!(b.written().iter().all(|&byte| byte == 0xBB));
    }

    #[test]
    fn test_segment_larger_than_arena() {
        let pool = SegmentPool::initialize(32, 64).unwrap();
        assert_eq!(pool.segment_count(), 0);
        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.unused_bytes(), 32);
        assert_eq!(
            pool.acquire().unwrap_err(),
            PoolError::PoolExhausted { segment_count: 0 }
        );
    }

    #[test]
    fn test_stats() {
        let pool = SegmentPool::initialize(300, 100).unwrap();
        let _held = pool.acquire().unwrap();
        assert_eq!(
            pool.stats(),
            PoolStats {
                segment_count: 3,
                free_count: 2,
                borrowed_count: 1,
                segment_size: 100,
                unused_bytes: 0,
            }
        );
    }
}
