//! # SEGPOOL Core
//!
//! Fixed-size memory-pool allocator with a segment-spanning binary writer,
//! built for high-frequency serialization without heap churn:
//! - One arena allocation per pool, partitioned into equal segments
//! - LIFO free list, contended only for a single pop or push
//! - Writers that span values across segment boundaries
//!
//! ## Architecture Rules
//!
//! 1. **No allocation per borrow** - segments are windows of the arena
//! 2. **Exclusive ownership** - a segment belongs to the pool or to one writer
//! 3. **Explicit failure** - exhaustion and bad releases are errors, never panics
//!
//! ## Example
//!
//! ```rust
//! use segpool_core::{LittleEndian, SegmentPool, Utf8};
//!
//! let pool = SegmentPool::initialize(64 * 1024, 256)?;
//!
//! let mut writer = pool.new_writer();
//! let length_at = writer.position();
//! writer.skip(4)?;
//! writer.write_string("hello", Some(&Utf8))?;
//! writer.write_u64(42, Some(&LittleEndian))?;
//! writer.patch_u32(length_at, 13)?;
//!
//! let message = writer.into_buffer()?;
//! assert_eq!(message.len(), 17);
//! assert_eq!(pool.borrowed_count(), 0);
//! # Ok::<(), segpool_core::PoolError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod encode;
pub mod error;
pub mod memory;

pub use config::PoolConfig;
pub use encode::{Encoder, LittleEndian, Utf8};
pub use error::{PoolError, PoolResult};
pub use memory::{PoolStats, Position, Segment, SegmentPool, SegmentStatus, SegmentWriter};
