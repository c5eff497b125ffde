//! # Memory Management
//!
//! One arena per pool, carved into fixed-size segments at startup.
//!
//! ## Design Philosophy
//!
//! All memory is allocated once. While building buffers:
//! - No per-segment heap allocations
//! - Segments move between pool and writer, never shared
//! - Exhaustion is reported, never waited on

mod pool;
mod segment;
mod writer;

pub use pool::{PoolStats, SegmentPool};
pub use segment::{Segment, SegmentStatus};
pub use writer::{Position, SegmentWriter};
