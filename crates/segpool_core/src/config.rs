//! # Pool Configuration
//!
//! Sizing for the arena and its segments, loaded once at startup.
//!
//! ```toml
//! # pool.toml
//! total_size = 1048576
//! segment_size = 512
//! ```
//!
//! Either field may be omitted or set to `0` to fall back to the default.

use std::path::Path;

use serde::Deserialize;

use crate::error::{PoolError, PoolResult};

/// Sizing of a [`crate::SegmentPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Total arena size in bytes. `0` means [`PoolConfig::DEFAULT_TOTAL_SIZE`].
    pub total_size: usize,
    /// Size of each segment in bytes. `0` means [`PoolConfig::DEFAULT_SEGMENT_SIZE`].
    pub segment_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            total_size: Self::DEFAULT_TOTAL_SIZE,
            segment_size: Self::DEFAULT_SEGMENT_SIZE,
        }
    }
}

impl PoolConfig {
    /// Default arena size: 100 MiB.
    pub const DEFAULT_TOTAL_SIZE: usize = 100 * 1024 * 1024;

    /// Default segment size: 256 bytes.
    pub const DEFAULT_SEGMENT_SIZE: usize = 256;

    /// Creates a config from explicit sizes. Zeros are resolved lazily.
    #[must_use]
    pub const fn new(total_size: usize, segment_size: usize) -> Self {
        Self {
            total_size,
            segment_size,
        }
    }

    /// Returns a copy with every `0` replaced by its default.
    #[must_use]
    pub const fn resolved(self) -> Self {
        Self {
            total_size: if self.total_size == 0 {
                Self::DEFAULT_TOTAL_SIZE
            } else {
                self.total_size
            },
            segment_size: if self.segment_size == 0 {
                Self::DEFAULT_SEGMENT_SIZE
            } else {
                self.segment_size
            },
        }
    }

    /// Number of segments the arena will be partitioned into.
    #[must_use]
    pub const fn segment_count(self) -> usize {
        let resolved = self.resolved();
        resolved.total_size / resolved.segment_size
    }

    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] on malformed TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> PoolResult<Self> {
        toml::from_str(text).map_err(|e| PoolError::InvalidConfig(e.to_string()))
    }

    /// Loads a config from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> PoolResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PoolError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }
}
