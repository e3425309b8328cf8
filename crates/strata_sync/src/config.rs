//! # Configuration
//!
//! Queue and pool sizing, loaded once at startup from TOML. Each config
//! parses from its own document:
//!
//! ```toml
//! # queue.toml
//! capacity = 1024
//! keep_order = false
//! ```
//!
//! ```toml
//! # pool.toml
//! workers = 8
//! thread_name = "asset-io"
//! ```
//!
//! Every field has a default, so a partial document (or an empty one) is valid.

use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;

/// Sizing and ordering for a bounded ring queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Requested capacity. Rounded up to a power of two, minimum 4.
    pub capacity: u32,
    /// Sequentially consistent slot assignment (`true`) or relaxed (`false`).
    pub keep_order: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            keep_order: true,
        }
    }
}

impl QueueConfig {
    /// Throughput-first config for hand-off queues whose consumers do not
    /// care about cross-producer ordering.
    #[must_use]
    pub const fn production() -> Self {
        Self {
            capacity: 16 * 1024,
            keep_order: false,
        }
    }

    /// Parses a config from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`](crate::ConfigError::Parse) if the
    /// document is malformed or a field has the wrong type.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(source)?)
    }
}

/// Worker count and thread naming for a [`ThreadPool`](crate::ThreadPool).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads. Zero is normalized to one.
    pub workers: usize,
    /// Prefix for worker thread names (`{thread_name}-{index}`).
    pub thread_name: String,
    /// Stack size per worker in bytes. `None` uses the platform default.
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get),
            thread_name: "strata-worker".to_string(),
            stack_size: None,
        }
    }
}

impl PoolConfig {
    /// Config with an explicit worker count and default naming.
    #[must_use]
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }

    /// Background I/O config: one worker per core plus headroom for
    /// threads parked on blocking reads.
    #[must_use]
    pub fn production() -> Self {
        let cores = std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get);
        Self {
            workers: cores * 2,
            thread_name: "strata-io".to_string(),
            stack_size: Some(2 * 1024 * 1024),
        }
    }

    /// Parses a config from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`](crate::ConfigError::Parse) if the
    /// document is malformed or a field has the wrong type.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(source)?)
    }
}
