//! # Sync Error Types
//!
//! Queues report backpressure through return values (`Err(value)` / `None`),
//! so the only error enums here belong to the thread pool and the config
//! loader.

use thiserror::Error;

/// Errors that can occur in the worker thread pool.
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool has begun shutting down and accepts no new tasks.
    #[error("thread pool is shut down")]
    ShutDown,

    /// The task panicked while running. The worker survived.
    #[error("task panicked: {message}")]
    TaskPanicked {
        /// Panic payload rendered as text, if it was a string.
        message: String,
    },

    /// The task was dropped before producing a result.
    #[error("task was dropped before completing")]
    Disconnected,

    /// The operating system refused to start a worker thread.
    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        /// Index of the worker that failed to start.
        index: usize,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type for thread pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors that can occur while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The TOML document could not be parsed into the config type.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
