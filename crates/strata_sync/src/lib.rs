//! # STRATA Sync
//!
//! Concurrency primitives for the engine utility layer:
//! - Bounded lock-free ring queues (single-producer/single-consumer and
//!   multi-producer/multi-consumer)
//! - An unbounded lock-free FIFO queue
//! - A blocking fixed-size worker thread pool
//!
//! ## Architecture Rules
//!
//! 1. **No locks in queue hot paths** - Ring and unbounded queues synchronize through atomics only
//! 2. **No false sharing** - Counters and slots live on their own cache lines
//! 3. **No lost work** - The pool drains every accepted task before its workers exit
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use strata_sync::{RingQueue, ThreadPool};
//!
//! let results = Arc::new(RingQueue::new(64));
//! let pool = ThreadPool::new(4).unwrap();
//!
//! for job in 0..16u32 {
//!     let results = Arc::clone(&results);
//!     assert!(pool.enqueue(move || results.enqueue(job * job)));
//! }
//! pool.shutdown();
//!
//! let mut total = 0;
//! while let Some(value) = results.try_dequeue() {
//!     total += value;
//! }
//! assert_eq!(total, (0..16u32).map(|j| j * j).sum());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod pool;
pub mod ring;
pub mod unbounded;

pub use config::{PoolConfig, QueueConfig};
pub use error::{ConfigError, ConfigResult, PoolError, PoolResult};
pub use pool::{PoolStats, TaskHandle, ThreadPool};
pub use ring::spsc::{self, Consumer, Producer, SpscQueue};
pub use ring::{round_capacity, RingQueue, MAX_CAPACITY, MIN_CAPACITY};
pub use unbounded::UnboundedQueue;
