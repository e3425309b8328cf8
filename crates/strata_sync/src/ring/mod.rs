//! # Bounded Lock-Free Ring Queues
//!
//! Fixed-capacity queues over a power-of-two slot array. No locks, no
//! allocation after construction.
//!
//! ## The Protocol
//!
//! ```text
//!   head (write claims) ──┐                  ┌── tail (read claims)
//!                         ▼                  ▼
//!   ┌──────────┬──────────┬──────────┬──────────┐
//!   │ Loaded   │ Loading  │ Unloaded │ Unloaded │   slot = index & (N - 1)
//!   └──────────┴──────────┴──────────┴──────────┘
//!
//!   Unloaded ──► Loading ──► Loaded ──► Unloading ──► Unloaded (next lap)
//!    producer CAS   write     consumer CAS   read
//! ```
//!
//! Claiming an index and owning the slot are two separate steps. With a ring,
//! index `i` and index `i + N` land on the same slot; the slot state tells the
//! second claimant to wait until the first one has vacated it.
//!
//! ## Strategies
//!
//! - [`RingQueue`]: any number of producers and consumers
//! - [`spsc`]: exactly one producer handle and one consumer handle
//!
//! ## Capacity
//!
//! Requests are rounded up to a power of two, minimum [`MIN_CAPACITY`]:
//!
//! | requested | actual |
//! |-----------|--------|
//! | 0, 1, 4   | 4      |
//! | 5         | 8      |
//! | 127, 128  | 128    |
//! | 129       | 256    |

mod mpmc;
mod storage;

pub mod spsc;

pub use mpmc::RingQueue;

/// Smallest capacity a ring queue is ever built with.
pub const MIN_CAPACITY: u32 = 4;

/// Largest capacity a ring queue is ever built with. Larger requests clamp.
pub const MAX_CAPACITY: u32 = 1 << 31;

/// Rounds a requested capacity to the one a ring queue will actually use.
///
/// Never fails: the result is the smallest power of two that is at least
/// `requested` and at least [`MIN_CAPACITY`], clamped to [`MAX_CAPACITY`].
#[inline]
#[must_use]
pub const fn round_capacity(requested: u32) -> u32 {
    if requested <= MIN_CAPACITY {
        return MIN_CAPACITY;
    }
    match requested.checked_next_power_of_two() {
        Some(capacity) => capacity,
        None => MAX_CAPACITY,
    }
}
