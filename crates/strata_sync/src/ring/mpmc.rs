//! # Multi-Producer Multi-Consumer Ring Queue
//!
//! Any thread may enqueue or dequeue through a shared `&RingQueue<T>`.
//!
//! ## Slot Claiming
//!
//! ```text
//!   Producer A ──┐  fetch_add(head)   ┌──► index 7 ──► CAS slot 7: Unloaded → Loading
//!   Producer B ──┼───────────────────►├──► index 8 ──► CAS slot 0: Unloaded → Loading
//!   Producer C ──┘                    └──► index 9 ──► CAS slot 1: Unloaded → Loading
//! ```
//!
//! Every claim is unique. `keep_order` only decides whether the claims of
//! racing threads also fall into one global total order (`SeqCst`) or not
//! (`Relaxed`, cheaper).

use std::fmt;
use std::sync::atomic::Ordering;

use crossbeam_utils::Backoff;

use super::storage::{Probe, Storage};
use crate::config::QueueConfig;

/// Bounded lock-free MPMC queue.
///
/// Share it behind an `Arc`. All operations take `&self`.
///
/// # Example
///
/// ```rust
/// use strata_sync::RingQueue;
///
/// let queue = RingQueue::new(5);
/// assert_eq!(queue.size(), 8);
///
/// queue.enqueue("mesh-ready");
/// assert_eq!(queue.try_dequeue(), Some("mesh-ready"));
/// assert_eq!(queue.try_dequeue(), None);
/// ```
pub struct RingQueue<T> {
    storage: Storage<T>,
    claim_order: Ordering,
}

impl<T> RingQueue<T> {
    /// Creates a queue with strict (sequentially consistent) claim order.
    ///
    /// The capacity is rounded up to a power of two, minimum 4.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self::with_order(capacity, true)
    }

    /// Creates a queue and selects the claim ordering mode.
    ///
    /// `keep_order = true` is required when consumers depend on the order in
    /// which different threads submitted; `false` trades that for throughput.
    #[must_use]
    pub fn with_order(capacity: u32, keep_order: bool) -> Self {
        Self {
            storage: Storage::new(capacity),
            claim_order: if keep_order {
                Ordering::SeqCst
            } else {
                Ordering::Relaxed
            },
        }
    }

    /// Creates a queue from a loaded [`QueueConfig`].
    #[must_use]
    pub fn from_config(config: &QueueConfig) -> Self {
        Self::with_order(config.capacity, config.keep_order)
    }

    /// Actual (rounded) capacity.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.storage.capacity()
    }

    /// Snapshot of the number of queued elements. Stale under contention.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Snapshot emptiness check.
    ///
    /// Only suitable for monotonic checks such as "producers are done and
    /// the queue drained", never for liveness decisions.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    /// Whether slot claims are sequentially consistent.
    #[inline]
    #[must_use]
    pub fn keep_order(&self) -> bool {
        self.claim_order == Ordering::SeqCst
    }

    /// Enqueues `value`, spinning until a slot frees up.
    ///
    /// Never fails. If no consumer ever drains the queue this spins forever.
    pub fn enqueue(&self, value: T) {
        let index = self.storage.head().fetch_add(1, self.claim_order);
        self.storage.write(index, value);
    }

    /// Dequeues a value, spinning until one is published.
    pub fn dequeue(&self) -> T {
        let index = self.storage.tail().fetch_add(1, self.claim_order);
        self.storage.read(index)
    }

    /// Enqueues `value` only if the next slot is free right now.
    ///
    /// Callers that only need to know whether the value went in can use
    /// `queue.try_enqueue(value).is_ok()`.
    ///
    /// # Errors
    ///
    /// Returns the value back if the queue is full. Never waits on a slot.
    pub fn try_enqueue(&self, value: T) -> Result<(), T> {
        let backoff = Backoff::new();
        loop {
            let index = self.storage.head().load(Ordering::Relaxed);
            match self.storage.probe_write(index) {
                Probe::Ready => {
                    if self
                        .storage
                        .head()
                        .compare_exchange_weak(
                            index,
                            index.wrapping_add(1),
                            self.claim_order,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                    {
                        // The slot was seen free for this lap and the index is
                        // ours, so this write does not wait.
                        self.storage.write(index, value);
                        return Ok(());
                    }
                }
                Probe::Busy => return Err(value),
                Probe::Stale => {}
            }
            // Another producer claimed `index` first.
            backoff.spin();
        }
    }

    /// Dequeues a value only if one is published right now.
    pub fn try_dequeue(&self) -> Option<T> {
        let backoff = Backoff::new();
        loop {
            let index = self.storage.tail().load(Ordering::Relaxed);
            match self.storage.probe_read(index) {
                Probe::Ready => {
                    if self
                        .storage
                        .tail()
                        .compare_exchange_weak(
                            index,
                            index.wrapping_add(1),
                            self.claim_order,
                            Ordering::Relaxed,
                        )
                        .is_ok()
                    {
                        return Some(self.storage.read(index));
                    }
                }
                Probe::Busy => return None,
                Probe::Stale => {}
            }
            backoff.spin();
        }
    }
}

impl<T> fmt::Debug for RingQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingQueue")
            .field("size", &self.size())
            .field("len", &self.len())
            .field("keep_order", &self.keep_order())
            .finish()
    }
}
