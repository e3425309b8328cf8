//! # Single-Producer Single-Consumer Ring Queue
//!
//! The queue is split into one [`Producer`] and one [`Consumer`]. Neither
//! handle is `Clone`, and the mutating methods take `&mut self`, so the
//! "exactly one of each" rule is checked by the compiler.
//!
//! ```text
//!   ┌──────────┐   owns head    ┌─────────┐    owns tail   ┌──────────┐
//!   │ Producer │ ─────────────► │ Storage │ ◄───────────── │ Consumer │
//!   └──────────┘   (store only) └─────────┘   (store only) └──────────┘
//! ```
//!
//! Each counter has a single writer, so claims need no CAS. The slot state
//! still carries the value hand-off between the two threads.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::storage::{Probe, Storage};

/// Creates an SPSC queue and returns its two ends.
///
/// # Example
///
/// ```rust
/// let (mut tx, mut rx) = strata_sync::spsc::channel(2);
/// assert_eq!(tx.size(), 4);
///
/// std::thread::spawn(move || {
///     for frame in 0..100u64 {
///         tx.enqueue(frame);
///     }
/// });
///
/// for frame in 0..100u64 {
///     assert_eq!(rx.dequeue(), frame);
/// }
/// ```
#[must_use]
pub fn channel<T>(capacity: u32) -> (Producer<T>, Consumer<T>) {
    SpscQueue::new(capacity).split()
}

/// An SPSC queue that has not been split yet.
pub struct SpscQueue<T> {
    storage: Storage<T>,
}

impl<T> SpscQueue<T> {
    /// Allocates the queue. The capacity is rounded up to a power of two,
    /// minimum 4.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            storage: Storage::new(capacity),
        }
    }

    /// Actual (rounded) capacity.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.storage.capacity()
    }

    /// Splits the queue into its producer and consumer ends.
    #[must_use]
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let storage = Arc::new(self.storage);
        (
            Producer {
                storage: Arc::clone(&storage),
            },
            Consumer { storage },
        )
    }
}

/// Write end of an SPSC queue.
pub struct Producer<T> {
    storage: Arc<Storage<T>>,
}

impl<T> Producer<T> {
    /// Actual (rounded) capacity.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.storage.capacity()
    }

    /// Snapshot of the number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Snapshot emptiness check.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    /// Enqueues `value`, spinning while the next slot is still occupied.
    pub fn enqueue(&mut self, value: T) {
        let head = self.storage.head().load(Ordering::Relaxed);
        self.storage.write(head, value);
        self.storage
            .head()
            .store(head.wrapping_add(1), Ordering::Release);
    }

    /// Enqueues `value` only if the next slot is free right now.
    ///
    /// Callers that only need to know whether the value went in can use
    /// `tx.try_enqueue(value).is_ok()`.
    ///
    /// # Errors
    ///
    /// Returns the value back if the queue is full.
    pub fn try_enqueue(&mut self, value: T) -> Result<(), T> {
        let head = self.storage.head().load(Ordering::Relaxed);
        if self.storage.probe_write(head) != Probe::Ready {
            return Err(value);
        }
        self.storage.write(head, value);
        self.storage
            .head()
            .store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }
}

/// Read end of an SPSC queue.
pub struct Consumer<T> {
    storage: Arc<Storage<T>>,
}

impl<T> Consumer<T> {
    /// Actual (rounded) capacity.
    #[inline]
    #[must_use]
    pub fn size(&self) -> u32 {
        self.storage.capacity()
    }

    /// Snapshot of the number of queued elements.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Snapshot emptiness check.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    /// Dequeues a value, spinning until the producer publishes one.
    pub fn dequeue(&mut self) -> T {
        let tail = self.storage.tail().load(Ordering::Relaxed);
        let value = self.storage.read(tail);
        self.storage
            .tail()
            .store(tail.wrapping_add(1), Ordering::Release);
        value
    }

    /// Dequeues a value only if one is published right now.
    pub fn try_dequeue(&mut self) -> Option<T> {
        let tail = self.storage.tail().load(Ordering::Relaxed);
        if self.storage.probe_read(tail) != Probe::Ready {
            return None;
        }
        let value = self.storage.read(tail);
        self.storage
            .tail()
            .store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("size", &self.size())
            .field("len", &self.len())
            .finish()
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("size", &self.size())
            .field("len", &self.len())
            .finish()
    }
}
