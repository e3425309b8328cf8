//! # Unbounded Lock-Free Queue
//!
//! A linked FIFO that never rejects an enqueue. Appends link a new node after
//! the current tail; dequeues advance a sentinel head.
//!
//! ## Safety Note
//!
//! Nodes are freed while other threads may still be reading them, so they go
//! through epoch-based reclamation (`crossbeam_epoch`): a node unlinked from
//! the head is destroyed only once every thread pinned at the time has moved
//! on.
//!
//! ```text
//!   head                                   tail
//!    │                                      │
//!    ▼                                      ▼
//!  ┌──────────┐    ┌──────┐    ┌──────┐    ┌──────┐
//!  │ sentinel │──► │  a   │──► │  b   │──► │  c   │──► null
//!  └──────────┘    └──────┘    └──────┘    └──────┘
//!
//!  dequeue: head := a, take a's value, a becomes the sentinel,
//!           the old sentinel is retired to the epoch collector
//! ```

#![allow(unsafe_code)]

use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::Ordering;

use crossbeam_epoch::{self as epoch, Atomic, Guard, Owned, Shared};
use crossbeam_utils::{Backoff, CachePadded};

/// A node in the linked list.
///
/// The value is `MaybeUninit` because the sentinel has none: its value was
/// moved out when it was dequeued (or it is the initial dummy).
struct Node<T> {
    value: MaybeUninit<T>,
    next: Atomic<Node<T>>,
}

/// Unbounded lock-free MPMC FIFO queue.
///
/// # Example
///
/// ```rust
/// use strata_sync::UnboundedQueue;
///
/// let queue = UnboundedQueue::new();
/// queue.enqueue("shader-compiled");
/// queue.enqueue("texture-uploaded");
///
/// assert_eq!(queue.try_dequeue(), Some("shader-compiled"));
/// assert_eq!(queue.try_dequeue(), Some("texture-uploaded"));
/// assert_eq!(queue.try_dequeue(), None);
/// ```
pub struct UnboundedQueue<T> {
    head: CachePadded<Atomic<Node<T>>>,
    tail: CachePadded<Atomic<Node<T>>>,
}

// SAFETY: values are moved in and out, never shared by reference, and nodes
// are reclaimed through the epoch collector.
unsafe impl<T: Send> Send for UnboundedQueue<T> {}
// SAFETY: see above.
unsafe impl<T: Send> Sync for UnboundedQueue<T> {}

impl<T> UnboundedQueue<T> {
    /// Creates an empty queue holding only the sentinel node.
    #[must_use]
    pub fn new() -> Self {
        let queue = Self {
            head: CachePadded::new(Atomic::null()),
            tail: CachePadded::new(Atomic::null()),
        };
        let sentinel = Owned::new(Node {
            value: MaybeUninit::uninit(),
            next: Atomic::null(),
        });

        // SAFETY: the queue is not shared yet, so no guard is needed.
        unsafe {
            let guard = epoch::unprotected();
            let sentinel = sentinel.into_shared(guard);
            queue.head.store(sentinel, Ordering::Relaxed);
            queue.tail.store(sentinel, Ordering::Relaxed);
        }
        queue
    }

    /// Appends `value` at the tail. Never fails.
    pub fn enqueue(&self, value: T) {
        let guard = &epoch::pin();
        let node = Owned::new(Node {
            value: MaybeUninit::new(value),
            next: Atomic::null(),
        })
        .into_shared(guard);

        let backoff = Backoff::new();
        loop {
            let tail = self.tail.load(Ordering::Acquire, guard);
            if self.link_after(tail, node, guard) {
                return;
            }
            backoff.spin();
        }
    }

    /// Removes the oldest value, or returns `None` if the queue is empty.
    pub fn try_dequeue(&self) -> Option<T> {
        let guard = &epoch::pin();
        let backoff = Backoff::new();
        loop {
            if let Ok(value) = self.unlink_head(guard) {
                return value;
            }
            backoff.spin();
        }
    }

    /// Snapshot emptiness check.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let guard = &epoch::pin();
        let head = self.head.load(Ordering::Acquire, guard);
        // SAFETY: the head is never null and cannot be reclaimed while pinned.
        let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);
        next.is_null()
    }

    /// Tries once to link `node` after `tail`. Swings a lagging tail forward
    /// and returns `false` if `tail` was not the last node.
    fn link_after(
        &self,
        tail: Shared<'_, Node<T>>,
        node: Shared<'_, Node<T>>,
        guard: &Guard,
    ) -> bool {
        // SAFETY: the tail is never null and we are pinned.
        let tail_ref = unsafe { tail.deref() };
        let next = tail_ref.next.load(Ordering::Acquire, guard);

        if !next.is_null() {
            // Another producer linked a node but has not moved the tail yet.
            let _ = self
                .tail
                .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
            return false;
        }

        let linked = tail_ref
            .next
            .compare_exchange(Shared::null(), node, Ordering::Release, Ordering::Relaxed, guard)
            .is_ok();
        if linked {
            let _ = self
                .tail
                .compare_exchange(tail, node, Ordering::Release, Ordering::Relaxed, guard);
        }
        linked
    }

    /// Tries once to advance the head. `Err` means another consumer won the
    /// race and the caller should retry.
    fn unlink_head(&self, guard: &Guard) -> Result<Option<T>, ()> {
        let head = self.head.load(Ordering::Acquire, guard);
        // SAFETY: the head is never null and we are pinned.
        let next = unsafe { head.deref() }.next.load(Ordering::Acquire, guard);

        // SAFETY: a non-null `next` is a live node while we are pinned.
        let Some(next_ref) = (unsafe { next.as_ref() }) else {
            return Ok(None);
        };

        self.head
            .compare_exchange(head, next, Ordering::Release, Ordering::Relaxed, guard)
            .map_err(|_| ())?;

        // Keep the tail from pointing at a node we are about to retire.
        let tail = self.tail.load(Ordering::Relaxed, guard);
        if head == tail {
            let _ = self
                .tail
                .compare_exchange(tail, next, Ordering::Release, Ordering::Relaxed, guard);
        }

        // SAFETY: winning the head CAS makes us the only thread that moves
        // this value out; `next` is now the sentinel and its value is never
        // read again. The old head is unreachable for new readers.
        unsafe {
            guard.defer_destroy(head);
            Ok(Some(next_ref.value.as_ptr().read()))
        }
    }
}

impl<T> Default for UnboundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for UnboundedQueue<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no other thread holds a reference, so
        // nodes can be destroyed immediately.
        unsafe {
            let guard = epoch::unprotected();
            while let Ok(Some(value)) = self.unlink_head(guard) {
                drop(value);
            }
            let sentinel = self.head.load(Ordering::Relaxed, guard);
            drop(sentinel.into_owned());
        }
    }
}

impl<T> fmt::Debug for UnboundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnboundedQueue")
            .field("is_empty", &self.is_empty())
            .finish()
    }
}
