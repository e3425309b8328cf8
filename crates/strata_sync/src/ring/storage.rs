//! # Slot Storage
//!
//! The shared engine under both ring strategies: a power-of-two array of
//! padded slots plus the two claim counters.
//!
//! ## Safety Note
//!
//! Slots never hand out `&T`; values are moved in and out of an
//! `UnsafeCell`. The slot state word is the lock: a cell is written only by the thread that moved
//! the word into `Loading`, and read only by the thread that moved it into
//! `Unloading`. Both moves are compare-and-swaps, so exclusivity holds even
//! if two threads were handed the same index.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::{Backoff, CachePadded};

use super::round_capacity;

/// Lifecycle of one slot. Cycles in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub(crate) enum State {
    /// Empty, waiting for a producer.
    Unloaded = 0,
    /// A producer owns the cell and is writing.
    Loading = 1,
    /// Holds a published value.
    Loaded = 2,
    /// A consumer owns the cell and is reading.
    Unloading = 3,
}

impl State {
    const BITS: u32 = 2;
    const MASK: usize = (1 << Self::BITS) - 1;

    #[inline]
    const fn from_bits(bits: usize) -> Self {
        match bits & Self::MASK {
            0 => Self::Unloaded,
            1 => Self::Loading,
            2 => Self::Loaded,
            _ => Self::Unloading,
        }
    }
}

/// Packs a lap number and a state into one word.
///
/// The lap is `claim index / capacity`. Carrying it in the state word means a
/// claimant one full ring ahead cannot take the slot from the claimant it is
/// lapping: it waits for its own `(lap, Unloaded)`.
#[inline]
const fn stamp(lap: usize, state: State) -> usize {
    (lap << State::BITS) | state as usize
}

/// What a non-blocking caller found when it looked at the slot for an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Probe {
    /// The slot is in the state the caller needs for this lap.
    Ready,
    /// The slot is still held by the previous lap (full) or not yet
    /// published (empty).
    Busy,
    /// Another thread already claimed this index; reload the counter.
    Stale,
}

/// One element cell and its state word.
pub(crate) struct Slot<T> {
    stamp: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            stamp: AtomicUsize::new(stamp(0, State::Unloaded)),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

/// Fixed-size slot array with padded `head` / `tail` claim counters.
///
/// `head` is the next index to claim for writing, `tail` the next index to
/// claim for reading. Both only grow (wrapping at `usize::MAX`); the slot for
/// an index is `index & mask`.
pub(crate) struct Storage<T> {
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    slots: Box<[CachePadded<Slot<T>>]>,
    capacity: u32,
    mask: usize,
    lap_shift: u32,
}

// SAFETY: values move between threads through the slot protocol; no `&T` is
// ever shared, so `T: Send` is enough for both.
unsafe impl<T: Send> Send for Storage<T> {}
// SAFETY: see above; every cell access is guarded by a successful state CAS.
unsafe impl<T: Send> Sync for Storage<T> {}

impl<T> Storage<T> {
    /// Allocates storage for `round_capacity(requested)` elements.
    pub(crate) fn new(requested: u32) -> Self {
        let capacity = round_capacity(requested);
        let len = capacity as usize;
        let slots: Box<[CachePadded<Slot<T>>]> =
            (0..len).map(|_| CachePadded::new(Slot::new())).collect();

        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            slots,
            capacity,
            mask: len - 1,
            lap_shift: capacity.trailing_zeros(),
        }
    }

    /// Actual (rounded) capacity.
    #[inline]
    pub(crate) fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Write-claim counter.
    #[inline]
    pub(crate) fn head(&self) -> &AtomicUsize {
        &self.head
    }

    /// Read-claim counter.
    #[inline]
    pub(crate) fn tail(&self) -> &AtomicUsize {
        &self.tail
    }

    /// Number of write claims not yet matched by read claims, clamped to
    /// `[0, capacity]`. A snapshot only.
    pub(crate) fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        // Consumers blocked on an empty ring push `tail` past `head`.
        #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let pending = head.wrapping_sub(tail) as isize;
        if pending <= 0 {
            0
        } else {
            (pending as usize).min(self.mask + 1)
        }
    }

    #[inline]
    fn slot(&self, index: usize) -> &Slot<T> {
        &self.slots[index & self.mask]
    }

    #[inline]
    fn lap(&self, index: usize) -> usize {
        index >> self.lap_shift
    }

    #[inline]
    fn previous_lap(&self, index: usize) -> usize {
        self.lap(index.wrapping_sub(self.mask + 1))
    }

    #[inline]
    fn next_lap(&self, index: usize) -> usize {
        self.lap(index.wrapping_add(self.mask + 1))
    }

    /// Writes `value` into the slot for a claimed `index`, waiting for the
    /// previous lap's consumer to vacate it first.
    pub(crate) fn write(&self, index: usize, value: T) {
        let slot = self.slot(index);
        let lap = self.lap(index);
        let backoff = Backoff::new();

        while slot
            .stamp
            .compare_exchange_weak(
                stamp(lap, State::Unloaded),
                stamp(lap, State::Loading),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_err()
        {
            backoff.snooze();
        }

        // SAFETY: the CAS above moved this slot into `Loading` for our lap;
        // no other thread touches the cell until we publish `Loaded`.
        unsafe { (*slot.value.get()).write(value) };
        slot.stamp.store(stamp(lap, State::Loaded), Ordering::Release);
    }

    /// Takes the value out of the slot for a claimed `index`, waiting for its
    /// producer to publish it first.
    pub(crate) fn read(&self, index: usize) -> T {
        let slot = self.slot(index);
        let lap = self.lap(index);
        let backoff = Backoff::new();

        while slot
            .stamp
            .compare_exchange_weak(
                stamp(lap, State::Loaded),
                stamp(lap, State::Unloading),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_err()
        {
            backoff.snooze();
        }

        // SAFETY: `Loaded` was published with Release after the value was
        // written, and the CAS into `Unloading` makes us its only reader.
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.stamp
            .store(stamp(self.next_lap(index), State::Unloaded), Ordering::Release);
        value
    }

    /// Checks, without claiming, whether a producer could write `index` now.
    pub(crate) fn probe_write(&self, index: usize) -> Probe {
        let current = self.slot(index).stamp.load(Ordering::Acquire);
        let slot_lap = current >> State::BITS;

        if current == stamp(self.lap(index), State::Unloaded) {
            Probe::Ready
        } else if slot_lap == self.previous_lap(index) {
            // Last lap's element is still here: the ring is full.
            Probe::Busy
        } else {
            Probe::Stale
        }
    }

    /// Checks, without claiming, whether a consumer could read `index` now.
    pub(crate) fn probe_read(&self, index: usize) -> Probe {
        let current = self.slot(index).stamp.load(Ordering::Acquire);
        let slot_lap = current >> State::BITS;
        let lap = self.lap(index);

        if current == stamp(lap, State::Loaded) {
            Probe::Ready
        } else if slot_lap == lap && State::from_bits(current) == State::Unloading {
            Probe::Stale
        } else if slot_lap == lap || slot_lap == self.previous_lap(index) {
            // Not yet published for this lap: the ring is empty here.
            Probe::Busy
        } else {
            Probe::Stale
        }
    }

    /// Current state of the slot an index maps to (for tests and debugging).
    #[cfg(test)]
    pub(crate) fn state_of(&self, index: usize) -> State {
        State::from_bits(self.slot(index).stamp.load(Ordering::Acquire))
    }
}

impl<T> Drop for Storage<T> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            if State::from_bits(*slot.stamp.get_mut()) == State::Loaded {
                // SAFETY: `Loaded` means the cell holds an initialized value
                // that no consumer has taken; we have exclusive access.
                unsafe { slot.value.get_mut().assume_init_drop() };
            }
        }
    }
}
