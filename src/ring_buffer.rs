// Licensed under the Apache-2.0 license

//! Fixed-capacity single-producer/single-consumer ring buffer.
//!
//! The buffer is shared between an interrupt handler and the foreground loop
//! without a lock. Correctness rests on three rules:
//!
//! - only the producer ever stores `write`, only the consumer ever stores `read`;
//! - a slot is written before `write` is published and read before `read` is
//!   published (release stores paired with acquire loads);
//! - each index is a single word, so the other context observes it either
//!   fully advanced or not advanced at all.
//!
//! One slot is kept free to tell a full buffer from an empty one, so a
//! `RingBuffer<T, N>` holds at most `N - 1` items.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct RingBuffer<T, const N: usize> {
    slots: [UnsafeCell<MaybeUninit<T>>; N],
    read: AtomicUsize,
    write: AtomicUsize,
}

// SAFETY: slot access is partitioned by the index discipline above. The
// producer only touches the slot at `write`, which the consumer cannot reach
// until `write` is published; the consumer only touches the slot at `read`,
// which the producer cannot reuse until `read` is published.
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> RingBuffer<T, N> {
    const CAPACITY_CHECK: () = assert!(N >= 2, "RingBuffer needs at least two slots");

    #[must_use]
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_CHECK;
        Self {
            slots: [const { UnsafeCell::new(MaybeUninit::uninit()) }; N],
            read: AtomicUsize::new(0),
            write: AtomicUsize::new(0),
        }
    }

    #[inline]
    const fn next(index: usize) -> usize {
        (index + 1) % N
    }

    /// Number of items the buffer can hold at once (`N - 1`).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Enqueue `item`. Returns `false` and drops the item when the buffer is
    /// full; never blocks.
    ///
    /// Must only be called from the producer context.
    pub fn push(&self, item: T) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let next = Self::next(write);
        if next == self.read.load(Ordering::Acquire) {
            return false;
        }

        let Some(slot) = self.slots.get(write) else {
            return false;
        };
        // SAFETY: the slot at `write` is not visible to the consumer until the
        // release store below.
        unsafe { (*slot.get()).write(item) };
        self.write.store(next, Ordering::Release);
        true
    }

    /// Dequeue the oldest item.
    ///
    /// Must only be called from the consumer context.
    pub fn pop(&self) -> Option<T> {
        let read = self.read.load(Ordering::Relaxed);
        if read == self.write.load(Ordering::Acquire) {
            return None;
        }

        let slot = self.slots.get(read)?;
        // SAFETY: `read != write`, so the producer initialised this slot and
        // published it with a release store observed by the acquire load above.
        let item = unsafe { (*slot.get()).assume_init_read() };
        self.read.store(Self::next(read), Ordering::Release);
        Some(item)
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        self.read.load(Ordering::Acquire) != self.write.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        Self::next(self.write.load(Ordering::Acquire)) == self.read.load(Ordering::Acquire)
    }

    /// Items currently queued. Only a snapshot when the other side is live.
    #[must_use]
    pub fn len(&self) -> usize {
        let read = self.read.load(Ordering::Acquire);
        let write = self.write.load(Ordering::Acquire);
        (write + N - read) % N
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_data()
    }
}

impl<T, const N: usize> Drop for RingBuffer<T, N> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}
