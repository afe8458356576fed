//! Bounded lock-free single-producer/single-consumer ring buffer.
//!
//! Backed by [`ringbuf::HeapRb`], a proven lock-free SPSC implementation;
//! this module adds the effective-capacity, drop-oldest, and drain
//! semantics spec'd for the screensaver substrate on top of it.

use crate::error::Error;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;

/// Producer half of a bounded SPSC ring buffer.
///
/// Only ever used from the single producer thread; cloning is not
/// provided because the contract is single-producer.
pub struct RingSender<T> {
    inner: ringbuf::HeapProd<T>,
    effective_capacity: usize,
}

/// Consumer half of a bounded SPSC ring buffer.
pub struct RingReceiver<T> {
    inner: ringbuf::HeapCons<T>,
}

/// Creates a bounded SPSC ring buffer of the given capacity.
///
/// Effective capacity is `capacity - 1`: one slot is reserved to
/// disambiguate empty from full, matching the classic ring-buffer
/// construction used throughout this codebase's lock-free primitives.
pub fn ring_channel<T>(capacity: usize) -> Result<(RingSender<T>, RingReceiver<T>), Error> {
    if capacity <= 1 {
        return Err(Error::InvalidCapacity(capacity));
    }
    let rb = HeapRb::<T>::new(capacity);
    let (prod, cons) = rb.split();
    Ok((
        RingSender {
            inner: prod,
            effective_capacity: capacity - 1,
        },
        RingReceiver { inner: cons },
    ))
}

impl<T> RingSender<T> {
    /// Attempts to push a value. Returns `false` without blocking if the
    /// effective capacity has been reached.
    pub fn try_push(&mut self, value: T) -> bool {
        if self.inner.occupied_len() >= self.effective_capacity {
            return false;
        }
        self.inner.try_push(value).is_ok()
    }

    /// Pushes a value, discarding the oldest queued value if the buffer is
    /// at its effective capacity. Always succeeds from the caller's point
    /// of view. If a concurrent pop races the drop and the buffer is still
    /// full when the write is attempted, the current tail slot is
    /// overwritten instead of growing unbounded.
    pub fn push_drop_oldest(&mut self, value: T) {
        while self.inner.occupied_len() >= self.effective_capacity {
            if self.inner.try_pop().is_none() {
                break;
            }
        }
        if self.inner.try_push(value).is_err() {
            // Concurrent pop race left no room; force it in by dropping one
            // more slot. This keeps `push_drop_oldest` total/non-blocking.
            let _ = self.inner.try_pop();
            let _ = self.inner.try_push(value);
        }
    }

    /// Advisory occupied length.
    pub fn len(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Advisory emptiness check.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Advisory fullness check against the effective capacity.
    pub fn is_full(&self) -> bool {
        self.inner.occupied_len() >= self.effective_capacity
    }
}

impl<T> RingReceiver<T> {
    /// Attempts to pop the oldest value without blocking.
    pub fn try_pop(&mut self) -> Option<T> {
        self.inner.try_pop()
    }

    /// Drains every currently-queued value into `out`, oldest first.
    pub fn drain_into(&mut self, out: &mut Vec<T>) {
        while let Some(v) = self.inner.try_pop() {
            out.push(v);
        }
    }

    /// Advisory occupied length.
    pub fn len(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Advisory emptiness check.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drops every queued value. Only safe to call when the producer is
    /// quiesced (i.e. not concurrently pushing), per the ring buffer
    /// contract.
    pub fn clear(&mut self) {
        while self.inner.try_pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn rejects_trivial_capacity() {
        assert!(ring_channel::<u8>(0).is_err());
        assert!(ring_channel::<u8>(1).is_err());
    }

    #[test]
    fn saturation_scenario_from_spec() {
        // spec.md §8 scenario 1.
        let (mut tx, mut rx) = ring_channel::<i32>(4).unwrap();
        assert!(tx.try_push(1));
        assert!(tx.try_push(2));
        assert!(tx.try_push(3));
        assert!(!tx.try_push(4));

        assert_eq!(rx.try_pop(), Some(1));
        assert_eq!(rx.try_pop(), Some(2));

        assert!(tx.try_push(4));
        assert!(tx.try_push(5));

        let mut drained = Vec::new();
        rx.drain_into(&mut drained);
        assert_eq!(drained, vec![3, 4, 5]);
    }

    #[test]
    fn fifo_order_preserved() {
        let (mut tx, mut rx) = ring_channel::<i32>(8).unwrap();
        for i in 0..5 {
            assert!(tx.try_push(i));
        }
        let mut out = Vec::new();
        rx.drain_into(&mut out);
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn drop_oldest_keeps_freshest_at_tail() {
        let (mut tx, mut rx) = ring_channel::<i32>(3).unwrap();
        tx.push_drop_oldest(1);
        tx.push_drop_oldest(2);
        // effective capacity is 2: buffer now full at [1, 2].
        tx.push_drop_oldest(3);
        let mut out = Vec::new();
        rx.drain_into(&mut out);
        assert_eq!(out.last(), Some(&3));
        assert_eq!(out, vec![2, 3]);
    }

    #[test]
    fn capacity_bounds_hold() {
        let (mut tx, _rx) = ring_channel::<i32>(5).unwrap();
        for i in 0..4 {
            assert!(tx.try_push(i));
        }
        assert!(tx.is_full());
        assert!(!tx.try_push(99));
    }
}
