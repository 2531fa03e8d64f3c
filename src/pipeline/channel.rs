//! Bounded single-producer/single-consumer handoff between pipeline stages
//!
//! The channel trades completeness for freshness: when the consumer falls
//! behind, the oldest queued item is evicted to admit the new one, so the
//! queue never holds anything older than `capacity` items. Pushing never
//! blocks the producer; popping blocks the consumer on a condvar until an
//! item arrives or the channel is cancelled.
//!
//! Cancellation is part of the contract, not an afterthought: a consumer
//! blocked in [`TransferChannel::wait_pop`] is woken by [`TransferChannel::cancel`]
//! and sees `None`. Relying on a polled stop flag alone would leave a blocked
//! consumer sleeping forever and deadlock shutdown.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// Result of a push, for the producer's drop accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Item enqueued, nothing evicted
    Pushed,
    /// Item enqueued after evicting the oldest queued item
    PushedEvictingOldest,
    /// Channel is cancelled, item discarded
    Discarded,
}

/// Bounded SPSC channel with drop-oldest admission and cancellable
/// blocking pop.
pub struct TransferChannel<T> {
    queue: Mutex<VecDeque<T>>,
    available: Condvar,
    cancelled: AtomicBool,
    capacity: usize,
}

impl<T> TransferChannel<T> {
    /// Create a channel holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; a slot-less channel cannot hand
    /// anything off and is always a construction bug.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "TransferChannel capacity must be at least 1");
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            available: Condvar::new(),
            cancelled: AtomicBool::new(false),
            capacity,
        }
    }

    /// Enqueue an item without ever blocking.
    ///
    /// On a full queue the single oldest item is evicted first, bounding
    /// worst-case staleness to `capacity` items regardless of how far the
    /// consumer has fallen behind. After [`cancel`](Self::cancel) the item
    /// is dropped on the floor.
    pub fn push(&self, item: T) -> PushOutcome {
        if self.cancelled.load(Ordering::Acquire) {
            return PushOutcome::Discarded;
        }

        let outcome = {
            let mut queue = self.queue.lock().unwrap();
            let evicted = if queue.len() == self.capacity {
                queue.pop_front();
                true
            } else {
                false
            };
            queue.push_back(item);
            if evicted {
                PushOutcome::PushedEvictingOldest
            } else {
                PushOutcome::Pushed
            }
        };

        self.available.notify_one();
        outcome
    }

    /// Block until an item is available or the channel is cancelled.
    ///
    /// Returns `None` once cancelled — immediately, even if items are still
    /// queued; a cancelled pipeline must not keep processing stale data.
    pub fn wait_pop(&self) -> Option<T> {
        let mut queue = self.queue.lock().unwrap();
        loop {
            if self.cancelled.load(Ordering::Acquire) {
                return None;
            }
            if let Some(item) = queue.pop_front() {
                return Some(item);
            }
            queue = self.available.wait(queue).unwrap();
        }
    }

    /// Pop without blocking. Used by tests and by shutdown draining.
    pub fn try_pop(&self) -> Option<T> {
        if self.cancelled.load(Ordering::Acquire) {
            return None;
        }
        self.queue.lock().unwrap().pop_front()
    }

    /// Cancel the channel: wake every blocked consumer and refuse further
    /// items. Queued items stay in place until [`clear`](Self::clear).
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        // Take the lock before notifying so a consumer between its
        // cancelled-check and its wait cannot miss the wakeup.
        let _queue = self.queue.lock().unwrap();
        self.available.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Drop all queued items.
    pub fn clear(&self) {
        self.queue.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn occupancy_never_exceeds_capacity() {
        let chan = TransferChannel::new(3);
        for i in 0..100 {
            chan.push(i);
            assert!(chan.len() <= 3);
        }
    }

    #[test]
    fn burst_keeps_most_recent_in_push_order() {
        let chan = TransferChannel::new(2);
        for i in [1u32, 2, 3, 4] {
            chan.push(i);
        }
        assert_eq!(chan.len(), 2);
        assert_eq!(chan.try_pop(), Some(3));
        assert_eq!(chan.try_pop(), Some(4));
        assert_eq!(chan.try_pop(), None);
    }

    #[test]
    fn push_reports_eviction() {
        let chan = TransferChannel::new(1);
        assert_eq!(chan.push(1), PushOutcome::Pushed);
        assert_eq!(chan.push(2), PushOutcome::PushedEvictingOldest);
        assert_eq!(chan.try_pop(), Some(2));
    }

    #[test]
    fn wait_pop_wakes_on_push() {
        let chan = Arc::new(TransferChannel::new(2));
        let consumer_chan = chan.clone();

        let consumer = thread::spawn(move || consumer_chan.wait_pop());

        thread::sleep(Duration::from_millis(20));
        chan.push(42u32);

        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn cancel_wakes_blocked_consumer() {
        let chan = Arc::new(TransferChannel::<u32>::new(2));
        let consumer_chan = chan.clone();

        let consumer = thread::spawn(move || consumer_chan.wait_pop());

        thread::sleep(Duration::from_millis(20));
        chan.cancel();

        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn cancelled_channel_rejects_everything() {
        let chan = TransferChannel::new(2);
        chan.push(1u32);
        chan.cancel();

        assert_eq!(chan.push(2), PushOutcome::Discarded);
        // Items queued before cancellation are not delivered either.
        assert_eq!(chan.wait_pop(), None);
        assert_eq!(chan.try_pop(), None);
    }

    #[test]
    fn clear_empties_the_queue() {
        let chan = TransferChannel::new(4);
        for i in 0..4 {
            chan.push(i);
        }
        chan.clear();
        assert!(chan.is_empty());
    }

    #[test]
    #[should_panic]
    fn zero_capacity_is_rejected() {
        let _ = TransferChannel::<u32>::new(0);
    }

    #[test]
    fn producer_and_consumer_across_threads() {
        let chan = Arc::new(TransferChannel::new(4));
        let producer_chan = chan.clone();

        let producer = thread::spawn(move || {
            for i in 0..200u32 {
                producer_chan.push(i);
                thread::sleep(Duration::from_micros(50));
            }
            producer_chan.cancel();
        });

        let mut last_seen: Option<u32> = None;
        let mut received = 0usize;
        while let Some(value) = chan.wait_pop() {
            if let Some(prev) = last_seen {
                // Drop-oldest may skip values but never reorders them.
                assert!(value > prev, "out of order: {} after {}", value, prev);
            }
            last_seen = Some(value);
            received += 1;
        }

        producer.join().unwrap();
        assert!(received > 0);
    }
}
