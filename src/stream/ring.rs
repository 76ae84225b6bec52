//! Bounded ingress ring between the token producer and the merge consumer.
//!
//! Multi-producer, single-consumer. The ring is the only state shared
//! between the ingest callback and the merge driver; a short mutex-held
//! critical section per operation keeps the producer from ever blocking on
//! merge work.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Default number of pending updates held before overwriting.
pub const DEFAULT_RING_CAPACITY: usize = 10;

/// Fixed-capacity ring with drop-oldest overflow semantics.
#[derive(Debug)]
pub struct UpdateRing<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> UpdateRing<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be positive");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Enqueues an item, overwriting the oldest entry when full.
    ///
    /// Returns true if an entry was dropped to make room.
    pub fn enqueue(&self, item: T) -> bool {
        let mut queue = self.inner.lock().unwrap();
        let dropped = queue.len() == self.capacity;
        if dropped {
            queue.pop_front();
        }
        queue.push_back(item);
        dropped
    }

    /// Removes and returns the oldest item.
    pub fn dequeue(&self) -> Option<T> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Advisory fill probe: true within one slot of capacity.
    ///
    /// Racy with respect to concurrent producers; callers use it only to
    /// decide whether to warn about saturation.
    pub fn almost_full(&self) -> bool {
        self.inner.lock().unwrap().len() + 1 >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Default for UpdateRing<T> {
    fn default() -> Self {
        Self::new(DEFAULT_RING_CAPACITY)
    }
}
