use crate::error::{PipelineError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// A fixed-capacity blocking FIFO connecting two adjacent stages.
///
/// A single mutex guards the item sequence; two condition variables signal
/// item arrival and slot availability. Both `enqueue` and `dequeue` re-check
/// their guard predicate in a loop after every wake, so spurious wakeups and
/// lost signals cannot break the capacity or emptiness invariants.
///
/// Handles are cheap to clone and share one underlying queue.
pub struct BoundedQueue<T: Send> {
    shared: Arc<Shared<T>>,
}

impl<T: Send> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Send> BoundedQueue<T> {
    /// Create a new queue holding at most `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Capacity is a startup-time constant, so
    /// a zero value is a programming error rather than a runtime condition.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    items: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Insert an item at the tail, blocking while the queue is at capacity.
    ///
    /// Returns `QueueClosed` if the queue is closed before a slot opens up.
    pub fn enqueue(&self, item: T) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        while inner.items.len() == self.shared.capacity && !inner.closed {
            self.shared.not_full.wait(&mut inner);
        }
        if inner.closed {
            return Err(PipelineError::QueueClosed);
        }
        inner.items.push_back(item);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking insert. Fails with `CapacityExceeded` when the queue is
    /// full instead of waiting for a consumer.
    pub fn try_enqueue(&self, item: T) -> Result<()> {
        let mut inner = self.shared.inner.lock();
        if inner.closed {
            return Err(PipelineError::QueueClosed);
        }
        if inner.items.len() == self.shared.capacity {
            return Err(PipelineError::CapacityExceeded);
        }
        inner.items.push_back(item);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Remove and return the head item, blocking while the queue is empty.
    ///
    /// A closed queue is drained in FIFO order before `QueueClosed` is
    /// returned, so no items are lost on shutdown.
    pub fn dequeue(&self) -> Result<T> {
        let mut inner = self.shared.inner.lock();
        while inner.items.is_empty() && !inner.closed {
            self.shared.not_empty.wait(&mut inner);
        }
        match inner.items.pop_front() {
            Some(item) => {
                self.shared.not_full.notify_one();
                Ok(item)
            }
            None => Err(PipelineError::QueueClosed),
        }
    }

    /// Close the queue, waking every blocked producer and consumer.
    ///
    /// Idempotent. Items already enqueued remain dequeueable.
    pub fn close(&self) {
        let mut inner = self.shared.inner.lock();
        inner.closed = true;
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
    }

    /// Get the number of items currently held.
    pub fn len(&self) -> usize {
        self.shared.inner.lock().items.len()
    }

    /// Check whether the queue holds no items.
    pub fn is_empty(&self) -> bool {
        self.shared.inner.lock().items.is_empty()
    }

    /// Get the fixed capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Check whether the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.inner.lock().closed
    }
}
