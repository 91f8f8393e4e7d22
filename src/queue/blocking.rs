//! Mutex/condvar bounded queue used to baseline the lock-free structures.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Bounded blocking FIFO queue.
///
/// The contrast case for the lock-free queues: one mutex around a
/// `VecDeque`, one condvar per direction. `push`/`pop` block on a full or
/// empty queue; the `try_` variants never block. Benchmarks pit the worker
/// pool's MPMC queue against this.
pub struct BlockingQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BlockingQueue<T> {
    /// Create a new queue holding at most `capacity` values.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");

        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Push a value, blocking while the queue is full.
    pub fn push(&self, value: T) {
        let mut inner = self.inner.lock();
        while inner.len() == self.capacity {
            self.not_full.wait(&mut inner);
        }
        inner.push_back(value);
        drop(inner);
        self.not_empty.notify_one();
    }

    /// Pop a value, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        let mut inner = self.inner.lock();
        loop {
            if let Some(value) = inner.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return value;
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Push without blocking. Returns `Err(value)` if the queue is full.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        if inner.len() == self.capacity {
            return Err(value);
        }
        inner.push_back(value);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pop without blocking. Returns `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let value = inner.pop_front();
        drop(inner);
        if value.is_some() {
            self.not_full.notify_one();
        }
        value
    }

    /// Number of values currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Get the capacity of the queue.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
