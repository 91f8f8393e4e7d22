//! Counting semaphore used to park idle workers.

use parking_lot::{Condvar, Mutex};

/// Counting semaphore with a blocking acquire.
///
/// Wake order is unspecified; a single release wakes at most one waiter,
/// which is all the worker pool needs. The permit count is a `usize`, far
/// beyond any outstanding-task count a pool can reach.
pub struct Semaphore {
    permits: Mutex<usize>,
    on_release: Condvar,
}

impl Semaphore {
    /// Create a semaphore with `permits` initial permits.
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            on_release: Condvar::new(),
        }
    }

    /// Block until a permit is available, then take it.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock();
        while *permits == 0 {
            self.on_release.wait(&mut permits);
        }
        *permits -= 1;
    }

    /// Take a permit without blocking. Returns `false` if none is available.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Add `n` permits, waking up to `n` sleeping waiters.
    pub fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut permits = self.permits.lock();
        *permits += n;
        drop(permits);

        if n == 1 {
            self.on_release.notify_one();
        } else {
            self.on_release.notify_all();
        }
    }

    /// Current permit count. A racy snapshot.
    pub fn available(&self) -> usize {
        *self.permits.lock()
    }
}
