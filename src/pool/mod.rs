//! Bounded worker pool backed by the lock-free MPMC queue.
//!
//! A submitter hands a callable to [`ThreadPool::submit`]; the pool enqueues
//! it and releases one semaphore permit; a sleeping worker wakes, dequeues,
//! and runs it. Shutdown reverses the flow: the flag is set once, one permit
//! per worker is released so every worker observes the flag, and all workers
//! are joined.

mod semaphore;
mod stats;

pub use semaphore::Semaphore;
pub use stats::{PoolStats, StatsSnapshot};

use crate::queue::MpmcQueue;
use crossbeam::utils::Backoff;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::thread::JoinHandle;

/// Type-erased unit of work.
type Task = Box<dyn FnOnce() + Send + 'static>;

/// Policy applied when `submit` finds the task queue full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FullQueuePolicy {
    /// Run the task synchronously on the submitting thread (the default).
    ///
    /// Gives natural backpressure without blocking the submitter on a
    /// condition, but a task that submits into its own full pool will
    /// recurse on the caller's stack.
    CallerRuns,

    /// Spin, then yield, until a queue slot frees up.
    ///
    /// Each rejected enqueue still spends a queue ticket, so a pool whose
    /// submitters persistently outrun its workers can keep rejecting;
    /// caller-runs is the robust default for that load shape.
    SpinYield,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of worker threads (at least 1)
    pub workers: usize,

    /// Task queue capacity, rounded up to a power of two
    pub queue_capacity: usize,

    /// Behavior when the task queue is full
    pub full_queue_policy: FullQueuePolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
            full_queue_policy: FullQueuePolicy::CallerRuns,
        }
    }
}

impl PoolConfig {
    /// Create a simple configuration
    pub fn simple(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.workers == 0 {
            return Err(crate::Error::Config(
                "Worker count must be at least 1".to_string(),
            ));
        }

        if self.queue_capacity == 0 {
            return Err(crate::Error::Config(
                "Queue capacity must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// State shared between the pool handle and its workers.
struct PoolShared {
    queue: MpmcQueue<Task>,
    idle: Semaphore,
    shutdown: AtomicBool,
    stats: PoolStats,
}

impl PoolShared {
    #[inline]
    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Run one task, isolating panics from the executing thread.
    fn run_task(&self, task: Task, on_caller: bool) {
        if on_caller {
            self.stats.record_caller_run();
        }
        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
            self.stats.record_panicked();
            log::warn!("pool task panicked; execution continues");
        }
        self.stats.record_executed();
    }
}

/// Worker body: sleep on the semaphore, drain one task per permit.
fn worker_loop(shared: &PoolShared) {
    loop {
        shared.idle.acquire();

        if shared.is_shutdown() {
            break;
        }

        // One permit corresponds to one published task, but another worker
        // may win the race for it, and a dequeue ticket can land on a slot
        // whose producer ticket was abandoned; retry until a task arrives
        // or shutdown begins.
        loop {
            match shared.queue.try_dequeue() {
                Some(task) => {
                    shared.run_task(task, false);
                    break;
                }
                None => {
                    if shared.is_shutdown() {
                        return;
                    }
                    thread::yield_now();
                }
            }
        }
    }
}

/// Bounded worker pool.
///
/// Owns a lock-free MPMC task queue, a counting semaphore that parks idle
/// workers, and a fixed set of worker threads. Tasks are type-erased
/// `FnOnce()` callables, boxed at submission.
///
/// # Example
/// ```
/// use ringpool::{PoolConfig, ThreadPool};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let pool = ThreadPool::new(PoolConfig::simple(2, 64))?;
/// let hits = Arc::new(AtomicUsize::new(0));
///
/// for _ in 0..10 {
///     let hits = Arc::clone(&hits);
///     pool.submit(move || {
///         hits.fetch_add(1, Ordering::Relaxed);
///     });
/// }
///
/// pool.shutdown();
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    policy: FullQueuePolicy,
}

impl ThreadPool {
    /// Create a pool and spawn its workers.
    pub fn new(config: PoolConfig) -> crate::Result<Self> {
        config.validate()?;

        let shared: Arc<PoolShared> = Arc::new(PoolShared {
            queue: MpmcQueue::new(config.queue_capacity),
            idle: Semaphore::new(0),
            shutdown: AtomicBool::new(false),
            stats: PoolStats::default(),
        });

        let mut workers: Vec<JoinHandle<()>> = Vec::with_capacity(config.workers);
        for i in 0..config.workers {
            let worker_shared: Arc<PoolShared> = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("ringpool-worker-{i}"))
                .spawn(move || worker_loop(&worker_shared));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Unwind the workers already running before bailing out.
                    shared.shutdown.store(true, Ordering::Release);
                    shared.idle.release(workers.len());
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(e.into());
                }
            }
        }

        log::debug!(
            "pool started: {} workers, queue capacity {}",
            config.workers,
            shared.queue.capacity()
        );

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            worker_count: config.workers,
            policy: config.full_queue_policy,
        })
    }

    /// Submit a task for execution.
    ///
    /// Fast path: the task is enqueued and one sleeping worker is woken.
    /// When the queue is full the configured [`FullQueuePolicy`] applies;
    /// under the default caller-runs policy the task has already run on this
    /// thread by the time `submit` returns. Note that a caller-run task
    /// which itself submits into the same full pool will grow the
    /// submitter's stack without bound.
    ///
    /// Panics inside a task are caught, counted, and logged; they poison
    /// neither the workers nor the submitter.
    ///
    /// Once shutdown has begun nothing drains the queue anymore, so
    /// submitted tasks run on the caller.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.stats.record_submitted();

        if self.shared.is_shutdown() {
            self.shared.run_task(Box::new(task), true);
            return;
        }

        match self.shared.queue.try_enqueue(Box::new(task)) {
            Ok(()) => self.shared.idle.release(1),
            Err(task) => self.submit_full(task),
        }
    }

    /// Slow path: the queue was full at submission time.
    fn submit_full(&self, mut task: Task) {
        match self.policy {
            FullQueuePolicy::CallerRuns => self.shared.run_task(task, true),
            FullQueuePolicy::SpinYield => {
                let backoff: Backoff = Backoff::new();
                loop {
                    if self.shared.is_shutdown() {
                        // Workers are gone; fall back to the caller.
                        self.shared.run_task(task, true);
                        return;
                    }
                    match self.shared.queue.try_enqueue(task) {
                        Ok(()) => {
                            self.shared.idle.release(1);
                            return;
                        }
                        Err(rejected) => task = rejected,
                    }
                    backoff.snooze();
                }
            }
        }
    }

    /// Shut the pool down and join every worker.
    ///
    /// The first call wins: it sets the shutdown flag and wakes every worker
    /// with one permit each. Every call, first or not, waits until all
    /// workers have been joined before returning, so no worker thread
    /// outlives any `shutdown` return. Tasks still queued when the workers
    /// exit are discarded without running.
    pub fn shutdown(&self) {
        if self
            .shared
            .shutdown
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.shared.idle.release(self.worker_count);
            log::debug!("pool shutdown requested");
        }

        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }

        // Quiesced under the lock: workers are joined and later shutdown
        // callers serialize behind us. Failed dequeues also spend tickets,
        // so sweeping until the counters meet visits every outstanding
        // ticket and drains every task that was published but never run.
        let mut discarded: u64 = 0;
        while !self.shared.queue.is_empty() {
            if let Some(task) = self.shared.queue.try_dequeue() {
                drop(task);
                discarded += 1;
            }
        }
        if discarded > 0 {
            self.shared.stats.record_discarded(discarded);
            log::debug!("pool shutdown discarded {discarded} queued tasks");
        }
    }

    /// Execution counters for this pool.
    pub fn stats(&self) -> &PoolStats {
        &self.shared.stats
    }

    /// Number of worker threads the pool was built with.
    pub fn workers(&self) -> usize {
        self.worker_count
    }

    /// Capacity of the task queue (rounded up at construction).
    pub fn queue_capacity(&self) -> usize {
        self.shared.queue.capacity()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    fn wait_until(deadline_ms: u64, mut done: impl FnMut() -> bool) {
        for _ in 0..deadline_ms {
            if done() {
                return;
            }
            thread::sleep(Duration::from_millis(1));
        }
        panic!("condition not reached within {deadline_ms}ms");
    }

    #[test]
    fn test_executes_submitted_tasks() {
        let pool: ThreadPool = ThreadPool::new(PoolConfig::simple(4, 64)).unwrap();
        let counter: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

        for _ in 0..100 {
            let counter: Arc<AtomicUsize> = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }

        wait_until(2000, || counter.load(Ordering::Relaxed) == 100);
        pool.shutdown();

        assert_eq!(counter.load(Ordering::Relaxed), 100);
        assert_eq!(pool.stats().executed(), 100);
    }

    #[test]
    fn test_config_validation() {
        assert!(ThreadPool::new(PoolConfig::simple(0, 64)).is_err());
        assert!(ThreadPool::new(PoolConfig::simple(1, 0)).is_err());

        let pool: ThreadPool = ThreadPool::new(PoolConfig::simple(1, 5)).unwrap();
        assert_eq!(pool.queue_capacity(), 8);
        assert_eq!(pool.workers(), 1);
    }

    #[test]
    fn test_caller_runs_before_submit_returns() {
        let pool: ThreadPool = ThreadPool::new(PoolConfig::simple(1, 2)).unwrap();

        // Park the single worker inside a task
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        pool.submit(move || {
            started_tx.send(()).unwrap();
            release_rx.recv().unwrap();
        });
        started_rx.recv().unwrap();

        // Fill the queue behind the parked worker
        pool.submit(|| {});
        pool.submit(|| {});

        // The next submission cannot be queued; it must run here, now
        let ran: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
        let ran_clone: Arc<AtomicBool> = Arc::clone(&ran);
        let caller: thread::ThreadId = thread::current().id();
        let ran_on: Arc<Mutex<Option<thread::ThreadId>>> = Arc::new(Mutex::new(None));
        let ran_on_clone: Arc<Mutex<Option<thread::ThreadId>>> = Arc::clone(&ran_on);

        pool.submit(move || {
            ran_clone.store(true, Ordering::Relaxed);
            *ran_on_clone.lock() = Some(thread::current().id());
        });

        assert!(ran.load(Ordering::Relaxed));
        assert_eq!(*ran_on.lock(), Some(caller));
        assert_eq!(pool.stats().caller_run(), 1);

        release_tx.send(()).unwrap();
        pool.shutdown();
    }

    #[test]
    fn test_spin_yield_policy_never_caller_runs() {
        let config = PoolConfig {
            workers: 2,
            queue_capacity: 256,
            full_queue_policy: FullQueuePolicy::SpinYield,
        };
        let pool: ThreadPool = ThreadPool::new(config).unwrap();
        let counter: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));

        for _ in 0..200 {
            let counter: Arc<AtomicUsize> = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }

        wait_until(2000, || counter.load(Ordering::Relaxed) == 200);
        pool.shutdown();

        assert_eq!(pool.stats().caller_run(), 0);
        assert_eq!(pool.stats().executed(), 200);
    }

    #[test]
    fn test_panic_does_not_poison_workers() {
        let pool: ThreadPool = ThreadPool::new(PoolConfig::simple(1, 16)).unwrap();

        pool.submit(|| panic!("task failure"));

        let ran: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
        let ran_clone: Arc<AtomicBool> = Arc::clone(&ran);
        pool.submit(move || {
            ran_clone.store(true, Ordering::Relaxed);
        });

        wait_until(2000, || ran.load(Ordering::Relaxed));
        pool.shutdown();

        assert_eq!(pool.stats().panicked(), 1);
        assert_eq!(pool.stats().executed(), 2);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool: ThreadPool = ThreadPool::new(PoolConfig::simple(4, 64)).unwrap();

        pool.shutdown();
        let first: StatsSnapshot = pool.stats().snapshot();

        pool.shutdown();
        let second: StatsSnapshot = pool.stats().snapshot();

        assert_eq!(first.discarded, second.discarded);
        assert_eq!(first.executed, second.executed);
    }

    #[test]
    fn test_submit_after_shutdown_runs_on_caller() {
        let pool: ThreadPool = ThreadPool::new(PoolConfig::simple(2, 16)).unwrap();
        pool.shutdown();

        let ran: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
        let ran_clone: Arc<AtomicBool> = Arc::clone(&ran);
        pool.submit(move || {
            ran_clone.store(true, Ordering::Relaxed);
        });

        assert!(ran.load(Ordering::Relaxed));
        assert!(pool.stats().caller_run() >= 1);
    }
}
