//! # ringpool
//!
//! Concurrent in-memory queues and a queue-backed worker pool for
//! high-throughput, low-latency task dispatch on shared-memory multicore
//! hardware.
//!
//! ## Features
//!
//! - Wait-free SPSC ring for hand-offs between exactly two threads
//! - Lock-free bounded MPMC queue (per-slot sequence counters)
//! - Bounded worker pool with caller-runs backpressure
//! - Cache-aware memory layout, zero allocations on queue hot paths
//!
//! ## Quick Start
//!
//! ```
//! use ringpool::{PoolConfig, ThreadPool};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! let pool = ThreadPool::new(PoolConfig::simple(4, 256))?;
//!
//! let counter = Arc::new(AtomicU64::new(0));
//! for _ in 0..100 {
//!     let counter = Arc::clone(&counter);
//!     pool.submit(move || {
//!         counter.fetch_add(1, Ordering::Relaxed);
//!     });
//! }
//!
//! pool.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod pool;
pub mod queue;

// Re-exports
pub use pool::{FullQueuePolicy, PoolConfig, PoolStats, Semaphore, StatsSnapshot, ThreadPool};
pub use queue::{BlockingQueue, MpmcQueue, SpscRing};

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Thread spawn error: {0}")]
    Spawn(#[from] std::io::Error),
}
