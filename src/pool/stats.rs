//! Pool execution counters

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Execution counters for a worker pool.
///
/// Counters are monotonic and updated with relaxed atomics: read them as
/// approximations while the pool is running and as exact values once
/// `shutdown` has returned.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Tasks handed to `submit`
    submitted: AtomicU64,

    /// Tasks that were invoked (on a worker or on the caller)
    executed: AtomicU64,

    /// Subset of executed tasks run on the submitting thread
    caller_run: AtomicU64,

    /// Subset of executed tasks that panicked
    panicked: AtomicU64,

    /// Tasks dropped from the queue at shutdown without running
    discarded: AtomicU64,
}

impl PoolStats {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_caller_run(&self) {
        self.caller_run.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_discarded(&self, n: u64) {
        self.discarded.fetch_add(n, Ordering::Relaxed);
    }

    /// Tasks handed to `submit`
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Tasks that were invoked, on a worker or on the caller
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    /// Tasks run synchronously on the submitting thread
    pub fn caller_run(&self) -> u64 {
        self.caller_run.load(Ordering::Relaxed)
    }

    /// Tasks that panicked while running
    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    /// Tasks discarded from the queue at shutdown
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Get a point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.submitted(),
            executed: self.executed(),
            caller_run: self.caller_run(),
            panicked: self.panicked(),
            discarded: self.discarded(),
        }
    }
}

/// Stats snapshot for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub executed: u64,
    pub caller_run: u64,
    pub panicked: u64,
    pub discarded: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pool Statistics:")?;
        writeln!(f, "  Submitted:   {}", self.submitted)?;
        writeln!(f, "  Executed:    {}", self.executed)?;
        writeln!(f, "  Caller-run:  {}", self.caller_run)?;
        writeln!(f, "  Panicked:    {}", self.panicked)?;
        writeln!(f, "  Discarded:   {}", self.discarded)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats: PoolStats = PoolStats::default();

        stats.record_submitted();
        stats.record_submitted();
        stats.record_executed();
        stats.record_caller_run();
        stats.record_discarded(3);

        assert_eq!(stats.submitted(), 2);
        assert_eq!(stats.executed(), 1);
        assert_eq!(stats.caller_run(), 1);
        assert_eq!(stats.panicked(), 0);
        assert_eq!(stats.discarded(), 3);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let stats: PoolStats = PoolStats::default();
        stats.record_submitted();
        stats.record_executed();

        let snapshot: StatsSnapshot = stats.snapshot();
        assert_eq!(snapshot.submitted, 1);
        assert_eq!(snapshot.executed, 1);

        let rendered: String = snapshot.to_string();
        assert!(rendered.contains("Submitted:   1"));
    }
}
