//! Atomic per-handler counter set (§3, §5).
//!
//! Every handler instance owns a `CounterSet` tracking processed, failed,
//! and reworked orders. Counters are monotonically non-decreasing (§8) and
//! are read concurrently by the statistics aggregator while handlers keep
//! incrementing them, so every operation is a plain atomic with no locking.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically non-decreasing processed/failed/reworked counters.
#[derive(Debug, Default)]
pub struct CounterSet {
    processed: AtomicU64,
    failed: AtomicU64,
    reworked: AtomicU64,
}

impl CounterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reworked(&self) {
        self.reworked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn reworked(&self) -> u64 {
        self.reworked.load(Ordering::Relaxed)
    }

    /// Instantaneous snapshot of the three counters.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            processed: self.processed(),
            failed: self.failed(),
            reworked: self.reworked(),
        }
    }
}

/// Point-in-time copy of a [`CounterSet`], cheap to pass around.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub processed: u64,
    pub failed: u64,
    pub reworked: u64,
}

impl std::ops::Add for CounterSnapshot {
    type Output = CounterSnapshot;

    fn add(self, rhs: CounterSnapshot) -> CounterSnapshot {
        CounterSnapshot {
            processed: self.processed + rhs.processed,
            failed: self.failed + rhs.failed,
            reworked: self.reworked + rhs.reworked,
        }
    }
}
