//! Shared tapioca resource pool (§3, §4.4.2, §5).
//!
//! The pool is a bounded queue of abstract tapioca-portion tokens plus an
//! admission gate (`concurrent_cooking`) bounding how many cooking batches
//! may be in flight at once. Toppings handlers drain tokens; TapiocaCooking
//! handlers replenish them through the gate.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::data_structures::BoundedQueue;

/// Ceiling on simultaneously in-flight cooking batches (§3).
pub const MAX_CONCURRENT_COOKING: usize = 3;

/// Stock level at or below which the pool is considered low (§3).
pub const LOW_STOCK_THRESHOLD: usize = 5;

/// Tokens seeded into the pool at startup, clamped to capacity (§3, §9).
pub const INITIAL_TAPIOCA_UNITS: usize = 10;

/// The shared, replenishable tapioca token buffer plus its cooking
/// admission gate.
#[derive(Debug)]
pub struct TapiocaPool {
    tokens: BoundedQueue<()>,
    concurrent_cooking: AtomicUsize,
}

impl TapiocaPool {
    /// Creates a pool with the given capacity, pre-seeded with
    /// `min(INITIAL_TAPIOCA_UNITS, capacity)` tokens. Any excess seed
    /// tokens beyond capacity are silently not enqueued (§9).
    pub fn new(capacity: usize) -> Self {
        let tokens = BoundedQueue::new(capacity);
        for _ in 0..INITIAL_TAPIOCA_UNITS.min(capacity) {
            let _ = tokens.try_enqueue(());
        }
        Self {
            tokens,
            concurrent_cooking: AtomicUsize::new(0),
        }
    }

    /// Current token count. An instantaneous snapshot (§3).
    pub fn count(&self) -> usize {
        self.tokens.count()
    }

    /// Fixed queue capacity.
    pub fn capacity(&self) -> usize {
        self.tokens.capacity()
    }

    /// Whether stock is at or below [`LOW_STOCK_THRESHOLD`].
    pub fn is_low_stock(&self) -> bool {
        self.count() <= LOW_STOCK_THRESHOLD
    }

    /// Current number of in-flight cooking batches.
    pub fn concurrent_cooking(&self) -> usize {
        self.concurrent_cooking.load(Ordering::Acquire)
    }

    /// Attempts to reserve one cooking-batch slot under
    /// [`MAX_CONCURRENT_COOKING`], via a CAS spin rather than a lock (§5).
    /// Returns `true` if a slot was acquired; the caller must eventually
    /// call [`TapiocaPool::finish_cooking`].
    pub fn try_begin_cooking(&self) -> bool {
        let mut current = self.concurrent_cooking.load(Ordering::Acquire);
        loop {
            if current >= MAX_CONCURRENT_COOKING {
                return false;
            }
            match self.concurrent_cooking.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }

    /// Releases a cooking-batch slot previously acquired with
    /// [`TapiocaPool::try_begin_cooking`].
    pub fn finish_cooking(&self) {
        self.concurrent_cooking.fetch_sub(1, Ordering::AcqRel);
    }

    /// Attempts to enqueue one replenished token. Returns `false` if the
    /// pool is already at capacity; callers treat that as a silently
    /// dropped token, not an error (§4.4.2).
    pub fn try_replenish_one(&self) -> bool {
        self.tokens.try_enqueue(()).is_ok()
    }

    /// Best-effort dequeue of up to `count` tokens. Returns the number
    /// actually removed; a token that fails to dequeue is simply not
    /// counted, matching the Toppings stage's lazy consumption (§4.4.3).
    pub fn try_consume(&self, count: u32) -> u32 {
        let mut consumed = 0;
        for _ in 0..count {
            if self.tokens.pop().is_some() {
                consumed += 1;
            } else {
                break;
            }
        }
        consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_initial_units_clamped_to_capacity() {
        let roomy = TapiocaPool::new(15);
        assert_eq!(roomy.count(), INITIAL_TAPIOCA_UNITS);

        let cramped = TapiocaPool::new(3);
        assert_eq!(cramped.count(), 3);
    }

    #[test]
    fn low_stock_threshold_is_inclusive() {
        let pool = TapiocaPool::new(15);
        assert!(!pool.is_low_stock());
        pool.try_consume(5);
        assert!(pool.is_low_stock());
    }

    #[test]
    fn consume_is_best_effort_and_never_underflows() {
        let pool = TapiocaPool::new(15);
        let consumed = pool.try_consume(100);
        assert_eq!(consumed, INITIAL_TAPIOCA_UNITS as u32);
        assert_eq!(pool.count(), 0);
        assert_eq!(pool.try_consume(1), 0);
    }

    #[test]
    fn cooking_gate_never_exceeds_max_concurrent() {
        let pool = TapiocaPool::new(15);
        for _ in 0..MAX_CONCURRENT_COOKING {
            assert!(pool.try_begin_cooking());
        }
        assert!(!pool.try_begin_cooking());
        assert_eq!(pool.concurrent_cooking(), MAX_CONCURRENT_COOKING);

        pool.finish_cooking();
        assert!(pool.try_begin_cooking());
    }

    #[test]
    fn replenish_respects_capacity() {
        let pool = TapiocaPool::new(INITIAL_TAPIOCA_UNITS);
        assert!(!pool.try_replenish_one());
        pool.try_consume(1);
        assert!(pool.try_replenish_one());
    }
}
