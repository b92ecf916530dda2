//! Bounded lock-free queue implementation.
//!
//! This module provides the FIFO queue used for every inter-stage hand-off
//! in the pipeline (§3, §4.1): a fixed-capacity, thread-safe queue with
//! non-blocking enqueue/dequeue built on the Michael-Scott lock-free queue
//! algorithm.
//!
//! # Key Features
//!
//! * Lock-free push and pop operations for high concurrency
//! * ABA problem prevention through atomic operations
//! * Capacity enforcement with non-blocking backpressure on enqueue
//! * Zero-allocation in the hot path for stable performance
//!
//! # Concurrency Safety
//!
//! * **Atomic Operations**: all shared state is updated using atomic operations
//!   to ensure thread safety without locks (`AtomicPtr`, `AtomicUsize`)
//! * **Interior Mutability**: `Node` uses an `UnsafeCell` to allow internal
//!   mutation while maintaining immutable references
//! * **Memory Reclamation**: node deallocation happens via `Box::from_raw`
//!   only after exclusive ownership of the node is established
//! * **Backpressure**: `try_enqueue` refuses once the queue is at capacity
//!   instead of blocking the caller

use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

mod node;
pub use node::Node;

use crate::error::queue::QueueError;

/// Default poll window used by [`BoundedQueue::try_dequeue`] (§4.1, §5: "~100 ms poll").
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// `BoundedQueue` is a lock-free concurrent FIFO queue with a fixed capacity.
///
/// # Type Parameters
///
/// * `T` - Type of items stored in the queue. Must be `Send + Sync`.
#[derive(Debug)]
pub struct BoundedQueue<T: Send + Sync> {
    /// Head pointer to the first node in the queue
    head: AtomicPtr<Node<T>>,

    /// Tail pointer to the last node in the queue
    tail: AtomicPtr<Node<T>>,

    /// Current number of items in the queue
    count: AtomicUsize,

    /// Maximum capacity of the queue
    capacity: usize,
}

impl<T: Send + Sync> BoundedQueue<T> {
    /// Creates a new empty `BoundedQueue` with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero — every queue in this system has a
    /// positive capacity (§3).
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be greater than 0");

        let sentinel = Box::new(Node::sentinel());
        let sentinel_ptr = Box::into_raw(sentinel);

        Self {
            head: AtomicPtr::new(sentinel_ptr),
            tail: AtomicPtr::new(sentinel_ptr),
            count: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Returns the current number of items in the queue.
    ///
    /// In a concurrent environment this value may be immediately outdated —
    /// it is an instantaneous snapshot (§4.1).
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns the queue's fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Returns whether the queue is at capacity.
    pub fn is_full(&self) -> bool {
        self.count() >= self.capacity
    }

    /// Attempts to enqueue an item. Never blocks.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the item was enqueued.
    /// * `Err(QueueError::Full)` if the queue is at capacity; the item is
    ///   returned to the caller is not retained by the queue (backpressure,
    ///   §4.1/§4.3).
    pub fn try_enqueue(&self, value: T) -> Result<(), QueueError> {
        // Reserve a capacity slot with its own CAS loop before touching the
        // tail at all, so two producers racing at `capacity - 1` can never
        // both read `count < capacity` and both append (§3, §4.1).
        let mut observed = self.count.load(Ordering::Acquire);
        loop {
            if observed >= self.capacity {
                return Err(QueueError::Full);
            }
            match self.count.compare_exchange_weak(
                observed,
                observed + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => observed = current,
            }
        }

        let new_node_ptr = Box::into_raw(Box::new(Node::new(value)));

        loop {
            let tail_ptr = self.tail.load(Ordering::Acquire);
            if tail_ptr.is_null() {
                // SAFETY: we still hold exclusive ownership of the unlinked node.
                unsafe {
                    drop(Box::from_raw(new_node_ptr));
                }
                self.count.fetch_sub(1, Ordering::AcqRel);
                return Err(QueueError::Full);
            }

            let tail = unsafe { &*tail_ptr };
            let tail_next_ptr = tail.next.load(Ordering::Acquire);

            if tail_ptr == self.tail.load(Ordering::Acquire) {
                if tail_next_ptr.is_null() {
                    match tail.next.compare_exchange(
                        std::ptr::null_mut(),
                        new_node_ptr,
                        Ordering::Release,
                        Ordering::Relaxed,
                    ) {
                        Ok(_) => {
                            let _ = self.tail.compare_exchange(
                                tail_ptr,
                                new_node_ptr,
                                Ordering::Release,
                                Ordering::Relaxed,
                            );
                            return Ok(());
                        }
                        Err(_) => continue,
                    }
                } else {
                    // Tail is lagging; help move it forward.
                    let _ = self.tail.compare_exchange(
                        tail_ptr,
                        tail_next_ptr,
                        Ordering::Release,
                        Ordering::Relaxed,
                    );
                }
            }

            std::hint::spin_loop();
        }
    }

    /// Attempts to dequeue an item immediately, without waiting.
    ///
    /// Returns `None` if the queue is empty at the moment of the attempt.
    pub fn pop(&self) -> Option<T> {
        loop {
            let head_ptr = self.head.load(Ordering::Acquire);
            if head_ptr.is_null() {
                return None;
            }

            let tail_ptr = self.tail.load(Ordering::Acquire);
            let head = unsafe { &*head_ptr };
            let next_ptr = head.next.load(Ordering::Acquire);

            if head_ptr == self.head.load(Ordering::Acquire) {
                if head_ptr == tail_ptr && next_ptr.is_null() {
                    return None;
                }

                if head_ptr == tail_ptr {
                    let _ = self.tail.compare_exchange(
                        tail_ptr,
                        next_ptr,
                        Ordering::Release,
                        Ordering::Relaxed,
                    );
                    continue;
                }

                if next_ptr.is_null() {
                    continue;
                }

                match self.head.compare_exchange(
                    head_ptr,
                    next_ptr,
                    Ordering::Release,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // SAFETY: compare_exchange succeeded, so this thread
                        // has exclusive ownership of both the old head node
                        // and the value cell of the node it now points head
                        // at; take() must not run before this CAS wins, or
                        // two racing poppers could call it on the same cell.
                        let value = unsafe { (*next_ptr).take() };
                        unsafe {
                            drop(Box::from_raw(head_ptr));
                        }

                        if value.is_some() {
                            self.count.fetch_sub(1, Ordering::Release);
                        }

                        return value;
                    }
                    Err(_) => continue,
                }
            }

            std::hint::spin_loop();
        }
    }

    /// Attempts to dequeue an item, polling for up to `timeout` before
    /// giving up (§4.1, §5: the ~100 ms dequeue poll wait).
    ///
    /// Pass `Duration::ZERO` to try exactly once without waiting.
    pub fn try_dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        if let Some(value) = self.pop() {
            return Some(value);
        }
        if timeout.is_zero() {
            return None;
        }

        let start = Instant::now();
        let mut backoff = 0u32;
        while start.elapsed() < timeout {
            if let Some(value) = self.pop() {
                return Some(value);
            }

            if backoff < 10 {
                for _ in 0..(1u32 << backoff) {
                    std::hint::spin_loop();
                }
            } else {
                std::thread::yield_now();
            }
            backoff = std::cmp::min(backoff + 1, 16);
        }

        None
    }

    /// Attempts to dequeue an item using the default ~100 ms poll window.
    pub fn try_dequeue(&self) -> Option<T> {
        self.try_dequeue_timeout(DEFAULT_POLL_TIMEOUT)
    }
}

impl<T: Send + Sync> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}

        let head_ptr = self.head.load(Ordering::Relaxed);
        if !head_ptr.is_null() {
            // SAFETY: we have exclusive ownership of the queue at drop time.
            unsafe {
                drop(Box::from_raw(head_ptr));
            }
        }
    }
}

// SAFETY: BoundedQueue<T> can be safely shared between threads when T is Send + Sync
unsafe impl<T: Send + Sync> Send for BoundedQueue<T> {}
unsafe impl<T: Send + Sync> Sync for BoundedQueue<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_basic_operations() {
        let queue = BoundedQueue::new(10);

        assert_eq!(queue.count(), 0);
        assert!(queue.is_empty());
        assert!(!queue.is_full());

        assert!(queue.try_enqueue(42).is_ok());
        assert_eq!(queue.count(), 1);
        assert!(!queue.is_empty());

        assert_eq!(queue.pop(), Some(42));
        assert_eq!(queue.count(), 0);
        assert!(queue.is_empty());

        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_backpressure() {
        let queue = BoundedQueue::new(2);

        assert!(queue.try_enqueue(1).is_ok());
        assert!(queue.try_enqueue(2).is_ok());
        assert_eq!(queue.try_enqueue(3), Err(QueueError::Full));

        assert_eq!(queue.pop(), Some(1));
        assert!(queue.try_enqueue(3).is_ok());

        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_try_dequeue_timeout() {
        let queue: BoundedQueue<i32> = BoundedQueue::new(10);

        let start = Instant::now();
        assert_eq!(queue.try_dequeue_timeout(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));

        queue.try_enqueue(7).unwrap();
        assert_eq!(queue.try_dequeue_timeout(Duration::from_millis(20)), Some(7));

        assert_eq!(queue.try_dequeue_timeout(Duration::ZERO), None);
    }

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::new(10);
        for i in 0..10 {
            assert!(queue.try_enqueue(i).is_ok());
        }
        for i in 0..10 {
            assert_eq!(queue.pop(), Some(i));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity_one_serializes() {
        let queue = Arc::new(BoundedQueue::new(1));
        assert!(queue.try_enqueue(1).is_ok());
        assert_eq!(queue.try_enqueue(2), Err(QueueError::Full));
        assert_eq!(queue.count(), 1);
        assert_eq!(queue.pop(), Some(1));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity_one_saturation_serializes_concurrent_producers() {
        const PRODUCERS: usize = 16;

        let queue = Arc::new(BoundedQueue::new(1));
        let mut handles = Vec::with_capacity(PRODUCERS);

        for p in 0..PRODUCERS {
            let q = Arc::clone(&queue);
            handles.push(thread::spawn(move || q.try_enqueue(p).is_ok()));
        }

        let successes: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(successes, 1);
        assert_eq!(queue.count(), 1);
    }

    #[test]
    fn test_concurrent_producers_and_consumers() {
        const PRODUCERS: usize = 4;
        const ITEMS_PER_PRODUCER: usize = 200;
        const TOTAL: usize = PRODUCERS * ITEMS_PER_PRODUCER;

        let queue = Arc::new(BoundedQueue::new(64));
        let mut handles = Vec::new();

        for p in 0..PRODUCERS {
            let q = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for i in 0..ITEMS_PER_PRODUCER {
                    let item = p * ITEMS_PER_PRODUCER + i;
                    while q.try_enqueue(item).is_err() {
                        thread::yield_now();
                    }
                }
            }));
        }

        let consumer_queue = Arc::clone(&queue);
        let consumer = thread::spawn(move || {
            let mut received = Vec::with_capacity(TOTAL);
            while received.len() < TOTAL {
                if let Some(item) = consumer_queue.try_dequeue_timeout(Duration::from_millis(50)) {
                    received.push(item);
                }
            }
            received
        });

        for handle in handles {
            handle.join().unwrap();
        }
        let mut received = consumer.join().unwrap();
        received.sort_unstable();

        let expected: Vec<usize> = (0..TOTAL).collect();
        assert_eq!(received, expected);
        assert!(queue.is_empty());
    }
}
