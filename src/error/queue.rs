//! Bounded queue error module.
//!
//! This module defines the error type returned by non-blocking queue
//! operations. A full queue is an expected, transient condition handled by
//! callers (emitters drop, handlers mark the order failed) rather than an
//! exceptional one.

use thiserror::Error;

/// Errors that can occur during bounded queue operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue is at capacity; the item was not enqueued.
    #[error("queue is at capacity, backpressure applied")]
    Full,
}
