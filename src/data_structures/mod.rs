//! Data structures for the bubble-tea pipeline simulation.
//!
//! This module contains the concurrency primitives shared by every pipeline
//! stage. Implementations favor lock-free algorithms and cache-aware layout
//! over coarse locking, following the conventions of the rest of the crate.

pub mod bounded_queue;

pub use bounded_queue::BoundedQueue;
