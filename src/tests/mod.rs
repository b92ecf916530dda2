//! Crate-internal test support.
//!
//! Most modules carry their own `#[cfg(test)] mod tests` alongside the code
//! they exercise; this module holds the handful of tests and fixtures that
//! cut across module boundaries (configuration loading, error reporting)
//! plus shared property-based test strategies.

pub mod config_tests;
pub mod test_utils;

pub use test_utils::{create_test_dir, duration_strategy, TestFixture};
