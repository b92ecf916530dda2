//! Bubble tea production pipeline simulator.
//!
//! A discrete-event, soft-real-time concurrent simulation of a multi-stage
//! production pipeline (§1): independent emitters inject orders into
//! bounded queues drained by pools of specialized handlers, a shared
//! tapioca resource pool is replenished under admission control, and the
//! [`engine`] supervises the whole lifecycle before handing the caller an
//! aggregated [`stats::Statistics`] report.
//!
//! The binary crate (`src/main.rs`) is a thin CLI shell around
//! [`engine::SimulationEngine`]; this library is where every non-trivial
//! invariant (queue capacity, order conservation, counter monotonicity,
//! coordinated shutdown) actually lives.

pub mod config;
pub mod counters;
pub mod data_structures;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod handler;
pub mod model;
pub mod report;
pub mod resources;
pub mod rng;
pub mod signals;
pub mod stats;

#[cfg(test)]
pub(crate) mod tests;

/// Crate version, exposed for startup logging and diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
