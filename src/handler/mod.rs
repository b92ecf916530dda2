//! Handler stages (§4.4).
//!
//! Each stage is its own struct with the fields and logic it actually
//! needs; the engine spawns each concrete type's own `run` task directly
//! rather than going through shared dynamic dispatch — "a small capability
//! set … plus tagged variants for the stage-specific logic. No runtime
//! polymorphism beyond dispatch on variant" (§9).

mod base_preparation;
mod packaging;
mod quality_control;
mod tapioca_cooking;
mod toppings;

pub use base_preparation::BasePreparationHandler;
pub use packaging::PackagingHandler;
pub use quality_control::QualityControlHandler;
pub use tapioca_cooking::TapiocaCookingHandler;
pub use toppings::ToppingsHandler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::counters::CounterSet;
use crate::rng::WorkerRng;

/// A stop switch shared between a handler task and the engine, independent
/// of (but observed alongside) the shared cancellation token (§4.4, §9).
#[derive(Clone, Default)]
pub struct HandlerHandle {
    stopped: Arc<AtomicBool>,
}

impl HandlerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

/// Sleeps for `duration` but returns early (with `false`) if `token` fires.
/// Returns `true` if the sleep ran to completion uncancelled.
async fn cancellable_sleep(token: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

/// ~100ms idle sleep used when an input queue is momentarily empty (§4.4, §5).
const IDLE_SLEEP: Duration = Duration::from_millis(100);
