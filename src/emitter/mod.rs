//! Order emitters (§4.3).
//!
//! `Emitter` is a single value type with an internal `EmitterKind` tag
//! rather than a trait object hierarchy — "a small capability set plus
//! tagged variants for stage-specific logic" (§9). `Regular` and `Group`
//! only differ in how they stamp an order's quantity/discount and which
//! interval parameters they sample from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::EmitterConfig;
use crate::data_structures::BoundedQueue;
use crate::model::{Complexity, Order, OrderIdGenerator, Size};
use crate::rng::WorkerRng;
use crate::signals::{Signal, SignalSender};

/// Minimum inter-arrival time for regular orders, seconds (§4.3).
pub const REGULAR_INTERVAL_FLOOR: f64 = 0.5;
/// Minimum inter-arrival time for group orders, seconds (§4.3).
pub const GROUP_INTERVAL_FLOOR: f64 = 1.0;

/// Which emitter variant this instance behaves as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitterKind {
    Regular,
    Group,
}

/// A handle used by the engine to request an emitter stop, independent of
/// and in addition to the shared cancellation token (§4.3, §9).
#[derive(Clone)]
pub struct EmitterHandle {
    stopped: Arc<AtomicBool>,
}

impl EmitterHandle {
    /// Sets the running flag to false. The emitter observes this at the
    /// top of its next loop iteration and exits promptly from any
    /// in-progress sleep via the cancellation token.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }
}

/// A periodic order source (§4.3).
pub struct Emitter {
    pub id: usize,
    kind: EmitterKind,
    config: EmitterConfig,
    queue: Arc<BoundedQueue<Order>>,
    id_gen: Arc<OrderIdGenerator>,
    signals: SignalSender,
    cancellation: CancellationToken,
    stopped: Arc<AtomicBool>,
}

impl Emitter {
    pub fn new(
        id: usize,
        kind: EmitterKind,
        config: EmitterConfig,
        queue: Arc<BoundedQueue<Order>>,
        id_gen: Arc<OrderIdGenerator>,
        signals: SignalSender,
        cancellation: CancellationToken,
    ) -> (Self, EmitterHandle) {
        let stopped = Arc::new(AtomicBool::new(false));
        let handle = EmitterHandle {
            stopped: stopped.clone(),
        };
        let emitter = Self {
            id,
            kind,
            config,
            queue,
            id_gen,
            signals,
            cancellation,
            stopped,
        };
        (emitter, handle)
    }

    pub fn kind(&self) -> EmitterKind {
        self.kind
    }

    fn label(&self) -> String {
        match self.kind {
            EmitterKind::Regular => format!("RegularEmitter-{}", self.id),
            EmitterKind::Group => format!("GroupEmitter-{}", self.id),
        }
    }

    fn sample_interval_seconds(&self, rng: &mut WorkerRng) -> f64 {
        match self.kind {
            EmitterKind::Regular => {
                let s = rng.normal(
                    self.config.regular_order_interval_mean,
                    self.config.regular_order_interval_deviation,
                );
                s.max(REGULAR_INTERVAL_FLOOR)
            }
            EmitterKind::Group => {
                let s = rng.normal(
                    self.config.group_order_interval_mean,
                    self.config.group_order_interval_deviation,
                );
                s.max(GROUP_INTERVAL_FLOOR)
            }
        }
    }

    fn construct_order(&self, rng: &mut WorkerRng) -> Order {
        let complexity = *rng.choice(&Complexity::ALL);
        let size = *rng.choice(&Size::ALL);
        let toppings_count = rng.int_range(0, 3) as u8;

        let (is_group_order, quantity, has_student_discount) = match self.kind {
            EmitterKind::Regular => (false, 1, false),
            EmitterKind::Group => {
                let quantity = rng.int_range(2, 5) as u32;
                let discount = rng.bernoulli(0.5);
                (true, quantity, discount)
            }
        };

        Order {
            id: self.id_gen.next(),
            complexity,
            size,
            toppings_count,
            is_group_order,
            quantity,
            has_student_discount,
            creation_time: Instant::now(),
        }
    }

    /// Runs the emitter loop until stopped or cancelled (§4.3).
    ///
    /// Exits promptly when the shared cancellation token fires, even mid-sleep.
    pub async fn run(self, mut rng: WorkerRng) {
        let label = self.label();
        tracing::debug!(emitter = %label, "starting");

        loop {
            if self.stopped.load(Ordering::Acquire) || self.cancellation.is_cancelled() {
                break;
            }

            let interval = self.sample_interval_seconds(&mut rng);
            tokio::select! {
                _ = self.cancellation.cancelled() => break,
                _ = tokio::time::sleep(rng.scaled_duration_secs(interval)) => {}
            }

            if self.stopped.load(Ordering::Acquire) || self.cancellation.is_cancelled() {
                break;
            }

            let order = self.construct_order(&mut rng);
            let id = order.id;

            // Publish OrderGenerated before enqueue so the engine can stamp
            // startTime and register the order before any downstream stage
            // could possibly observe it (§4.3, §9).
            if self.signals.send(Signal::OrderGenerated(id)).is_err() {
                break;
            }

            if self.queue.try_enqueue(order).is_err() {
                tracing::warn!(emitter = %label, order = %id, "failed to enqueue: order queue full, dropping order");
            }
        }

        tracing::debug!(emitter = %label, "stopped");
    }
}
