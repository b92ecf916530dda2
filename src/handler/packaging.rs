//! Packaging stage (§4.4.5).
//!
//! The terminal stage: no failure branch, no downstream queue. Its
//! `OrderCompleted` signal is the only one that finalizes an order (§4.4).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::handlers::PackagingConfig;
use crate::counters::CounterSet;
use crate::data_structures::BoundedQueue;
use crate::model::Order;
use crate::rng::WorkerRng;
use crate::signals::{Signal, SignalSender, Stage};

use super::{cancellable_sleep, HandlerHandle, IDLE_SLEEP};

/// Boxes the finished drink. Always succeeds.
pub struct PackagingHandler {
    pub id: usize,
    config: PackagingConfig,
    input: Arc<BoundedQueue<Order>>,
    counters: Arc<CounterSet>,
    signals: SignalSender,
    cancellation: CancellationToken,
    handle: HandlerHandle,
}

impl PackagingHandler {
    pub fn new(
        id: usize,
        config: PackagingConfig,
        input: Arc<BoundedQueue<Order>>,
        signals: SignalSender,
        cancellation: CancellationToken,
    ) -> (Self, HandlerHandle) {
        let handle = HandlerHandle::new();
        let handler = Self {
            id,
            config,
            input,
            counters: Arc::new(CounterSet::new()),
            signals,
            cancellation,
            handle: handle.clone(),
        };
        (handler, handle)
    }

    pub fn counters(&self) -> Arc<CounterSet> {
        self.counters.clone()
    }

    fn label(&self) -> String {
        format!("Packaging-{}", self.id)
    }

    pub async fn run(self, mut rng: WorkerRng) {
        let label = self.label();
        tracing::debug!(handler = %label, "starting");

        loop {
            if self.handle.is_stopped() || self.cancellation.is_cancelled() {
                break;
            }

            let order = match self.input.try_dequeue() {
                Some(order) => order,
                None => {
                    if !cancellable_sleep(&self.cancellation, rng.scale(IDLE_SLEEP)).await {
                        break;
                    }
                    continue;
                }
            };

            let id = order.id;
            let base_time = rng.uniform(self.config.min_time, self.config.max_time);
            let multiplier = if self.config.apply_size_multiplier {
                order.size.packaging_multiplier()
            } else {
                1.0
            };
            let service_time = rng.scaled_duration_secs(base_time * multiplier);
            if !cancellable_sleep(&self.cancellation, service_time).await {
                break;
            }

            self.counters.record_processed();
            let _ = self.signals.send(Signal::OrderCompleted(id, Stage::Packaging));
        }

        tracing::debug!(handler = %label, "stopped");
    }
}
