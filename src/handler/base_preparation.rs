//! BasePreparation stage (§4.4.1).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::handlers::BasePreparationConfig;
use crate::counters::CounterSet;
use crate::data_structures::BoundedQueue;
use crate::model::Order;
use crate::rng::WorkerRng;
use crate::signals::{Signal, SignalSender, Stage};

use super::{cancellable_sleep, HandlerHandle, IDLE_SLEEP};

/// First pipeline stage: prepares the base drink before toppings.
pub struct BasePreparationHandler {
    pub id: usize,
    config: BasePreparationConfig,
    input: Arc<BoundedQueue<Order>>,
    output: Arc<BoundedQueue<Order>>,
    counters: Arc<CounterSet>,
    signals: SignalSender,
    cancellation: CancellationToken,
    handle: HandlerHandle,
}

impl BasePreparationHandler {
    pub fn new(
        id: usize,
        config: BasePreparationConfig,
        input: Arc<BoundedQueue<Order>>,
        output: Arc<BoundedQueue<Order>>,
        signals: SignalSender,
        cancellation: CancellationToken,
    ) -> (Self, HandlerHandle) {
        let handle = HandlerHandle::new();
        let handler = Self {
            id,
            config,
            input,
            output,
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
        format!("BasePreparation-{}", self.id)
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

            let service_time = rng.duration_seconds(self.config.min_time, self.config.max_time);
            if !cancellable_sleep(&self.cancellation, service_time).await {
                break;
            }

            let id = order.id;
            let r = rng.uniform(0.0, 1.0);

            if r <= self.config.success_rate {
                if self.output.try_enqueue(order).is_ok() {
                    self.counters.record_processed();
                    let _ = self.signals.send(Signal::OrderCompleted(id, Stage::BasePreparation));
                } else {
                    tracing::warn!(handler = %label, order = %id, "failed to enqueue into preparation queue: downstream full");
                    self.counters.record_failed();
                    let _ = self.signals.send(Signal::OrderFailed(id, Stage::BasePreparation));
                }
            } else if r <= self.config.success_rate + self.config.recalibration_rate {
                if self.input.try_enqueue(order).is_ok() {
                    tracing::info!(handler = %label, order = %id, "recalibration: re-enqueued for another attempt");
                    self.counters.record_reworked();
                    let _ = self.signals.send(Signal::OrderReworked(id, Stage::BasePreparation));
                } else {
                    self.counters.record_failed();
                    let _ = self.signals.send(Signal::OrderFailed(id, Stage::BasePreparation));
                }
            } else {
                tracing::warn!(handler = %label, order = %id, "recipe error: order failed");
                self.counters.record_failed();
                let _ = self.signals.send(Signal::OrderFailed(id, Stage::BasePreparation));
            }
        }

        tracing::debug!(handler = %label, "stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::RngService;
    use crate::signals::signal_bus;

    fn make_handler(config: BasePreparationConfig) -> (BasePreparationHandler, HandlerHandle, Arc<BoundedQueue<Order>>, Arc<BoundedQueue<Order>>) {
        let input = Arc::new(BoundedQueue::new(10));
        let output = Arc::new(BoundedQueue::new(10));
        let (tx, _rx) = signal_bus();
        let (handler, handle) = BasePreparationHandler::new(
            0,
            config,
            input.clone(),
            output.clone(),
            tx,
            CancellationToken::new(),
        );
        (handler, handle, input, output)
    }

    #[tokio::test]
    async fn always_success_advances_every_order() {
        let config = BasePreparationConfig {
            min_time: 0.0,
            max_time: 0.0,
            success_rate: 1.0,
            recalibration_rate: 0.0,
        };
        let (handler, handle, input, output) = make_handler(config);
        let id_gen = crate::model::OrderIdGenerator::new();
        for _ in 0..5u64 {
            input
                .try_enqueue(crate::model::Order {
                    id: id_gen.next(),
                    complexity: crate::model::Complexity::MilkTea,
                    size: crate::model::Size::Small,
                    toppings_count: 0,
                    is_group_order: false,
                    quantity: 1,
                    has_student_discount: false,
                    creation_time: std::time::Instant::now(),
                })
                .unwrap();
        }

        let task = tokio::spawn(handler.run(RngService::new(1).worker_rng(0)));
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        handle.stop();
        let _ = tokio::time::timeout(std::time::Duration::from_secs(1), task).await;

        assert_eq!(output.count(), 5);
        assert_eq!(input.count(), 0);
    }
}
