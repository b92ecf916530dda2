//! QualityControl stage (§4.4.4).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::handlers::QualityControlConfig;
use crate::counters::CounterSet;
use crate::data_structures::BoundedQueue;
use crate::model::Order;
use crate::rng::WorkerRng;
use crate::signals::{Signal, SignalSender, Stage};

use super::{cancellable_sleep, HandlerHandle, IDLE_SLEEP};

/// Rework penalty applied on a minor-defect re-check (§4.4.4).
const MINOR_DEFECT_PENALTY: Duration = Duration::from_secs(15);

/// Inspects an order before packaging, reworking or failing it on defects.
pub struct QualityControlHandler {
    pub id: usize,
    config: QualityControlConfig,
    input: Arc<BoundedQueue<Order>>,
    output: Arc<BoundedQueue<Order>>,
    counters: Arc<CounterSet>,
    signals: SignalSender,
    cancellation: CancellationToken,
    handle: HandlerHandle,
}

impl QualityControlHandler {
    pub fn new(
        id: usize,
        config: QualityControlConfig,
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
        format!("QualityControl-{}", self.id)
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
            let service_time = rng.duration_seconds(self.config.min_time, self.config.max_time);
            if !cancellable_sleep(&self.cancellation, service_time).await {
                break;
            }

            let r = rng.uniform(0.0, 1.0);

            if r <= self.config.success_rate {
                if self.output.try_enqueue(order).is_ok() {
                    self.counters.record_processed();
                    let _ = self.signals.send(Signal::OrderCompleted(id, Stage::QualityControl));
                } else {
                    tracing::warn!(handler = %label, order = %id, "failed to enqueue into quality queue: downstream full");
                    self.counters.record_failed();
                    let _ = self.signals.send(Signal::OrderFailed(id, Stage::QualityControl));
                }
            } else if r <= self.config.success_rate + self.config.minor_defect_rate {
                if !cancellable_sleep(&self.cancellation, rng.scale(MINOR_DEFECT_PENALTY)).await {
                    break;
                }
                if self.input.try_enqueue(order).is_ok() {
                    tracing::info!(handler = %label, order = %id, "minor defect: reworking");
                    self.counters.record_reworked();
                    let _ = self.signals.send(Signal::OrderReworked(id, Stage::QualityControl));
                } else {
                    self.counters.record_failed();
                    let _ = self.signals.send(Signal::OrderFailed(id, Stage::QualityControl));
                }
            } else {
                tracing::warn!(handler = %label, order = %id, "critical defect: order failed");
                self.counters.record_failed();
                let _ = self.signals.send(Signal::OrderFailed(id, Stage::QualityControl));
            }
        }

        tracing::debug!(handler = %label, "stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Complexity, OrderIdGenerator, Size};
    use crate::rng::RngService;
    use crate::signals::signal_bus;

    fn bare_order(id_gen: &OrderIdGenerator) -> Order {
        Order {
            id: id_gen.next(),
            complexity: Complexity::MilkTea,
            size: Size::Small,
            toppings_count: 0,
            is_group_order: false,
            quantity: 1,
            has_student_discount: false,
            creation_time: std::time::Instant::now(),
        }
    }

    #[tokio::test]
    async fn critical_defect_fails_without_advancing() {
        let input = Arc::new(BoundedQueue::new(10));
        let output = Arc::new(BoundedQueue::new(10));
        let id_gen = OrderIdGenerator::new();
        input.try_enqueue(bare_order(&id_gen)).unwrap();

        let config = QualityControlConfig {
            min_time: 0.0,
            max_time: 0.0,
            success_rate: 0.0,
            minor_defect_rate: 0.0,
        };
        let (tx, mut rx) = signal_bus();
        let (handler, handle) = QualityControlHandler::new(
            0,
            config,
            input.clone(),
            output.clone(),
            tx,
            CancellationToken::new(),
        );

        let task = tokio::spawn(handler.run(RngService::new(1).worker_rng(0)));
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop();
        let _ = tokio::time::timeout(Duration::from_secs(1), task).await;

        assert_eq!(output.count(), 0);
        assert!(matches!(rx.try_recv(), Ok(Signal::OrderFailed(_, Stage::QualityControl))));
    }
}
