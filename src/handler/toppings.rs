//! Toppings stage (§4.4.3).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::handlers::ToppingsConfig;
use crate::counters::CounterSet;
use crate::data_structures::BoundedQueue;
use crate::model::{Complexity, Order};
use crate::resources::TapiocaPool;
use crate::rng::WorkerRng;
use crate::signals::{Signal, SignalSender, Stage};

use super::{cancellable_sleep, HandlerHandle, IDLE_SLEEP};

/// Backoff applied when an order is returned to the queue for lack of
/// tapioca stock (§4.4.3).
const TAPIOCA_WAIT_BACKOFF: Duration = Duration::from_secs(1);
/// Backoff applied on the missing-ingredients failure branch (§4.4.3).
const MISSING_INGREDIENTS_BACKOFF: Duration = Duration::from_secs(2);

/// Adds requested toppings, drawing tapioca portions from the shared pool.
pub struct ToppingsHandler {
    pub id: usize,
    config: ToppingsConfig,
    input: Arc<BoundedQueue<Order>>,
    output: Arc<BoundedQueue<Order>>,
    pool: Arc<TapiocaPool>,
    counters: Arc<CounterSet>,
    signals: SignalSender,
    cancellation: CancellationToken,
    handle: HandlerHandle,
}

impl ToppingsHandler {
    pub fn new(
        id: usize,
        config: ToppingsConfig,
        input: Arc<BoundedQueue<Order>>,
        output: Arc<BoundedQueue<Order>>,
        pool: Arc<TapiocaPool>,
        signals: SignalSender,
        cancellation: CancellationToken,
    ) -> (Self, HandlerHandle) {
        let handle = HandlerHandle::new();
        let handler = Self {
            id,
            config,
            input,
            output,
            pool,
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
        format!("Toppings-{}", self.id)
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
            let needed = order.toppings_count as usize;

            if needed > 0 && self.pool.count() < needed {
                tracing::debug!(handler = %label, order = %id, "waiting for tapioca stock");
                if self.input.try_enqueue(order).is_err() {
                    tracing::warn!(handler = %label, order = %id, "failed to re-enqueue while waiting for tapioca");
                    self.counters.record_failed();
                    let _ = self.signals.send(Signal::OrderFailed(id, Stage::Toppings));
                }
                if !cancellable_sleep(&self.cancellation, rng.scale(TAPIOCA_WAIT_BACKOFF)).await {
                    break;
                }
                continue;
            }

            if needed > 0 {
                // Best-effort; any token that fails to dequeue is not refunded later.
                self.pool.try_consume(needed as u32);
            }

            let complexity_multiplier = if matches!(order.complexity, Complexity::SpecialMenu) {
                1.5
            } else {
                1.0
            };
            let base_service_time = rng.uniform(self.config.min_time, self.config.max_time);
            let service_time = rng.scaled_duration_secs(base_service_time * complexity_multiplier);
            if !cancellable_sleep(&self.cancellation, service_time).await {
                break;
            }

            let r = rng.uniform(0.0, 1.0);

            if r <= self.config.success_rate {
                if self.output.try_enqueue(order).is_ok() {
                    self.counters.record_processed();
                    let _ = self.signals.send(Signal::OrderCompleted(id, Stage::Toppings));
                } else {
                    tracing::warn!(handler = %label, order = %id, "failed to enqueue into toppings queue: downstream full");
                    self.counters.record_failed();
                    let _ = self.signals.send(Signal::OrderFailed(id, Stage::Toppings));
                }
            } else if r <= self.config.success_rate + self.config.rework_rate {
                if self.input.try_enqueue(order).is_ok() {
                    self.counters.record_reworked();
                    let _ = self.signals.send(Signal::OrderReworked(id, Stage::Toppings));
                } else {
                    self.counters.record_failed();
                    let _ = self.signals.send(Signal::OrderFailed(id, Stage::Toppings));
                }
            } else {
                // Missing-ingredients branch: no counter change (§4.4.3).
                if self.input.try_enqueue(order).is_err() {
                    tracing::warn!(handler = %label, order = %id, "failed to re-enqueue after missing-ingredients backoff");
                    self.counters.record_failed();
                    let _ = self.signals.send(Signal::OrderFailed(id, Stage::Toppings));
                }
                if !cancellable_sleep(&self.cancellation, rng.scale(MISSING_INGREDIENTS_BACKOFF)).await {
                    break;
                }
            }
        }

        tracing::debug!(handler = %label, "stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderId, OrderIdGenerator, Size};
    use crate::rng::RngService;
    use crate::signals::signal_bus;

    fn order_with_toppings(id_gen: &OrderIdGenerator, toppings_count: u8) -> Order {
        Order {
            id: id_gen.next(),
            complexity: Complexity::MilkTea,
            size: Size::Small,
            toppings_count,
            is_group_order: false,
            quantity: 1,
            has_student_discount: false,
            creation_time: std::time::Instant::now(),
        }
    }

    #[tokio::test]
    async fn zero_toppings_never_waits_on_pool() {
        let input = Arc::new(BoundedQueue::new(10));
        let output = Arc::new(BoundedQueue::new(10));
        let pool = Arc::new(TapiocaPool::new(15));
        pool.try_consume(15); // pool now empty

        let id_gen = OrderIdGenerator::new();
        input.try_enqueue(order_with_toppings(&id_gen, 0)).unwrap();

        let config = ToppingsConfig {
            min_time: 0.0,
            max_time: 0.0,
            success_rate: 1.0,
            rework_rate: 0.0,
        };
        let (tx, _rx) = signal_bus();
        let (handler, handle) = ToppingsHandler::new(
            0,
            config,
            input.clone(),
            output.clone(),
            pool,
            tx,
            CancellationToken::new(),
        );

        let task = tokio::spawn(handler.run(RngService::new(1).worker_rng(0)));
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.stop();
        let _ = tokio::time::timeout(Duration::from_secs(1), task).await;

        assert_eq!(output.count(), 1);
    }

    #[test]
    fn tracks_order_id_not_lost_in_construction() {
        let id_gen = OrderIdGenerator::new();
        let order = order_with_toppings(&id_gen, 2);
        assert_eq!(order.toppings_count, 2);
        assert!(order.id.value() > 0);
    }
}
