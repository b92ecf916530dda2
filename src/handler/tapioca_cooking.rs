//! TapiocaCooking stage (§4.4.2).
//!
//! Unlike every other handler this one does not consume orders: it is a
//! periodic admission-controlled replenisher for the shared tapioca pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::handlers::TapiocaCookingConfig;
use crate::counters::CounterSet;
use crate::resources::TapiocaPool;
use crate::rng::RngService;

use super::{cancellable_sleep, HandlerHandle};

/// Tick period of the admission-check loop (§4.4.2, §5).
const TICK: Duration = Duration::from_secs(1);

/// Replenishes the shared tapioca pool in admission-gated batches.
pub struct TapiocaCookingHandler {
    pub id: usize,
    config: TapiocaCookingConfig,
    pool: Arc<TapiocaPool>,
    counters: Arc<CounterSet>,
    rng_service: Arc<RngService>,
    batch_sequence: AtomicU64,
    cancellation: CancellationToken,
    handle: HandlerHandle,
}

impl TapiocaCookingHandler {
    pub fn new(
        id: usize,
        config: TapiocaCookingConfig,
        pool: Arc<TapiocaPool>,
        rng_service: Arc<RngService>,
        cancellation: CancellationToken,
    ) -> (Self, HandlerHandle) {
        let handle = HandlerHandle::new();
        let handler = Self {
            id,
            config,
            pool,
            counters: Arc::new(CounterSet::new()),
            rng_service,
            batch_sequence: AtomicU64::new(0),
            cancellation,
            handle: handle.clone(),
        };
        (handler, handle)
    }

    pub fn counters(&self) -> Arc<CounterSet> {
        self.counters.clone()
    }

    fn label(&self) -> String {
        format!("TapiocaCooking-{}", self.id)
    }

    /// `rng` samples no values of its own in the tick loop — it is only
    /// consulted for its time scale. Each spawned cooking batch derives its
    /// own independent stream from the shared RNG service, since batches
    /// run concurrently with the tick loop and with each other.
    pub async fn run(self, rng: crate::rng::WorkerRng) {
        let label = self.label();
        tracing::debug!(handler = %label, "starting");
        let handler_id = self.id as u64;
        let tick = rng.scale(TICK);

        loop {
            if self.handle.is_stopped() || self.cancellation.is_cancelled() {
                break;
            }

            if !cancellable_sleep(&self.cancellation, tick).await {
                break;
            }

            if self.handle.is_stopped() || self.cancellation.is_cancelled() {
                break;
            }

            if self.pool.is_low_stock() && self.pool.try_begin_cooking() {
                let sequence = self.batch_sequence.fetch_add(1, Ordering::Relaxed);
                let worker_id = handler_id
                    .wrapping_mul(1_000_003)
                    .wrapping_add(sequence);
                let batch_rng = self.rng_service.worker_rng(worker_id);

                let pool = self.pool.clone();
                let counters = self.counters.clone();
                let config = self.config.clone();
                let cancellation = self.cancellation.clone();
                let label = label.clone();

                tokio::spawn(Self::run_batch(
                    pool,
                    counters,
                    config,
                    cancellation,
                    batch_rng,
                    label,
                ));
            }
        }

        tracing::debug!(handler = %label, "stopped");
    }

    async fn run_batch(
        pool: Arc<TapiocaPool>,
        counters: Arc<CounterSet>,
        config: TapiocaCookingConfig,
        cancellation: CancellationToken,
        mut rng: crate::rng::WorkerRng,
        label: String,
    ) {
        let service_time = rng.duration_seconds(config.min_time, config.max_time);
        if cancellable_sleep(&cancellation, service_time).await {
            if rng.bernoulli(config.success_rate) {
                let mut brewed = 0;
                for _ in 0..3 {
                    if pool.try_replenish_one() {
                        brewed += 1;
                    }
                }
                if brewed > 0 {
                    counters.record_processed();
                }
                tracing::debug!(handler = %label, brewed, "cooking batch complete");
            } else {
                tracing::warn!(handler = %label, "cooking batch failed");
                counters.record_failed();
            }
        }

        pool.finish_cooking();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::handlers::TapiocaCookingConfig;

    #[tokio::test]
    async fn low_stock_triggers_a_cooking_batch() {
        let pool = Arc::new(TapiocaPool::new(15));
        pool.try_consume(10);
        assert!(pool.is_low_stock());

        let config = TapiocaCookingConfig {
            min_time: 0.0,
            max_time: 0.01,
            success_rate: 1.0,
        };
        let rng_service = Arc::new(RngService::new(1));
        let cancellation = CancellationToken::new();
        let (handler, handle) =
            TapiocaCookingHandler::new(0, config, pool.clone(), rng_service.clone(), cancellation);

        let task = tokio::spawn(handler.run(rng_service.worker_rng(99)));
        tokio::time::sleep(Duration::from_millis(1300)).await;
        handle.stop();
        let _ = tokio::time::timeout(Duration::from_secs(2), task).await;

        assert!(pool.count() > 0);
        assert_eq!(pool.concurrent_cooking(), 0);
    }

    #[tokio::test]
    async fn never_exceeds_max_concurrent_batches() {
        let pool = Arc::new(TapiocaPool::new(15));
        pool.try_consume(15);

        let config = TapiocaCookingConfig {
            min_time: 2.0,
            max_time: 2.0,
            success_rate: 1.0,
        };
        let rng_service = Arc::new(RngService::new(2));
        let cancellation = CancellationToken::new();
        let (handler, handle) =
            TapiocaCookingHandler::new(0, config, pool.clone(), rng_service.clone(), cancellation);

        let task = tokio::spawn(handler.run(rng_service.worker_rng(5)));
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(pool.concurrent_cooking() <= crate::resources::MAX_CONCURRENT_COOKING);
        handle.stop();
        let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
    }
}
