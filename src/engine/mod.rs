//! Simulation engine (§4.5).
//!
//! Owns every queue, emitter, handler, and the tapioca pool; supervises
//! their concurrent lifecycles; drains the signal bus into the
//! active-orders map, completed/failed bags, and rework counter; enforces
//! the wall-clock deadline; and runs the coordinated shutdown sequence
//! before handing the final snapshot to [`crate::stats::aggregate`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::counters::{CounterSet, CounterSnapshot};
use crate::data_structures::BoundedQueue;
use crate::emitter::{Emitter, EmitterHandle, EmitterKind};
use crate::handler::{
    BasePreparationHandler, HandlerHandle, PackagingHandler, QualityControlHandler,
    TapiocaCookingHandler, ToppingsHandler,
};
use crate::model::{Order, OrderId, OrderIdGenerator};
use crate::resources::TapiocaPool;
use crate::rng::RngService;
use crate::signals::{signal_bus, Signal, Stage};
use crate::stats::{aggregate, EngineSnapshot, QueueLengths, Statistics};

/// Grace period allotted for worker tasks to join after cancellation (§4.5, §5).
const JOIN_GRACE: Duration = Duration::from_secs(5);
/// Fixed window after join during which final completion signals are allowed to flush (§4.5, §5).
const DRAIN_WINDOW: Duration = Duration::from_secs(2);
/// Monitoring tick period (§5).
const MONITOR_TICK: Duration = Duration::from_secs(10);
/// Number of monitor ticks between progress log lines (30s, §5).
const MONITOR_TICKS_PER_PROGRESS: u64 = 3;
/// Poll interval used while draining the signal bus after shutdown.
const SIGNAL_DRAIN_POLL: Duration = Duration::from_millis(50);

/// Compresses a fixed wall-clock duration by `time_scale` (§5, §9 — the
/// same compression [`crate::rng::WorkerRng::scale`] applies to
/// handler/emitter timings, applied here to the engine's own constants).
fn scale_duration(duration: Duration, time_scale: f64) -> Duration {
    Duration::from_secs_f64(duration.as_secs_f64() / time_scale)
}

/// Engine-side bookkeeping driven entirely by the signal bus (§3 "Engine
/// tracking", §4.5 signal wiring). Every field here is exactly the state
/// the engine itself is responsible for — nothing handler-internal
/// leaks in, since handlers already own their own [`CounterSet`].
struct Tracking {
    generated: AtomicU64,
    failed: AtomicU64,
    rework_events: AtomicU64,
    /// ID -> pipeline start time, for in-flight orders (§3, §4.5).
    active: DashMap<OrderId, Instant>,
    /// Processing times of orders that finished Packaging (§3, §4.6).
    completed: Mutex<Vec<Duration>>,
}

impl Tracking {
    fn new() -> Self {
        Self {
            generated: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rework_events: AtomicU64::new(0),
            active: DashMap::new(),
            completed: Mutex::new(Vec::new()),
        }
    }

    fn apply(&self, signal: Signal) {
        match signal {
            Signal::OrderGenerated(id) => {
                self.generated.fetch_add(1, Ordering::Relaxed);
                self.active.insert(id, Instant::now());
            }
            Signal::OrderCompleted(id, Stage::Packaging) => {
                if let Some((_, start)) = self.active.remove(&id) {
                    let elapsed = Instant::now().saturating_duration_since(start);
                    self.completed.lock().push(elapsed);
                    tracing::info!(order = %id, seconds = elapsed.as_secs_f64(), "order completed");
                }
            }
            Signal::OrderCompleted(..) => {
                // Stage advance short of Packaging; the per-handler counter
                // already recorded this and the order stays in-flight.
            }
            Signal::OrderFailed(id, stage) => {
                self.active.remove(&id);
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(order = %id, stage = stage.name(), "order failed");
            }
            Signal::OrderReworked(id, stage) => {
                self.rework_events.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(order = %id, stage = stage.name(), "order reworked");
            }
        }
    }

    fn generated(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    fn rework_events(&self) -> u64 {
        self.rework_events.load(Ordering::Relaxed)
    }

    fn in_flight(&self) -> usize {
        self.active.len()
    }

    fn completed_count(&self) -> usize {
        self.completed.lock().len()
    }
}

/// Every bounded queue wired between stages, plus the tapioca pool (§2, §3).
struct Queues {
    order: Arc<BoundedQueue<Order>>,
    preparation: Arc<BoundedQueue<Order>>,
    toppings: Arc<BoundedQueue<Order>>,
    quality: Arc<BoundedQueue<Order>>,
    tapioca: Arc<TapiocaPool>,
}

impl Queues {
    fn new(config: &crate::config::QueuesConfig) -> Self {
        Self {
            order: Arc::new(BoundedQueue::new(config.order_queue_capacity)),
            preparation: Arc::new(BoundedQueue::new(config.ready_queue_capacity)),
            toppings: Arc::new(BoundedQueue::new(config.ready_queue_capacity)),
            quality: Arc::new(BoundedQueue::new(config.ready_queue_capacity)),
            tapioca: Arc::new(TapiocaPool::new(config.tapioca_queue_capacity)),
        }
    }

    fn lengths(&self) -> QueueLengths {
        QueueLengths {
            order_queue: self.order.count(),
            preparation_queue: self.preparation.count(),
            toppings_queue: self.toppings.count(),
            quality_queue: self.quality.count(),
            tapioca_pool: self.tapioca.count(),
        }
    }
}

/// Per-instance counters collected before each handler's `run` consumes it,
/// kept so the final report can sum processed/failed/reworked per stage
/// across however many instances that stage was configured with (§4.6).
#[derive(Default)]
struct StageCounters {
    base_preparation: Vec<Arc<CounterSet>>,
    tapioca_cooking: Vec<Arc<CounterSet>>,
    toppings: Vec<Arc<CounterSet>>,
    quality_control: Vec<Arc<CounterSet>>,
    packaging: Vec<Arc<CounterSet>>,
}

fn sum(counters: &[Arc<CounterSet>]) -> CounterSnapshot {
    counters
        .iter()
        .fold(CounterSnapshot::default(), |acc, c| acc + c.snapshot())
}

/// Supervises one full simulation run end to end (§4.5).
pub struct SimulationEngine {
    config: PipelineConfig,
    master_seed: u64,
}

impl SimulationEngine {
    /// Builds an engine over a validated configuration, rooting every
    /// worker's RNG stream at `master_seed` (§4.2, §9: explicit per-worker
    /// streams in place of thread-local state, so a given seed reproduces
    /// the same sampling sequence across runs).
    pub fn new(config: PipelineConfig, master_seed: u64) -> Self {
        Self {
            config,
            master_seed,
        }
    }

    /// Constructs every queue, emitter, and handler; runs them concurrently
    /// until the configured duration elapses; shuts the pipeline down
    /// cleanly; and returns the aggregated [`Statistics`] (§4.5, §4.6).
    pub async fn run(self) -> Statistics {
        let cancellation = CancellationToken::new();
        let time_scale = self.config.time_scale;
        let rng_service = Arc::new(RngService::with_time_scale(self.master_seed, time_scale));
        let id_gen = Arc::new(OrderIdGenerator::new());
        let queues = Queues::new(&self.config.queues);
        let (signal_tx, mut signal_rx) = signal_bus();
        let tracking = Arc::new(Tracking::new());
        let mut worker_id: u64 = 0;

        let mut emitter_tasks = Vec::new();
        let mut emitter_handles: Vec<EmitterHandle> = Vec::new();

        for i in 0..self.config.regular_emitter_count {
            let (emitter, handle) = Emitter::new(
                i,
                EmitterKind::Regular,
                self.config.emitter.clone(),
                queues.order.clone(),
                id_gen.clone(),
                signal_tx.clone(),
                cancellation.clone(),
            );
            let rng = rng_service.worker_rng(worker_id);
            worker_id += 1;
            emitter_handles.push(handle);
            emitter_tasks.push(tokio::spawn(emitter.run(rng)));
        }

        for i in 0..self.config.group_emitter_count {
            let (emitter, handle) = Emitter::new(
                i,
                EmitterKind::Group,
                self.config.emitter.clone(),
                queues.order.clone(),
                id_gen.clone(),
                signal_tx.clone(),
                cancellation.clone(),
            );
            let rng = rng_service.worker_rng(worker_id);
            worker_id += 1;
            emitter_handles.push(handle);
            emitter_tasks.push(tokio::spawn(emitter.run(rng)));
        }

        let mut handler_tasks = Vec::new();
        let mut handler_handles: Vec<HandlerHandle> = Vec::new();
        let mut stage_counters = StageCounters::default();

        for i in 0..self.config.base_preparation_handlers {
            let (handler, handle) = BasePreparationHandler::new(
                i,
                self.config.handlers.base_preparation.clone(),
                queues.order.clone(),
                queues.preparation.clone(),
                signal_tx.clone(),
                cancellation.clone(),
            );
            stage_counters.base_preparation.push(handler.counters());
            let rng = rng_service.worker_rng(worker_id);
            worker_id += 1;
            handler_handles.push(handle);
            handler_tasks.push(tokio::spawn(handler.run(rng)));
        }

        // Only one TapiocaCooking instance actually needs to observe the
        // pool; extra instances simply race harmlessly on the same
        // admission gate (§9). Every configured instance is still spawned
        // to honor the operator's worker-count intent.
        for i in 0..self.config.tapioca_cooking_handlers {
            let (handler, handle) = TapiocaCookingHandler::new(
                i,
                self.config.handlers.tapioca_cooking.clone(),
                queues.tapioca.clone(),
                rng_service.clone(),
                cancellation.clone(),
            );
            stage_counters.tapioca_cooking.push(handler.counters());
            let rng = rng_service.worker_rng(worker_id);
            worker_id += 1;
            handler_handles.push(handle);
            handler_tasks.push(tokio::spawn(handler.run(rng)));
        }

        for i in 0..self.config.toppings_handlers {
            let (handler, handle) = ToppingsHandler::new(
                i,
                self.config.handlers.toppings.clone(),
                queues.preparation.clone(),
                queues.toppings.clone(),
                queues.tapioca.clone(),
                signal_tx.clone(),
                cancellation.clone(),
            );
            stage_counters.toppings.push(handler.counters());
            let rng = rng_service.worker_rng(worker_id);
            worker_id += 1;
            handler_handles.push(handle);
            handler_tasks.push(tokio::spawn(handler.run(rng)));
        }

        for i in 0..self.config.quality_control_handlers {
            let (handler, handle) = QualityControlHandler::new(
                i,
                self.config.handlers.quality_control.clone(),
                queues.toppings.clone(),
                queues.quality.clone(),
                signal_tx.clone(),
                cancellation.clone(),
            );
            stage_counters.quality_control.push(handler.counters());
            let rng = rng_service.worker_rng(worker_id);
            worker_id += 1;
            handler_handles.push(handle);
            handler_tasks.push(tokio::spawn(handler.run(rng)));
        }

        for i in 0..self.config.packaging_handlers {
            let (handler, handle) = PackagingHandler::new(
                i,
                self.config.handlers.packaging.clone(),
                queues.quality.clone(),
                signal_tx.clone(),
                cancellation.clone(),
            );
            stage_counters.packaging.push(handler.counters());
            let rng = rng_service.worker_rng(worker_id);
            worker_id += 1;
            handler_handles.push(handle);
            handler_tasks.push(tokio::spawn(handler.run(rng)));
        }

        // Drop the engine's own sender so the signal channel closes once
        // every worker holding a clone has exited.
        drop(signal_tx);

        let signal_drain_stop = Arc::new(AtomicBool::new(false));
        let signal_task = {
            let tracking = tracking.clone();
            let stop = signal_drain_stop.clone();
            tokio::spawn(async move {
                loop {
                    match tokio::time::timeout(SIGNAL_DRAIN_POLL, signal_rx.recv()).await {
                        Ok(Some(signal)) => tracking.apply(signal),
                        Ok(None) => break,
                        Err(_elapsed) => {
                            if stop.load(Ordering::Acquire) {
                                break;
                            }
                        }
                    }
                }
            })
        };

        let monitor_task = {
            let tracking = tracking.clone();
            let cancellation = cancellation.clone();
            let order_queue = queues.order.clone();
            let preparation_queue = queues.preparation.clone();
            let toppings_queue = queues.toppings.clone();
            let quality_queue = queues.quality.clone();
            let tapioca_pool = queues.tapioca.clone();
            tokio::spawn(async move {
                let mut tick: u64 = 0;
                loop {
                    tokio::select! {
                        _ = cancellation.cancelled() => break,
                        _ = tokio::time::sleep(scale_duration(MONITOR_TICK, time_scale)) => {}
                    }
                    tick += 1;
                    if tick % MONITOR_TICKS_PER_PROGRESS == 0 {
                        tracing::info!(
                            generated = tracking.generated(),
                            completed = tracking.completed_count(),
                            failed = tracking.failed(),
                            in_flight = tracking.in_flight(),
                            order_queue = order_queue.count(),
                            preparation_queue = preparation_queue.count(),
                            toppings_queue = toppings_queue.count(),
                            quality_queue = quality_queue.count(),
                            tapioca_pool = tapioca_pool.count(),
                            "progress"
                        );
                    }
                }
            })
        };

        // Run until the configured wall-clock duration elapses (§4.5).
        let run_duration = scale_duration(
            Duration::from_secs(self.config.simulation_duration_seconds),
            time_scale,
        );
        tokio::time::sleep(run_duration).await;
        tracing::info!("time's up, beginning shutdown");

        for handle in &emitter_handles {
            handle.stop();
        }
        for handle in &handler_handles {
            handle.stop();
        }
        cancellation.cancel();

        let join_grace = scale_duration(JOIN_GRACE, time_scale);
        let join_all_workers = async {
            for task in emitter_tasks {
                let _ = task.await;
            }
            for task in handler_tasks {
                let _ = task.await;
            }
        };
        if tokio::time::timeout(join_grace, join_all_workers)
            .await
            .is_err()
        {
            tracing::warn!("join grace period elapsed, abandoning straggler tasks");
        }
        let _ = tokio::time::timeout(join_grace, monitor_task).await;

        // Allow any just-landed completion/failure signals to flush before
        // the snapshot is taken (§4.5 shutdown step 6).
        tokio::time::sleep(scale_duration(DRAIN_WINDOW, time_scale)).await;
        signal_drain_stop.store(true, Ordering::Release);
        let _ = tokio::time::timeout(join_grace, signal_task).await;

        let snapshot = EngineSnapshot {
            duration_seconds: self.config.simulation_duration_seconds,
            generated: tracking.generated(),
            completed_processing_times: tracking.completed.lock().clone(),
            failed: tracking.failed(),
            rework_events: tracking.rework_events(),
            queue_lengths: queues.lengths(),
            base_preparation: sum(&stage_counters.base_preparation),
            tapioca_cooking: sum(&stage_counters.tapioca_cooking),
            toppings: sum(&stage_counters.toppings),
            quality_control: sum(&stage_counters.quality_control),
            packaging: sum(&stage_counters.packaging),
        };

        aggregate(&snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn tiny_config(duration_seconds: u64) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.simulation_duration_seconds = duration_seconds;
        config.regular_emitter_count = 1;
        config.group_emitter_count = 0;
        config.base_preparation_handlers = 1;
        config.tapioca_cooking_handlers = 1;
        config.toppings_handlers = 1;
        config.quality_control_handlers = 1;
        config.packaging_handlers = 1;
        config
    }

    #[tokio::test]
    async fn zero_duration_produces_empty_statistics() {
        let engine = SimulationEngine::new(tiny_config(0), 1);
        let stats = engine.run().await;
        assert_eq!(stats.total_orders_generated, 0);
        assert_eq!(stats.total_orders_processed, 0);
        assert_eq!(stats.total_orders_failed, 0);
        assert_eq!(stats.queue_lengths.order_queue, 0);
    }

    #[tokio::test]
    async fn short_run_conserves_generated_completed_failed_in_flight() {
        let mut config = tiny_config(1);
        config.emitter.regular_order_interval_mean = 0.05;
        config.emitter.regular_order_interval_deviation = 0.0;
        let engine = SimulationEngine::new(config, 7);
        let stats = engine.run().await;

        assert!(stats.total_orders_generated >= stats.total_orders_processed + stats.total_orders_failed);
    }

    #[tokio::test]
    async fn always_fail_base_preparation_fails_every_order() {
        let mut config = tiny_config(1);
        config.emitter.regular_order_interval_mean = 0.05;
        config.emitter.regular_order_interval_deviation = 0.0;
        config.handlers.base_preparation.success_rate = 0.0;
        config.handlers.base_preparation.recalibration_rate = 0.0;
        let engine = SimulationEngine::new(config, 11);
        let stats = engine.run().await;

        assert_eq!(stats.total_orders_processed, 0);
        if stats.total_orders_generated > 0 {
            assert!(stats.total_orders_failed > 0);
        }
    }
}
