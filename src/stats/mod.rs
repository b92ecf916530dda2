//! Statistics aggregation and bottleneck diagnostics (§4.6).
//!
//! [`aggregate`] is a pure function over an [`EngineSnapshot`): calling it
//! twice on the same snapshot yields identical [`Statistics`] (§8), which
//! keeps all of the threshold-based diagnostics easy to unit test without
//! spinning up the engine.

use std::time::Duration;

use serde::Serialize;

use crate::counters::CounterSnapshot;

/// toppingsQueue depth above which the report flags a CRITICAL bottleneck (§4.6).
pub const TOPPINGS_QUEUE_CRITICAL: usize = 20;
/// tapiocaPool stock below which the report flags a low-stock bottleneck (§4.6).
pub const TAPIOCA_LOW_STOCK: usize = 3;
/// preparationQueue depth above which the report flags a bottleneck (§4.6).
pub const PREPARATION_QUEUE_WARNING: usize = 15;
/// qualityQueue depth above which the report flags a bottleneck (§4.6).
pub const QUALITY_QUEUE_WARNING: usize = 10;

/// Instantaneous queue-depth snapshot for every named queue (§4.6).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct QueueLengths {
    pub order_queue: usize,
    pub preparation_queue: usize,
    pub toppings_queue: usize,
    pub quality_queue: usize,
    pub tapioca_pool: usize,
}

/// Per-handler-type counters aggregated across every instance of that
/// stage, plus the derived utilization estimate (§4.6).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HandlerTypeStats {
    pub processed: u64,
    pub failed: u64,
    pub reworked: u64,
    /// `min(100, (processed / (durationSeconds/60)) * 10)` — an
    /// approximation, not a true busy-fraction (§4.6).
    pub utilization: f64,
}

/// Aggregated counters for every handler type, keyed by stage (§4.6).
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HandlerStats {
    pub base_preparation: HandlerTypeStats,
    pub tapioca_cooking: HandlerTypeStats,
    pub toppings: HandlerTypeStats,
    pub quality_control: HandlerTypeStats,
    pub packaging: HandlerTypeStats,
}

/// A plain, immutable snapshot of engine state taken at shutdown, fed to
/// [`aggregate`] to compute the final report.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub duration_seconds: u64,
    pub generated: u64,
    pub completed_processing_times: Vec<Duration>,
    pub failed: u64,
    pub rework_events: u64,
    pub queue_lengths: QueueLengths,
    pub base_preparation: CounterSnapshot,
    pub tapioca_cooking: CounterSnapshot,
    pub toppings: CounterSnapshot,
    pub quality_control: CounterSnapshot,
    pub packaging: CounterSnapshot,
}

/// The final, rendered-by-the-caller statistics report (§4.6, §6).
///
/// Serializable, like the other config/state values that cross module
/// boundaries in this crate, so a caller can emit it as JSON instead of
/// the plain-text report in [`crate::report`].
#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub total_orders_generated: u64,
    pub total_orders_processed: u64,
    pub total_orders_failed: u64,
    pub total_orders_reworked: u64,
    pub average_order_processing_time: Duration,
    pub orders_per_minute: f64,
    pub throughput_per_minute: f64,
    pub queue_lengths: QueueLengths,
    pub handler_stats: HandlerStats,
    pub bottleneck_analysis: Vec<String>,
}

fn utilization(processed: u64, duration_seconds: u64) -> f64 {
    if duration_seconds == 0 {
        return 0.0;
    }
    let minutes = duration_seconds as f64 / 60.0;
    (processed as f64 / minutes * 10.0).min(100.0)
}

fn handler_type_stats(counters: CounterSnapshot, duration_seconds: u64) -> HandlerTypeStats {
    HandlerTypeStats {
        processed: counters.processed,
        failed: counters.failed,
        reworked: counters.reworked,
        utilization: utilization(counters.processed, duration_seconds),
    }
}

/// Computes the final report from an engine snapshot (§4.6). Pure: calling
/// this twice with the same snapshot produces identical output (§8).
pub fn aggregate(snapshot: &EngineSnapshot) -> Statistics {
    let total_orders_processed = snapshot.completed_processing_times.len() as u64;
    let total_orders_failed = snapshot.failed;

    let average_order_processing_time = if snapshot.completed_processing_times.is_empty() {
        Duration::ZERO
    } else {
        let total: Duration = snapshot.completed_processing_times.iter().sum();
        total / snapshot.completed_processing_times.len() as u32
    };

    let minutes = (snapshot.duration_seconds as f64 / 60.0).max(f64::MIN_POSITIVE);
    let orders_per_minute = snapshot.generated as f64 / minutes;
    let throughput_per_minute = total_orders_processed as f64 / minutes;

    let handler_stats = HandlerStats {
        base_preparation: handler_type_stats(snapshot.base_preparation, snapshot.duration_seconds),
        tapioca_cooking: handler_type_stats(snapshot.tapioca_cooking, snapshot.duration_seconds),
        toppings: handler_type_stats(snapshot.toppings, snapshot.duration_seconds),
        quality_control: handler_type_stats(snapshot.quality_control, snapshot.duration_seconds),
        packaging: handler_type_stats(snapshot.packaging, snapshot.duration_seconds),
    };

    let mut bottleneck_analysis = Vec::new();

    if snapshot.queue_lengths.toppings_queue > TOPPINGS_QUEUE_CRITICAL {
        bottleneck_analysis.push(format!(
            "CRITICAL: toppings queue depth {} exceeds {} — add Toppings handlers or slow order intake",
            snapshot.queue_lengths.toppings_queue, TOPPINGS_QUEUE_CRITICAL
        ));
    }

    if snapshot.queue_lengths.tapioca_pool < TAPIOCA_LOW_STOCK {
        bottleneck_analysis.push(format!(
            "tapioca pool low on stock ({} remaining) — add TapiocaCooking capacity or reduce topping demand",
            snapshot.queue_lengths.tapioca_pool
        ));
    }

    if snapshot.generated > 0
        && (total_orders_processed as f64) < snapshot.generated as f64 / 4.0
    {
        bottleneck_analysis.push(format!(
            "overwhelmed system: only {} of {} generated orders completed",
            total_orders_processed, snapshot.generated
        ));
    }

    if snapshot.queue_lengths.preparation_queue > PREPARATION_QUEUE_WARNING {
        bottleneck_analysis.push(format!(
            "preparation queue depth {} exceeds {} — BasePreparation is a bottleneck",
            snapshot.queue_lengths.preparation_queue, PREPARATION_QUEUE_WARNING
        ));
    }

    if snapshot.queue_lengths.quality_queue > QUALITY_QUEUE_WARNING {
        bottleneck_analysis.push(format!(
            "quality queue depth {} exceeds {} — QualityControl is a bottleneck",
            snapshot.queue_lengths.quality_queue, QUALITY_QUEUE_WARNING
        ));
    }

    Statistics {
        total_orders_generated: snapshot.generated,
        total_orders_processed,
        total_orders_failed,
        total_orders_reworked: snapshot.rework_events,
        average_order_processing_time,
        orders_per_minute,
        throughput_per_minute,
        queue_lengths: snapshot.queue_lengths,
        handler_stats,
        bottleneck_analysis,
    }
}
