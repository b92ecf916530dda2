//! End-to-end integration tests driving the real simulation engine over
//! short, test-scaled durations.

use boba_pipeline_lib::config::PipelineConfig;
use boba_pipeline_lib::engine::SimulationEngine;

/// Every scenario below runs at this time scale: sampled/fixed durations
/// given in seconds (handler service times, rework penalties, shutdown
/// grace windows) are all divided by it before becoming real sleeps, so a
/// run whose `SimulationDurationSeconds` implies tens of seconds of
/// simulated time completes in well under a second of wall clock, while
/// every ratio between stage timings is unchanged.
const TEST_TIME_SCALE: f64 = 50.0;

fn minimal_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.time_scale = TEST_TIME_SCALE;
    config.simulation_duration_seconds = 15;
    config.regular_emitter_count = 1;
    config.group_emitter_count = 0;
    config.base_preparation_handlers = 1;
    config.tapioca_cooking_handlers = 1;
    config.toppings_handlers = 1;
    config.quality_control_handlers = 1;
    config.packaging_handlers = 1;
    config.emitter.regular_order_interval_mean = 0.1;
    config.emitter.regular_order_interval_deviation = 0.01;
    config
}

#[tokio::test]
async fn s1_minimal_run_completes_without_exceeding_tapioca_capacity() {
    let config = minimal_config();
    let tapioca_capacity = config.queues.tapioca_queue_capacity;
    let engine = SimulationEngine::new(config, 101);

    let stats = engine.run().await;

    assert!(stats.total_orders_generated >= 1);
    assert!(
        stats.total_orders_processed > 0,
        "expected at least one order to traverse all five stages within the scaled run"
    );
    assert!(stats.queue_lengths.tapioca_pool <= tapioca_capacity);
}

#[tokio::test]
async fn s3_always_fail_base_preparation_fails_every_generated_order() {
    let mut config = minimal_config();
    config.handlers.base_preparation.success_rate = 0.0;
    config.handlers.base_preparation.recalibration_rate = 0.0;
    let engine = SimulationEngine::new(config, 103);

    let stats = engine.run().await;

    assert!(
        stats.total_orders_generated > 0,
        "scenario did not generate any orders to exercise the failure branch"
    );
    assert_eq!(stats.total_orders_processed, 0);
    assert_eq!(stats.total_orders_failed, stats.total_orders_generated);
    assert_eq!(stats.queue_lengths.toppings_queue, 0);
    assert_eq!(stats.queue_lengths.quality_queue, 0);
}

#[tokio::test]
async fn s2_healthy_tapioca_cooking_never_flags_low_stock() {
    let mut config = minimal_config();
    config.handlers.tapioca_cooking.success_rate = 1.0;
    config.handlers.toppings.success_rate = 1.0;
    config.handlers.toppings.rework_rate = 0.0;
    let engine = SimulationEngine::new(config, 102);

    let stats = engine.run().await;

    assert!(!stats
        .bottleneck_analysis
        .iter()
        .any(|d| d.contains("tapioca")));
}

#[tokio::test]
async fn s4_always_rework_quality_control_never_completes_an_order() {
    let mut config = minimal_config();
    config.handlers.quality_control.success_rate = 0.0;
    config.handlers.quality_control.minor_defect_rate = 1.0;
    let engine = SimulationEngine::new(config, 104);

    let stats = engine.run().await;

    assert!(
        stats.total_orders_reworked > 0,
        "scenario did not drive any order through the quality-control rework branch"
    );
    assert_eq!(stats.total_orders_processed, 0);
    assert_eq!(stats.handler_stats.quality_control.failed, 0);
}

#[tokio::test]
async fn s6_tapioca_stress_keeps_cooking_within_pool_capacity() {
    let mut config = minimal_config();
    config.toppings_handlers = 4;
    config.tapioca_cooking_handlers = 1;
    config.queues.tapioca_queue_capacity = 15;
    let tapioca_capacity = config.queues.tapioca_queue_capacity;
    let engine = SimulationEngine::new(config, 106);

    let stats = engine.run().await;

    assert!(stats.queue_lengths.tapioca_pool <= tapioca_capacity);
}

#[tokio::test]
async fn s5_overloaded_intake_drops_orders_and_flags_overwhelmed_system() {
    let mut config = minimal_config();
    config.regular_emitter_count = 10;
    config.emitter.regular_order_interval_mean = 0.01;
    config.emitter.regular_order_interval_deviation = 0.0;
    config.queues.order_queue_capacity = 5;
    let engine = SimulationEngine::new(config, 105);

    let stats = engine.run().await;

    assert!(
        stats.total_orders_generated > 0,
        "scenario did not generate any orders to overwhelm the pipeline with"
    );
    assert!(
        (stats.total_orders_processed as f64) < stats.total_orders_generated as f64 / 4.0,
        "ten emitters racing a single worker per stage and a 5-slot order queue should complete \
         under a quarter of generated orders, got {} of {}",
        stats.total_orders_processed,
        stats.total_orders_generated
    );
    assert!(stats
        .bottleneck_analysis
        .iter()
        .any(|d| d.contains("overwhelmed")));
}
