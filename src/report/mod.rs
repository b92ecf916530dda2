//! Final report rendering (§6).
//!
//! Rendering is kept separate from [`crate::stats::aggregate`] so the
//! engine's output stays a plain data value: this module is the one place
//! that turns a [`Statistics`] value into the text a human (or a log file)
//! reads, matching the `HH:MM:SS - ` log-line convention used elsewhere in
//! the crate for everything that is not itself a report line.

use std::fmt::Write as _;

use crate::stats::Statistics;

/// Renders a [`Statistics`] value into the plain-text final report
/// described in §6 ("totals, queue snapshot, per-handler-type stats,
/// bottlenecks, success rate, average processing time").
pub fn render(stats: &Statistics) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Bubble Tea Pipeline Simulation Report ===");
    let _ = writeln!(out);
    let _ = writeln!(out, "Orders generated:  {}", stats.total_orders_generated);
    let _ = writeln!(out, "Orders processed:  {}", stats.total_orders_processed);
    let _ = writeln!(out, "Orders failed:     {}", stats.total_orders_failed);
    let _ = writeln!(out, "Rework events:     {}", stats.total_orders_reworked);
    let _ = writeln!(out, "Success rate:      {:.1}%", success_rate(stats) * 100.0);
    let _ = writeln!(
        out,
        "Avg processing time: {:.2}s",
        stats.average_order_processing_time.as_secs_f64()
    );
    let _ = writeln!(out, "Orders/minute:     {:.2}", stats.orders_per_minute);
    let _ = writeln!(out, "Throughput/minute: {:.2}", stats.throughput_per_minute);

    let _ = writeln!(out);
    let _ = writeln!(out, "-- Queue depths --");
    let _ = writeln!(out, "order queue:       {}", stats.queue_lengths.order_queue);
    let _ = writeln!(
        out,
        "preparation queue: {}",
        stats.queue_lengths.preparation_queue
    );
    let _ = writeln!(
        out,
        "toppings queue:    {}",
        stats.queue_lengths.toppings_queue
    );
    let _ = writeln!(out, "quality queue:     {}", stats.queue_lengths.quality_queue);
    let _ = writeln!(out, "tapioca pool:      {}", stats.queue_lengths.tapioca_pool);

    let _ = writeln!(out);
    let _ = writeln!(out, "-- Handler stats (processed / failed / reworked, utilization) --");
    render_handler_line(&mut out, "BasePreparation", &stats.handler_stats.base_preparation);
    render_handler_line(&mut out, "TapiocaCooking", &stats.handler_stats.tapioca_cooking);
    render_handler_line(&mut out, "Toppings", &stats.handler_stats.toppings);
    render_handler_line(&mut out, "QualityControl", &stats.handler_stats.quality_control);
    render_handler_line(&mut out, "Packaging", &stats.handler_stats.packaging);

    let _ = writeln!(out);
    let _ = writeln!(out, "-- Bottleneck analysis --");
    if stats.bottleneck_analysis.is_empty() {
        let _ = writeln!(out, "no bottlenecks detected");
    } else {
        for diagnostic in &stats.bottleneck_analysis {
            let _ = writeln!(out, "* {diagnostic}");
        }
    }

    out
}

fn render_handler_line(out: &mut String, name: &str, stats: &crate::stats::HandlerTypeStats) {
    let _ = writeln!(
        out,
        "{name:<15} {:>6} / {:>6} / {:>6}   {:>5.1}%",
        stats.processed, stats.failed, stats.reworked, stats.utilization
    );
}

/// `processed / (processed + failed)`, `0.0` when neither has happened yet.
fn success_rate(stats: &Statistics) -> f64 {
    let attempted = stats.total_orders_processed + stats.total_orders_failed;
    if attempted == 0 {
        0.0
    } else {
        stats.total_orders_processed as f64 / attempted as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{aggregate, EngineSnapshot, QueueLengths};
    use std::time::Duration;

    fn sample_stats() -> Statistics {
        aggregate(&EngineSnapshot {
            duration_seconds: 60,
            generated: 10,
            completed_processing_times: vec![Duration::from_secs(3)],
            failed: 2,
            rework_events: 1,
            queue_lengths: QueueLengths::default(),
            base_preparation: Default::default(),
            tapioca_cooking: Default::default(),
            toppings: Default::default(),
            quality_control: Default::default(),
            packaging: Default::default(),
        })
    }

    #[test]
    fn renders_every_section() {
        let report = render(&sample_stats());
        assert!(report.contains("Orders generated:  10"));
        assert!(report.contains("Queue depths"));
        assert!(report.contains("Handler stats"));
        assert!(report.contains("Bottleneck analysis"));
        assert!(report.contains("no bottlenecks detected"));
    }

    #[test]
    fn success_rate_is_zero_with_no_attempts() {
        let stats = aggregate(&EngineSnapshot {
            duration_seconds: 0,
            generated: 0,
            completed_processing_times: Vec::new(),
            failed: 0,
            rework_events: 0,
            queue_lengths: QueueLengths::default(),
            base_preparation: Default::default(),
            tapioca_cooking: Default::default(),
            toppings: Default::default(),
            quality_control: Default::default(),
            packaging: Default::default(),
        });
        let report = render(&stats);
        assert!(report.contains("Success rate:      0.0%"));
    }
}
