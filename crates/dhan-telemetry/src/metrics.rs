//! Prometheus metrics for the order bridge.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. Registration only fails on a
//! duplicate metric name, which is a startup bug, and only during static
//! initialization.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, register_int_counter,
    register_int_gauge, CounterVec, Encoder, Histogram, HistogramVec, IntCounter, IntGauge,
    TextEncoder,
};

/// Orders accepted by the broker.
/// Labels: kind (bracket/trigger)
pub static ORDERS_PLACED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dhan_orders_placed_total",
        "Orders accepted by the broker",
        &["kind"]
    )
    .unwrap()
});

/// Orders that failed at any stage.
/// Labels: kind, error (input_validation/instrument_not_found/...)
pub static ORDERS_FAILED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dhan_orders_failed_total",
        "Orders that failed validation, resolution or placement",
        &["kind", "error"]
    )
    .unwrap()
});

/// Broker placement round-trip in milliseconds.
pub static BROKER_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "dhan_broker_latency_ms",
        "Broker placement call latency in milliseconds",
        &["kind"],
        vec![10.0, 25.0, 50.0, 100.0, 200.0, 400.0, 800.0, 1500.0, 3000.0, 6000.0]
    )
    .unwrap()
});

/// Time spent waiting on the shared rate limiter.
pub static RATE_LIMIT_WAIT_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "dhan_rate_limit_wait_ms",
        "Time spent waiting for a rate limiter slot in milliseconds",
        vec![0.0, 5.0, 20.0, 50.0, 100.0, 250.0, 500.0, 1000.0]
    )
    .unwrap()
});

/// Bulk rows processed.
/// Labels: outcome (success/failure)
pub static BULK_ROWS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dhan_bulk_rows_total",
        "Bulk rows processed",
        &["outcome"]
    )
    .unwrap()
});

/// Bulk jobs currently pending or running.
pub static BULK_JOBS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("dhan_bulk_jobs_active", "Bulk jobs pending or running").unwrap()
});

/// Deferred orders whose trigger band was hit.
/// Labels: outcome (placed/failed)
pub static DEFERRED_TRIGGERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dhan_deferred_triggers_total",
        "Deferred orders fired after their trigger band was hit",
        &["outcome"]
    )
    .unwrap()
});

/// Deferred poll cycles run.
pub static DEFERRED_CYCLES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("dhan_deferred_cycles_total", "Deferred poll cycles run").unwrap()
});

/// Deferred quote fetches that failed, per segment.
pub static DEFERRED_QUOTE_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dhan_deferred_quote_errors_total",
        "Failed last-price fetches in the deferred poller",
        &["segment"]
    )
    .unwrap()
});

/// Static facade over the metric statics.
pub struct Metrics;

impl Metrics {
    pub fn order_placed(kind: &str) {
        ORDERS_PLACED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn order_failed(kind: &str, error: &str) {
        ORDERS_FAILED_TOTAL.with_label_values(&[kind, error]).inc();
    }

    pub fn broker_latency(kind: &str, latency_ms: f64) {
        BROKER_LATENCY_MS.with_label_values(&[kind]).observe(latency_ms);
    }

    pub fn rate_limit_wait(wait_ms: f64) {
        RATE_LIMIT_WAIT_MS.observe(wait_ms);
    }

    pub fn bulk_row(success: bool) {
        let outcome = if success { "success" } else { "failure" };
        BULK_ROWS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn bulk_job_started() {
        BULK_JOBS_ACTIVE.inc();
    }

    pub fn bulk_job_finished() {
        BULK_JOBS_ACTIVE.dec();
    }

    pub fn deferred_trigger(placed: bool) {
        let outcome = if placed { "placed" } else { "failed" };
        DEFERRED_TRIGGERS_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn deferred_cycle() {
        DEFERRED_CYCLES_TOTAL.inc();
    }

    pub fn deferred_quote_error(segment: &str) {
        DEFERRED_QUOTE_ERRORS_TOTAL
            .with_label_values(&[segment])
            .inc();
    }

    /// Render the default registry in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_show_up_in_text_output() {
        Metrics::order_placed("bracket");
        Metrics::order_failed("trigger", "lot_size_violation");
        Metrics::rate_limit_wait(12.0);
        Metrics::deferred_cycle();

        let text = Metrics::gather_text().unwrap();
        assert!(text.contains("dhan_orders_placed_total"));
        assert!(text.contains("lot_size_violation"));
        assert!(text.contains("dhan_rate_limit_wait_ms"));
        assert!(text.contains("dhan_deferred_cycles_total"));
    }

    #[test]
    fn test_bulk_gauge_moves_both_ways() {
        let before = BULK_JOBS_ACTIVE.get();
        Metrics::bulk_job_started();
        Metrics::bulk_job_finished();
        assert_eq!(BULK_JOBS_ACTIVE.get(), before);
    }
}
