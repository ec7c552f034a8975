//! Prometheus metrics for the counting service
//!
//! Process-wide counters and histograms for ingestion sessions, aggregation
//! queries and store failures, exposed by `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};

lazy_static! {
    // === Ingestion ===

    /// Records persisted by ingestion sessions
    pub static ref EVENTS_INGESTED: Counter = register_counter!(
        "counter_events_ingested_total",
        "Total count events persisted to the store"
    ).unwrap();

    /// Ingestion sessions by outcome
    pub static ref SESSIONS_TOTAL: CounterVec = register_counter_vec!(
        "counter_sessions_total",
        "Total ingestion sessions by outcome",
        &["outcome"]
    ).unwrap();

    // === Queries ===

    /// Aggregation queries by outcome
    pub static ref QUERIES_TOTAL: CounterVec = register_counter_vec!(
        "counter_queries_total",
        "Total aggregation queries by outcome",
        &["outcome"]
    ).unwrap();

    /// Aggregation query duration
    pub static ref QUERY_DURATION: Histogram = register_histogram!(
        "counter_query_duration_seconds",
        "Aggregation query latency in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();

    /// Buckets realized per successful query
    pub static ref QUERY_BUCKETS: Histogram = register_histogram!(
        "counter_query_buckets",
        "Number of buckets realized per aggregation query",
        vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 500.0, 1000.0]
    ).unwrap();

    // === Store ===

    /// Store failures by operation
    pub static ref STORE_ERRORS: CounterVec = register_counter_vec!(
        "counter_store_errors_total",
        "Total store failures by operation",
        &["operation"]
    ).unwrap();

    // === System Health ===

    /// Health status (0=unhealthy, 1=healthy)
    pub static ref HEALTH_STATUS: Gauge = register_gauge!(
        "counter_health_status",
        "Store health status (0=unhealthy, 1=healthy)"
    ).unwrap();
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record a persisted event
#[inline]
pub fn record_event_ingested() {
    EVENTS_INGESTED.inc();
}

/// Record the end of an ingestion session
#[inline]
pub fn record_session(outcome: &str) {
    SESSIONS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record a finished query
#[inline]
pub fn record_query(outcome: &str, duration_secs: f64, buckets: Option<usize>) {
    QUERIES_TOTAL.with_label_values(&[outcome]).inc();
    QUERY_DURATION.observe(duration_secs);
    if let Some(buckets) = buckets {
        QUERY_BUCKETS.observe(buckets as f64);
    }
}

/// Record a store failure
#[inline]
pub fn record_store_error(operation: &str) {
    STORE_ERRORS.with_label_values(&[operation]).inc();
}

/// Update the health gauge
#[inline]
pub fn set_healthy(healthy: bool) {
    HEALTH_STATUS.set(if healthy { 1.0 } else { 0.0 });
}
