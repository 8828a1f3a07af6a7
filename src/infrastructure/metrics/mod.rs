//! Prometheus Metrics Module
//!
//! # Metrics Collected
//! - HTTP request counts by method, path, and status
//! - HTTP request latency histograms
//! - Active WebSocket connection gauges
//! - Record operation counts and latency by operation, table and outcome
//! - Fan-out deliveries by outcome

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter by method, path, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace("chat_backend"),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

/// HTTP request latency in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace("chat_backend")
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Active WebSocket connections
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new(
            "websocket_connections_active",
            "Number of active WebSocket connections",
        )
        .namespace("chat_backend"),
        &["state"], // "connected", "authenticated"
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Record service operations
pub static RECORD_OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("record_operations_total", "Record service operations")
            .namespace("chat_backend"),
        &["operation", "table", "outcome"], // outcome: "ok", "error", "cache_hit"
    )
    .expect("Failed to create RECORD_OPERATIONS_TOTAL metric")
});

/// Record service operation latency
pub static RECORD_OPERATION_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];
    HistogramVec::new(
        HistogramOpts::new(
            "record_operation_duration_seconds",
            "Record service operation latency in seconds",
        )
        .namespace("chat_backend")
        .buckets(buckets),
        &["operation", "table"],
    )
    .expect("Failed to create RECORD_OPERATION_DURATION_SECONDS metric")
});

/// Fan-out pushes
pub static FANOUT_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("fanout_deliveries_total", "Message fan-out pushes").namespace("chat_backend"),
        &["outcome"], // "delivered", "dropped"
    )
    .expect("Failed to create FANOUT_DELIVERIES_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .expect("Failed to register HTTP_REQUESTS_TOTAL");
    registry
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .expect("Failed to register HTTP_REQUEST_DURATION_SECONDS");
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(RECORD_OPERATIONS_TOTAL.clone()))
        .expect("Failed to register RECORD_OPERATIONS_TOTAL");
    registry
        .register(Box::new(RECORD_OPERATION_DURATION_SECONDS.clone()))
        .expect("Failed to register RECORD_OPERATION_DURATION_SECONDS");
    registry
        .register(Box::new(FANOUT_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register FANOUT_DELIVERIES_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Helper to record a record service operation
pub fn record_operation(operation: &str, table: &str, outcome: &str, duration_secs: f64) {
    RECORD_OPERATIONS_TOTAL
        .with_label_values(&[operation, table, outcome])
        .inc();
    RECORD_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .observe(duration_secs);
}

/// Helper to record fan-out push outcomes
pub fn record_fanout(delivered: u64, dropped: u64) {
    FANOUT_DELIVERIES_TOTAL
        .with_label_values(&["delivered"])
        .inc_by(delivered);
    FANOUT_DELIVERIES_TOTAL
        .with_label_values(&["dropped"])
        .inc_by(dropped);
}

/// Helper to update WebSocket connection count
pub fn set_websocket_connections(connected: i64, authenticated: i64) {
    WEBSOCKET_CONNECTIONS_ACTIVE
        .with_label_values(&["connected"])
        .set(connected as f64);
    WEBSOCKET_CONNECTIONS_ACTIVE
        .with_label_values(&["authenticated"])
        .set(authenticated as f64);
}
