//! Prometheus Metrics Module
//!
//! # Metrics Collected
//! - HTTP request counts and latency by method, route and status
//! - Open push connections
//! - Messages sent, by entry point (`rest` or `push`)
//! - Messages flipped to read, conversations created
//! - Database query duration and pool gauges

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

const NAMESPACE: &str = "dm_server";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("Failed to create HTTP_REQUESTS_TOTAL metric")
});

pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new("http_request_duration_seconds", "HTTP request latency in seconds")
            .namespace(NAMESPACE)
            .buckets(buckets),
        &["method", "path"],
    )
    .expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric")
});

/// Open push-channel connections
pub static GATEWAY_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("gateway_connections", "Number of open push connections").namespace(NAMESPACE),
    )
    .expect("Failed to create GATEWAY_CONNECTIONS metric")
});

pub static MESSAGES_SENT_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("messages_sent_total", "Messages appended, by entry point").namespace(NAMESPACE),
        &["via"],
    )
    .expect("Failed to create MESSAGES_SENT_TOTAL metric")
});

pub static MESSAGES_READ_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("messages_read_total", "Messages flipped from unread to read").namespace(NAMESPACE),
    )
    .expect("Failed to create MESSAGES_READ_TOTAL metric")
});

pub static CONVERSATIONS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("conversations_created_total", "Conversations created").namespace(NAMESPACE),
    )
    .expect("Failed to create CONVERSATIONS_CREATED_TOTAL metric")
});

pub static DB_QUERY_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];
    HistogramVec::new(
        HistogramOpts::new("db_query_duration_seconds", "Database query latency in seconds")
            .namespace(NAMESPACE)
            .buckets(buckets),
        &["operation", "table"],
    )
    .expect("Failed to create DB_QUERY_DURATION_SECONDS metric")
});

pub static DB_POOL_CONNECTIONS: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("db_pool_connections", "Database connection pool statistics").namespace(NAMESPACE),
        &["state"], // "idle", "active", "max"
    )
    .expect("Failed to create DB_POOL_CONNECTIONS metric")
});

fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
        Box::new(GATEWAY_CONNECTIONS.clone()),
        Box::new(MESSAGES_SENT_TOTAL.clone()),
        Box::new(MESSAGES_READ_TOTAL.clone()),
        Box::new(CONVERSATIONS_CREATED_TOTAL.clone()),
        Box::new(DB_QUERY_DURATION_SECONDS.clone()),
        Box::new(DB_POOL_CONNECTIONS.clone()),
    ];
    for collector in collectors {
        registry
            .register(collector)
            .expect("Failed to register metric");
    }
}

/// Encode all metrics in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

pub fn record_db_query(operation: &str, table: &str, duration_secs: f64) {
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .observe(duration_secs);
}

pub fn gateway_connection_opened() {
    GATEWAY_CONNECTIONS.inc();
}

pub fn gateway_connection_closed() {
    GATEWAY_CONNECTIONS.dec();
}

/// `via` is the entry point: `"rest"` or `"push"`.
pub fn record_message_sent(via: &str) {
    MESSAGES_SENT_TOTAL.with_label_values(&[via]).inc();
}

pub fn record_read_receipt(changed: u64) {
    MESSAGES_READ_TOTAL.inc_by(changed);
}

pub fn record_conversation_created() {
    CONVERSATIONS_CREATED_TOTAL.inc();
}

pub fn update_db_pool_stats(idle: u32, active: u32, max: u32) {
    DB_POOL_CONNECTIONS.with_label_values(&["idle"]).set(idle as f64);
    DB_POOL_CONNECTIONS.with_label_values(&["active"]).set(active as f64);
    DB_POOL_CONNECTIONS.with_label_values(&["max"]).set(max as f64);
}
