//! Prometheus Metrics Module
//!
//! Provides relay-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - Active WebSocket connections and RPC streams
//! - Envelopes broadcast by kind, and local deliveries
//! - Slow consumers evicted from the registry
//! - Bus publish failures and duplicates suppressed by the bridge
//! - Persistence failures by operation
//! - Database query duration histograms

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Active WebSocket connections held by the registry
pub static WEBSOCKET_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new(
            "websocket_connections_active",
            "Number of registered WebSocket connections",
        )
        .namespace("chat_relay"),
    )
    .expect("Failed to create WEBSOCKET_CONNECTIONS_ACTIVE metric")
});

/// Envelopes broadcast to a local room, by kind
pub static ENVELOPES_BROADCAST_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("envelopes_broadcast_total", "Envelopes broadcast to local rooms")
            .namespace("chat_relay"),
        &["kind"],
    )
    .expect("Failed to create ENVELOPES_BROADCAST_TOTAL metric")
});

/// Frames accepted by a connection's outbound queue
pub static LOCAL_DELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("local_deliveries_total", "Frames enqueued on local connections")
            .namespace("chat_relay"),
    )
    .expect("Failed to create LOCAL_DELIVERIES_TOTAL metric")
});

pub static SLOW_CONSUMERS_EVICTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "slow_consumers_evicted_total",
            "Connections dropped because their outbound queue was full",
        )
        .namespace("chat_relay"),
    )
    .expect("Failed to create SLOW_CONSUMERS_EVICTED_TOTAL metric")
});

pub static BUS_PUBLISH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("bus_publish_failures_total", "Failed publishes to the message bus")
            .namespace("chat_relay"),
    )
    .expect("Failed to create BUS_PUBLISH_FAILURES_TOTAL metric")
});

pub static BUS_DUPLICATES_SUPPRESSED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "bus_duplicates_suppressed_total",
            "Bus envelopes dropped by the dedup window",
        )
        .namespace("chat_relay"),
    )
    .expect("Failed to create BUS_DUPLICATES_SUPPRESSED_TOTAL metric")
});

pub static BUS_MESSAGES_REJECTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new(
            "bus_messages_rejected_total",
            "Bus payloads that failed to decode or validate",
        )
        .namespace("chat_relay"),
    )
    .expect("Failed to create BUS_MESSAGES_REJECTED_TOTAL metric")
});

/// Storage failures, by operation
pub static PERSISTENCE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("persistence_failures_total", "Failed storage calls")
            .namespace("chat_relay"),
        &["operation"],
    )
    .expect("Failed to create PERSISTENCE_FAILURES_TOTAL metric")
});

pub static RPC_STREAMS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("rpc_streams_active", "Open StreamMessages calls").namespace("chat_relay"),
    )
    .expect("Failed to create RPC_STREAMS_ACTIVE metric")
});

/// Database query duration histogram
pub static DB_QUERY_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];
    HistogramVec::new(
        HistogramOpts::new(
            "db_query_duration_seconds",
            "Database query latency in seconds",
        )
        .namespace("chat_relay")
        .buckets(buckets),
        &["operation", "table"],
    )
    .expect("Failed to create DB_QUERY_DURATION_SECONDS metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(WEBSOCKET_CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register WEBSOCKET_CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(ENVELOPES_BROADCAST_TOTAL.clone()))
        .expect("Failed to register ENVELOPES_BROADCAST_TOTAL");
    registry
        .register(Box::new(LOCAL_DELIVERIES_TOTAL.clone()))
        .expect("Failed to register LOCAL_DELIVERIES_TOTAL");
    registry
        .register(Box::new(SLOW_CONSUMERS_EVICTED_TOTAL.clone()))
        .expect("Failed to register SLOW_CONSUMERS_EVICTED_TOTAL");
    registry
        .register(Box::new(BUS_PUBLISH_FAILURES_TOTAL.clone()))
        .expect("Failed to register BUS_PUBLISH_FAILURES_TOTAL");
    registry
        .register(Box::new(BUS_DUPLICATES_SUPPRESSED_TOTAL.clone()))
        .expect("Failed to register BUS_DUPLICATES_SUPPRESSED_TOTAL");
    registry
        .register(Box::new(BUS_MESSAGES_REJECTED_TOTAL.clone()))
        .expect("Failed to register BUS_MESSAGES_REJECTED_TOTAL");
    registry
        .register(Box::new(PERSISTENCE_FAILURES_TOTAL.clone()))
        .expect("Failed to register PERSISTENCE_FAILURES_TOTAL");
    registry
        .register(Box::new(RPC_STREAMS_ACTIVE.clone()))
        .expect("Failed to register RPC_STREAMS_ACTIVE");
    registry
        .register(Box::new(DB_QUERY_DURATION_SECONDS.clone()))
        .expect("Failed to register DB_QUERY_DURATION_SECONDS");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Helper to record database query metrics
pub fn record_db_query(operation: &str, table: &str, duration_secs: f64) {
    DB_QUERY_DURATION_SECONDS
        .with_label_values(&[operation, table])
        .observe(duration_secs);
}

pub fn set_websocket_connections(count: usize) {
    WEBSOCKET_CONNECTIONS_ACTIVE.set(count as i64);
}

/// Helper to record one broadcast and the deliveries it produced
pub fn record_broadcast(kind: &str, delivered: usize) {
    ENVELOPES_BROADCAST_TOTAL.with_label_values(&[kind]).inc();
    LOCAL_DELIVERIES_TOTAL.inc_by(delivered as u64);
}

pub fn record_evictions(count: usize) {
    SLOW_CONSUMERS_EVICTED_TOTAL.inc_by(count as u64);
}

pub fn record_bus_publish_failure() {
    BUS_PUBLISH_FAILURES_TOTAL.inc();
}

pub fn record_duplicate_suppressed() {
    BUS_DUPLICATES_SUPPRESSED_TOTAL.inc();
}

pub fn record_bus_rejected() {
    BUS_MESSAGES_REJECTED_TOTAL.inc();
}

pub fn record_persistence_failure(operation: &str) {
    PERSISTENCE_FAILURES_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn rpc_stream_opened() {
    RPC_STREAMS_ACTIVE.inc();
}

pub fn rpc_stream_closed() {
    RPC_STREAMS_ACTIVE.dec();
}
