// src/core/metrics.rs

//! Defines and registers Prometheus metrics for server monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};

lazy_static! {
    // --- Server-wide Gauges ---
    /// The number of clients currently connected to the server.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("currencydb_connected_clients", "Number of currently connected clients.").unwrap();
    /// Tasks submitted to the worker pool and not yet finished.
    pub static ref WORKER_QUEUE_DEPTH: Gauge =
        register_gauge!("currencydb_worker_queue_depth", "Number of queued or running message tasks.").unwrap();

    // --- Server-wide Counters ---
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("currencydb_connections_received_total", "Total number of connections received.").unwrap();
    /// Connections closed right after accept because `max_clients` was reached.
    pub static ref CONNECTIONS_REJECTED_TOTAL: Counter =
        register_counter!("currencydb_connections_rejected_total", "Total number of connections rejected by the client limit.").unwrap();
    /// Messages processed, labeled by message type.
    pub static ref MESSAGES_PROCESSED_TOTAL: CounterVec =
        register_counter_vec!("currencydb_messages_processed_total", "Total number of messages processed, labeled by type.", &["kind"]).unwrap();
    /// Error-typed responses produced by the dispatcher.
    pub static ref ERROR_RESPONSES_TOTAL: Counter =
        register_counter!("currencydb_error_responses_total", "Total number of error responses produced.").unwrap();
    /// Responses that could not be written back to their connection.
    pub static ref RESPONSE_WRITE_FAILURES_TOTAL: Counter =
        register_counter!("currencydb_response_write_failures_total", "Total number of failed response writes.").unwrap();
    /// Failures reported by the storage backend.
    pub static ref STORAGE_ERRORS_TOTAL: Counter =
        register_counter!("currencydb_storage_errors_total", "Total number of storage backend failures.").unwrap();

    // --- Histograms ---
    /// A histogram of message dispatch latencies.
    pub static ref DISPATCH_LATENCY_SECONDS: Histogram =
        register_histogram!("currencydb_dispatch_latency_seconds", "Latency of message dispatch in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|e| format!("# failed to encode metrics: {e}\n"))
}
