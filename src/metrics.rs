// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for catalogd.
//!
//! All metrics carry the `catalogd_` prefix and are registered in
//! [`METRICS_REGISTRY`], which the metrics server exposes on `/metrics`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - reconcile outcomes and durations per kind
//! - **Broker Metrics** - OSB request outcomes and latency
//! - **Queue Metrics** - work queue adds
//! - **Status Metrics** - optimistic-concurrency conflicts on status writes
//!
//! # Example
//!
//! ```rust,no_run
//! use catalogd::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("ServiceInstance", std::time::Duration::from_secs(1));
//! ```

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all catalogd metrics
const METRICS_NAMESPACE: &str = "catalogd";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `ServiceInstance`, `ClusterServicePlan`)
/// - `status`: Outcome (`success`, `poll`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Broker Metrics
// ============================================================================

/// Total number of OSB requests
///
/// Labels:
/// - `operation`: `provision`, `update`, `deprovision`, `last_operation`
/// - `outcome`: HTTP status code, or `transport_error`
pub static BROKER_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_broker_requests_total"),
        "Total number of Open Service Broker requests by operation and outcome",
    );
    let counter = CounterVec::new(opts, &["operation", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Latency of OSB requests in seconds
pub static BROKER_REQUEST_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_broker_request_duration_seconds"),
        "Latency of Open Service Broker requests in seconds by operation",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Queue and Status Metrics
// ============================================================================

/// Keys added to a work queue
///
/// Labels:
/// - `queue`: `primary` or `polling`
pub static QUEUE_ADDS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_queue_adds_total"),
        "Total number of keys added to work queues",
    );
    let counter = CounterVec::new(opts, &["queue"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Status writes that hit an optimistic-concurrency conflict
pub static STATUS_CONFLICTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_status_conflicts_total"),
        "Total number of conflicting ServiceInstance status writes",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a reconciliation that finished without error
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    record_reconciliation(resource_type, "success", duration);
}

/// Record a reconciliation that ended by scheduling a broker poll
pub fn record_reconciliation_poll(resource_type: &str, duration: Duration) {
    record_reconciliation(resource_type, "poll", duration);
}

/// Record a failed reconciliation
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    record_reconciliation(resource_type, "error", duration);
}

fn record_reconciliation(resource_type: &str, status: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, status])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a completed OSB request
///
/// # Arguments
/// * `operation` - OSB operation name
/// * `outcome` - HTTP status code or `transport_error`
/// * `duration` - Time until the response (or failure) arrived
pub fn record_broker_request(operation: &str, outcome: &str, duration: Duration) {
    BROKER_REQUESTS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
    BROKER_REQUEST_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

pub fn record_queue_add(queue: &str) {
    QUEUE_ADDS_TOTAL.with_label_values(&[queue]).inc();
}

pub fn record_status_conflict() {
    STATUS_CONFLICTS_TOTAL.inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
