/*
 * Copyright (c) 2025 Dylan Storey
 * Licensed under the Elastic License 2.0.
 * See LICENSE file in the project root for full license text.
 */

//! # Metrics Module
//!
//! Prometheus metrics for the controller: orchestrator operations by outcome,
//! deletion polling, and HTTP requests.

use once_cell::sync::Lazy;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global Prometheus registry for all controller metrics
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Orchestrator operation counter
/// Labels: operation (deploy/patch_env/restart/redeploy/delete), outcome (success or error kind)
pub static OPERATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    let opts = Opts::new(
        "kokopi_operations_total",
        "Total number of tenant lifecycle operations by outcome",
    );
    let counter = CounterVec::new(opts, &["operation", "outcome"])
        .expect("Failed to create operations counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register operations counter");
    counter
});

/// Status reads issued while waiting for a tenant namespace to disappear
/// Labels: status (deleted/terminating/pending)
pub static DELETE_POLL_ATTEMPTS: Lazy<HistogramVec> = Lazy::new(|| {
    let opts = HistogramOpts::new(
        "kokopi_delete_poll_attempts",
        "Namespace status reads per tenant deletion",
    )
    .buckets(vec![1.0, 2.0, 3.0, 5.0, 10.0, 20.0, 50.0]);
    let histogram =
        HistogramVec::new(opts, &["status"]).expect("Failed to create delete poll histogram");
    REGISTRY
        .register(Box::new(histogram.clone()))
        .expect("Failed to register delete poll histogram");
    histogram
});

/// HTTP request counter
/// Labels: method, status
pub static HTTP_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    let opts = Opts::new("kokopi_http_requests_total", "Total number of HTTP requests");
    let counter = CounterVec::new(opts, &["method", "status"])
        .expect("Failed to create HTTP requests counter");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("Failed to register HTTP requests counter");
    counter
});

/// Managed tenants seen by the last listing
pub static MANAGED_TENANTS: Lazy<IntGauge> = Lazy::new(|| {
    let opts = Opts::new(
        "kokopi_managed_tenants",
        "Number of managed tenant namespaces at the last listing",
    );
    let gauge = IntGauge::with_opts(opts).expect("Failed to create managed tenants gauge");
    REGISTRY
        .register(Box::new(gauge.clone()))
        .expect("Failed to register managed tenants gauge");
    gauge
});

/// Records the outcome of an orchestrator operation.
pub fn record_operation(operation: &str, outcome: &str) {
    OPERATIONS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
}

/// Encodes all registered metrics in Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to UTF-8")
}
