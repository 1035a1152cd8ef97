// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the provider controller.
//!
//! All metrics live in a process-global registry under the `loadbalance_io_`
//! namespace and are exposed on an axum `/metrics` endpoint.

use crate::constants::{METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH};
use prometheus::{CounterVec, Encoder, IntCounter, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use tracing::{error, info};

/// Namespace prefix for all controller metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "loadbalance_io";

/// Global Prometheus metrics registry, exposed via the `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of reconciliation passes by provider and outcome
///
/// Labels:
/// - `provider`: provider plugin name (e.g. `azure`)
/// - `status`: outcome (`success`, `error`)
pub static SYNC_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_syncs_total"),
        "Total number of reconciliation passes by provider and outcome",
    );
    let counter = CounterVec::new(opts, &["provider", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of workload mutations issued by the provider
///
/// Labels:
/// - `provider`: provider plugin name
/// - `action`: mutation kind (`create`, `update`, `scale_down`, `delete`)
pub static WORKLOAD_MUTATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_workload_mutations_total"),
        "Total number of managed workload mutations by provider and action",
    );
    let counter = CounterVec::new(opts, &["provider", "action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of work queue retries scheduled after failed passes
pub static QUEUE_RETRIES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_queue_retries_total"),
        "Total number of work queue retries scheduled after failed passes",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of items dropped after exhausting the retry budget
pub static QUEUE_DROPS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_queue_drops_total"),
        "Total number of items dropped after exhausting the retry budget",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record the outcome of one reconciliation pass.
pub fn record_sync(provider: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    SYNC_TOTAL.with_label_values(&[provider, status]).inc();
}

/// Record one managed workload mutation.
pub fn record_workload_mutation(provider: &str, action: &str) {
    WORKLOAD_MUTATIONS_TOTAL
        .with_label_values(&[provider, action])
        .inc();
}

/// Record a scheduled work queue retry.
pub fn record_sync_retry() {
    QUEUE_RETRIES_TOTAL.inc();
}

/// Record an item dropped after the retry budget was exhausted.
pub fn record_sync_drop() {
    QUEUE_DROPS_TOTAL.inc();
}

/// Render the registry in the Prometheus text exposition format.
#[must_use]
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Serve the `/metrics` endpoint until the process exits.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound.
pub async fn serve_metrics(port: u16) -> anyhow::Result<()> {
    let app = axum::Router::new().route(METRICS_SERVER_PATH, axum::routing::get(|| async { gather() }));
    let addr = format!("{METRICS_SERVER_BIND_ADDRESS}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, path = METRICS_SERVER_PATH, "metrics server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
#[path = "metrics_tests.rs"]
mod metrics_tests;
