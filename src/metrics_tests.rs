// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Unit tests for metrics registration and recording.

use super::*;

#[test]
fn test_record_sync_counts_by_outcome() {
    let success_before = SYNC_TOTAL.with_label_values(&["azure", "success"]).get();
    let error_before = SYNC_TOTAL.with_label_values(&["azure", "error"]).get();

    record_sync("azure", true);
    record_sync("azure", true);
    record_sync("azure", false);

    let success = SYNC_TOTAL.with_label_values(&["azure", "success"]).get();
    let error = SYNC_TOTAL.with_label_values(&["azure", "error"]).get();
    assert!((success - success_before - 2.0).abs() < f64::EPSILON);
    assert!((error - error_before - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_record_workload_mutation_counts_by_action() {
    let before = WORKLOAD_MUTATIONS_TOTAL
        .with_label_values(&["azure", "create"])
        .get();
    record_workload_mutation("azure", "create");
    let after = WORKLOAD_MUTATIONS_TOTAL
        .with_label_values(&["azure", "create"])
        .get();
    assert!((after - before - 1.0).abs() < f64::EPSILON);
}

#[test]
fn test_queue_counters_increment() {
    let retries_before = QUEUE_RETRIES_TOTAL.get();
    let drops_before = QUEUE_DROPS_TOTAL.get();

    record_sync_retry();
    record_sync_drop();

    assert_eq!(QUEUE_RETRIES_TOTAL.get(), retries_before + 1);
    assert_eq!(QUEUE_DROPS_TOTAL.get(), drops_before + 1);
}

#[test]
fn test_gather_renders_text_exposition_format() {
    record_sync("azure", true);
    record_sync_retry();

    let output = gather();
    assert!(output.contains("loadbalance_io_syncs_total"));
    assert!(output.contains("loadbalance_io_queue_retries_total"));
    assert!(output.contains("# HELP"));
}
