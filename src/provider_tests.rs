// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Unit tests for the plugin registry.

use super::*;
use crate::crd::{LoadBalancerSpec, ProvidersSpec};

#[test]
fn test_registry_contains_azure() {
    let registry = registry();
    let azure = registry.get("azure").expect("azure plugin registered");
    assert_eq!(azure.name(), "azure");
}

#[test]
fn test_registry_lookup_unknown_provider() {
    assert!(registry().get("gcp").is_none());
}

#[test]
fn test_registry_iteration_is_stable() {
    let names: Vec<&str> = registry().plugins().map(|p| p.name()).collect();
    assert_eq!(names, vec!["azure"]);
}

#[test]
fn test_on_sync_before_init_is_a_no_op() {
    // A trigger arriving before wiring must be dropped, not crash the process.
    let plugin = AzureProvider::new();
    let lb = LoadBalancer::new(
        "lb1",
        LoadBalancerSpec {
            nodes: None,
            providers: ProvidersSpec::default(),
        },
    );
    plugin.on_sync(&lb);
}
