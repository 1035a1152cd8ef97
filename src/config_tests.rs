// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Unit tests for controller configuration parsing.

use super::*;

#[test]
fn test_defaults() {
    let config = Configuration::default();
    assert_eq!(config.azure_image, DEFAULT_PROVIDER_IMAGE);
    assert_eq!(config.workers, DEFAULT_SYNC_WORKERS);
    assert_eq!(config.metrics_port, METRICS_SERVER_PORT);
}

#[test]
fn test_parse_without_arguments_uses_defaults() {
    let config = Configuration::parse_from(["loadbalancer-provider"]);
    assert_eq!(config.azure_image, Configuration::default().azure_image);
    assert_eq!(config.workers, Configuration::default().workers);
}

#[test]
fn test_parse_flags() {
    let config = Configuration::parse_from([
        "loadbalancer-provider",
        "--azure-image",
        "registry.example.com/azure-agent:v2",
        "--workers",
        "4",
        "--metrics-port",
        "9090",
    ]);
    assert_eq!(config.azure_image, "registry.example.com/azure-agent:v2");
    assert_eq!(config.workers, 4);
    assert_eq!(config.metrics_port, 9090);
}
