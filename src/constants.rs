// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Global constants for the LoadBalancer provider controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for the LoadBalancer CRD
pub const API_GROUP: &str = "loadbalance.io";

/// API version for the LoadBalancer CRD
pub const API_VERSION: &str = "v1alpha2";

/// Fully qualified API version (group/version)
pub const API_GROUP_VERSION: &str = "loadbalance.io/v1alpha2";

/// Kind name for the `LoadBalancer` resource
pub const KIND_LOAD_BALANCER: &str = "LoadBalancer";

// ============================================================================
// Provider Constants
// ============================================================================

/// Name of this provider plugin
pub const PROVIDER_NAME: &str = "azure";

/// Suffix appended to the owning LoadBalancer name to form the canonical
/// deployment name prefix (`<lb>-provider-azure-<suffix>`)
pub const PROVIDER_NAME_SUFFIX: &str = "-provider-azure";

/// Length of the randomized suffix appended to generated deployment names
pub const NAME_SUFFIX_LEN: usize = 5;

/// Default image for the provider agent container
pub const DEFAULT_PROVIDER_IMAGE: &str = "loadbalancer-provider-azure:latest";

// ============================================================================
// Deployment Constants
// ============================================================================

/// Replica count for the canonical provider deployment
pub const PROVIDER_REPLICAS: i32 = 1;

/// Termination grace period for provider agent pods (seconds)
pub const TERMINATION_GRACE_PERIOD_SECS: i64 = 300;

/// Grace period used when deleting provider deployments during cleanup (seconds)
pub const CLEANUP_GRACE_PERIOD_SECS: u32 = 30;

/// CPU request for the provider agent container
pub const PROVIDER_CPU_REQUEST: &str = "100m";

/// Memory request for the provider agent container
pub const PROVIDER_MEMORY_REQUEST: &str = "50Mi";

/// CPU limit for the provider agent container
pub const PROVIDER_CPU_LIMIT: &str = "200m";

/// Memory limit for the provider agent container
pub const PROVIDER_MEMORY_LIMIT: &str = "100Mi";

/// Maximum length of a Kubernetes object name (DNS-1123 label)
pub const MAX_NAME_LEN: usize = 63;

// ============================================================================
// Work Queue Constants
// ============================================================================

/// Default number of workers draining the sync queue
pub const DEFAULT_SYNC_WORKERS: usize = 1;

/// Maximum reconciliation attempts per item before it is dropped
pub const MAX_SYNC_ATTEMPTS: u32 = 15;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default port for the Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
