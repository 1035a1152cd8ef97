// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Reconciliation logic for provider agent workloads.
//!
//! - [`azure`]: the azure provider plugin and its sync pass
//! - [`claim`]: ownership claiming with live owner recheck
//! - [`resources`]: desired-state generation for agent deployments
//! - [`status`]: provider status updates on the owning LoadBalancer

pub mod azure;
pub mod claim;
pub mod resources;
pub mod status;

pub use azure::AzureProvider;
pub use claim::{ClaimError, DeploymentClaimer};
