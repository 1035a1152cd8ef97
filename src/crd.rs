// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Custom Resource Definition for the `LoadBalancer` owning resource.
//!
//! The LoadBalancer is a pure data shape: it declares which providers are
//! requested and with what configuration. Provider plugins watch it and drive
//! their own agent workloads toward the requested state.
//!
//! # Example
//!
//! ```yaml
//! apiVersion: loadbalance.io/v1alpha2
//! kind: LoadBalancer
//! metadata:
//!   name: lb1
//!   namespace: ns
//! spec:
//!   providers:
//!     azure:
//!       resourceGroup: my-rg
//!       location: westeurope
//! ```

use crate::constants::{MAX_NAME_LEN, NAME_SUFFIX_LEN, PROVIDER_NAME_SUFFIX};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `LoadBalancer` declares a user-facing load balancer and the providers that
/// should realize it.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "loadbalance.io",
    version = "v1alpha2",
    kind = "LoadBalancer",
    namespaced,
    doc = "LoadBalancer declares a user-facing load balancer; provider plugins manage the agent workloads that realize it."
)]
#[kube(status = "LoadBalancerStatus")]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    /// Node names the load balancer should run on, when the provider pins
    /// agents to specific nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<String>>,

    /// Requested providers. A provider manages this LoadBalancer if and only
    /// if its entry is present; removing the entry triggers cleanup of all
    /// workloads the provider created.
    pub providers: ProvidersSpec,
}

/// Per-provider configuration. One optional entry per known provider.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersSpec {
    /// Azure provider configuration; presence requests the azure provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureProviderSpec>,
}

/// Configuration for the azure provider agent.
///
/// The agent image is controller-wide configuration, deliberately not part of
/// this spec.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureProviderSpec {
    /// Azure resource group the agent provisions into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,

    /// Azure location (region) of the resource group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Identifier of the cluster within the Azure subscription.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
}

/// Status reported back by provider plugins.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerStatus {
    /// Per-provider status blocks, keyed by provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub providers_statuses: Option<ProviderStatuses>,
}

/// Per-provider status container.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatuses {
    /// Status of the azure provider workload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureProviderStatus>,
}

/// Status of the azure provider workload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureProviderStatus {
    /// Lifecycle phase of the provider agent (e.g. "Running").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Name of the canonical provider deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
}

/// Validation failure for a LoadBalancer spec.
///
/// A validation error is terminal for a reconciliation pass: no cluster
/// mutation is attempted, and the work queue's retry budget bounds how often
/// the item is re-seen.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("loadbalancer has no name")]
    MissingName,

    #[error("loadbalancer name {name:?} is too long: generated workload names would exceed {MAX_NAME_LEN} characters")]
    NameTooLong { name: String },

    #[error("azure provider field {field:?} must not be empty when set")]
    EmptyField { field: &'static str },
}

/// Validate a LoadBalancer spec before reconciling it.
///
/// # Errors
///
/// Returns a [`ValidationError`] describing the first violated rule.
pub fn validate_loadbalancer(lb: &LoadBalancer) -> Result<(), ValidationError> {
    let name = lb.name_any();
    if name.is_empty() {
        return Err(ValidationError::MissingName);
    }

    // Generated workload names are `<name><suffix>-<rand>` and must stay a
    // valid DNS-1123 label.
    let generated_len = name.len() + PROVIDER_NAME_SUFFIX.len() + 1 + NAME_SUFFIX_LEN;
    if generated_len > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong { name });
    }

    if let Some(azure) = &lb.spec.providers.azure {
        if azure.resource_group.as_deref() == Some("") {
            return Err(ValidationError::EmptyField {
                field: "resourceGroup",
            });
        }
        if azure.location.as_deref() == Some("") {
            return Err(ValidationError::EmptyField { field: "location" });
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
