// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Common label and annotation constants used across the provider.
//!
//! Every managed workload carries a provider marker and a created-by marker
//! referencing the owning LoadBalancer. The selector built here is the single
//! source of truth for both event filtering and ownership claiming.

use crate::constants::PROVIDER_NAME;
use crate::crd::LoadBalancer;
use kube::ResourceExt;
use std::collections::BTreeMap;

// ============================================================================
// LoadBalancer Labels
// ============================================================================

/// Label naming the provider that manages a workload (e.g. "azure")
pub const LABEL_KEY_PROVIDER: &str = "loadbalance.io/provider";

/// Label referencing the owning LoadBalancer, value `<name>@<namespace>`
pub const LABEL_KEY_CREATED_BY: &str = "loadbalance.io/created-by";

// ============================================================================
// LoadBalancer Annotations
// ============================================================================

/// Annotation locking a LoadBalancer against automatic workload changes
pub const ANNOTATION_STATIC: &str = "loadbalance.io/static";

/// Format the created-by label value for an owning LoadBalancer.
#[must_use]
pub fn created_by_value(namespace: &str, name: &str) -> String {
    format!("{name}@{namespace}")
}

/// Build the provider+owner label set for workloads of the given LoadBalancer.
///
/// This set is used both as the workload labels and as the list selector when
/// claiming workloads, so the two can never drift apart.
#[must_use]
pub fn provider_selector(lb: &LoadBalancer) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            LABEL_KEY_CREATED_BY.to_string(),
            created_by_value(&lb.namespace().unwrap_or_default(), &lb.name_any()),
        ),
        (LABEL_KEY_PROVIDER.to_string(), PROVIDER_NAME.to_string()),
    ])
}

/// Check whether a label set carries this provider's marker.
///
/// Workload events failing this check belong to other providers sharing the
/// same LoadBalancer and are discarded.
#[must_use]
pub fn matches_provider_label(labels: &BTreeMap<String, String>) -> bool {
    labels.get(LABEL_KEY_PROVIDER).map(String::as_str) == Some(PROVIDER_NAME)
}

/// Check whether every key/value pair of `selector` is present in `labels`.
#[must_use]
pub fn matches_selector(
    selector: &BTreeMap<String, String>,
    labels: &BTreeMap<String, String>,
) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}

/// Check whether a LoadBalancer is marked static (locked against automatic change).
#[must_use]
pub fn is_static(lb: &LoadBalancer) -> bool {
    lb.annotations().get(ANNOTATION_STATIC).map(String::as_str) == Some("true")
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
