// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Provider status sub-API on the owning LoadBalancer.

use crate::crd::LoadBalancer;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use tracing::debug;

/// Clear this provider's status block on the owning LoadBalancer.
///
/// Used when the provider is no longer requested. A vanished owner is treated
/// as success.
///
/// # Errors
///
/// Returns transient API errors so the pass is retried.
pub async fn clear_provider_status(client: &Client, lb: &LoadBalancer) -> anyhow::Result<()> {
    let namespace = lb.namespace().unwrap_or_default();
    let name = lb.name_any();
    debug!(lb = %name, namespace = %namespace, "clearing azure provider status");

    let api: Api<LoadBalancer> = Api::namespaced(client.clone(), &namespace);
    let patch = json!({"status": {"providersStatuses": {"azure": null}}});
    match api
        .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
        .await
    {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(err) => Err(err.into()),
    }
}
