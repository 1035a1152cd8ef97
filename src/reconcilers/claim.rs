// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Ownership claiming for provider deployments.
//!
//! Resolves which managed deployments truly belong to an owning LoadBalancer.
//! Candidates come from the (possibly stale) cache; before any adoption is
//! finalized the owner is re-read live, bypassing the cache, and must still
//! exist with the same UID. This closes the time-of-check/time-of-use race
//! between a stale list and a concurrent deletion of the owner.

use crate::crd::LoadBalancer;
use crate::labels::matches_selector;
use crate::reconcilers::resources::build_owner_reference;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Failure while claiming deployments for an owner.
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    /// The live recheck found the owner missing or replaced. Benign from the
    /// reconciler's point of view: a future event for the newer owner will
    /// re-trigger.
    #[error("original LoadBalancer {namespace}/{name} is gone: got uid {found:?}, wanted {expected}")]
    OwnerGone {
        namespace: String,
        name: String,
        expected: String,
        found: Option<String>,
    },

    /// The live recheck found the owner being deleted; nothing is adopted.
    #[error("LoadBalancer {namespace}/{name} has a deletion timestamp, refusing to adopt")]
    OwnerDeleting { namespace: String, name: String },

    /// Transient API failure; propagated so the work queue retries the pass.
    #[error("kubernetes api error during claim: {0}")]
    Api(#[from] kube::Error),
}

/// Claim decision for one candidate deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// Controller owner reference matches the owner UID and labels match
    Owned,
    /// No controller owner reference and labels match: adopt after recheck
    Orphan,
    /// Controlled by a different owner; leave alone
    Foreign,
    /// Owned by us but labels no longer match the selector; drop the reference
    Release,
    /// Neither owned nor matching; ignore
    Ignore,
}

/// Classify a candidate against an owner UID and the provider+owner selector.
#[must_use]
pub fn classify(
    owner_uid: &str,
    selector: &BTreeMap<String, String>,
    dp: &Deployment,
) -> Ownership {
    let labels_match = matches_selector(selector, dp.labels());
    match controller_owner(dp) {
        Some(owner_ref) if owner_ref.uid == owner_uid => {
            if labels_match {
                Ownership::Owned
            } else {
                Ownership::Release
            }
        }
        Some(_) => Ownership::Foreign,
        None => {
            if labels_match {
                Ownership::Orphan
            } else {
                Ownership::Ignore
            }
        }
    }
}

fn controller_owner(dp: &Deployment) -> Option<&OwnerReference> {
    dp.owner_references()
        .iter()
        .find(|r| r.controller == Some(true))
}

/// Owner references a release keeps: only our controller reference is
/// dropped; non-controller back-references carrying the same UID stay.
fn retained_owner_references(dp: &Deployment, owner_uid: &str) -> Vec<OwnerReference> {
    dp.owner_references()
        .iter()
        .filter(|r| !(r.controller == Some(true) && r.uid == owner_uid))
        .cloned()
        .collect()
}

/// Claims deployments on behalf of one owning LoadBalancer.
pub struct DeploymentClaimer {
    client: Client,
    owner: LoadBalancer,
    selector: BTreeMap<String, String>,
}

impl DeploymentClaimer {
    /// Create a claimer for `owner`; the owner is deep-copied.
    #[must_use]
    pub fn new(client: Client, owner: &LoadBalancer) -> Self {
        Self {
            client,
            owner: owner.clone(),
            selector: crate::labels::provider_selector(owner),
        }
    }

    /// Resolve the claimed set from cache candidates.
    ///
    /// Already-owned deployments are claimed without an API call. Orphans are
    /// adopted only after one live recheck of the owner per pass; workloads
    /// failing the recheck are excluded, never mutated. Deployments owned by
    /// a foreign controller are skipped.
    ///
    /// # Errors
    ///
    /// [`ClaimError::OwnerGone`]/[`ClaimError::OwnerDeleting`] when the live
    /// recheck disproves the cached owner; [`ClaimError::Api`] on transient
    /// failures, which the caller must surface so the pass is retried.
    pub async fn claim(&self, candidates: Vec<Deployment>) -> Result<Vec<Deployment>, ClaimError> {
        let owner_uid = self.owner.uid().unwrap_or_default();
        let mut claimed = Vec::new();
        let mut live_verified = false;

        for dp in candidates {
            match classify(&owner_uid, &self.selector, &dp) {
                Ownership::Owned => claimed.push(dp),
                Ownership::Foreign | Ownership::Ignore => {}
                Ownership::Release => self.release(&dp, &owner_uid).await?,
                Ownership::Orphan => {
                    if dp.metadata.deletion_timestamp.is_some() {
                        continue;
                    }
                    if !live_verified {
                        self.live_recheck().await?;
                        live_verified = true;
                    }
                    claimed.push(self.adopt(dp).await?);
                }
            }
        }

        Ok(claimed)
    }

    /// Re-read the owner with an uncached GET and verify identity.
    async fn live_recheck(&self) -> Result<(), ClaimError> {
        let namespace = self.owner.namespace().unwrap_or_default();
        let name = self.owner.name_any();
        let expected = self.owner.uid().unwrap_or_default();

        let api: Api<LoadBalancer> = Api::namespaced(self.client.clone(), &namespace);
        let fresh = match api.get(&name).await {
            Ok(fresh) => fresh,
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                return Err(ClaimError::OwnerGone {
                    namespace,
                    name,
                    expected,
                    found: None,
                });
            }
            Err(err) => return Err(ClaimError::Api(err)),
        };

        if fresh.uid() != self.owner.uid() {
            return Err(ClaimError::OwnerGone {
                namespace,
                name,
                expected,
                found: fresh.uid(),
            });
        }
        if fresh.metadata.deletion_timestamp.is_some() {
            return Err(ClaimError::OwnerDeleting { namespace, name });
        }

        Ok(())
    }

    /// Adopt an orphan by patching our controller owner reference onto it.
    async fn adopt(&self, dp: Deployment) -> Result<Deployment, ClaimError> {
        let namespace = dp.namespace().unwrap_or_default();
        let name = dp.name_any();
        info!(deployment = %name, namespace = %namespace, "adopting orphaned provider deployment");

        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &namespace);
        let mut owner_refs = dp.owner_references().to_vec();
        owner_refs.push(build_owner_reference(&self.owner));
        let patch = json!({"metadata": {"ownerReferences": owner_refs}});

        let adopted = api
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(adopted)
    }

    /// Release a deployment we own but that no longer matches the selector.
    async fn release(&self, dp: &Deployment, owner_uid: &str) -> Result<(), ClaimError> {
        let namespace = dp.namespace().unwrap_or_default();
        let name = dp.name_any();
        debug!(deployment = %name, namespace = %namespace, "releasing provider deployment");

        let remaining = retained_owner_references(dp, owner_uid);
        let patch = json!({"metadata": {"ownerReferences": remaining}});

        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &namespace);
        match api
            .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
        {
            Ok(_) => Ok(()),
            // Already gone: releasing is moot.
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(err) => Err(ClaimError::Api(err)),
        }
    }
}

#[cfg(test)]
#[path = "claim_tests.rs"]
mod claim_tests;
