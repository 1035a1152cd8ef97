// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Shared context with reflector stores.
//!
//! All provider plugins receive an `Arc<Context>` carrying the Kubernetes
//! client and the reflector stores for the two watched kinds. The stores are
//! the locally cached, eventually-consistent view of cluster state: reads may
//! lag the API server, and nothing pulled from a store may be mutated in
//! place. Accessors here therefore hand out deep copies (or `Arc`s the caller
//! must clone before changing).

use crate::crd::LoadBalancer;
use crate::labels;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::reflector::Store;
use kube::{Client, ResourceExt};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared context passed to all provider plugins.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations (live reads and mutations)
    pub client: Client,

    /// Reflector stores for the watched kinds
    pub stores: Stores,
}

/// Collection of reflector stores for cross-plugin cache reads.
///
/// Each store is populated by a dedicated reflector task spawned in
/// [`crate::informer::spawn_informers`].
#[derive(Clone)]
pub struct Stores {
    pub loadbalancers: Store<LoadBalancer>,
    pub deployments: Store<Deployment>,
}

impl Stores {
    /// Get a `LoadBalancer` by namespace and name from the cache.
    ///
    /// The returned `Arc` shares the cached object; callers must deep-copy it
    /// before computing any mutation.
    #[must_use]
    pub fn get_loadbalancer(&self, namespace: &str, name: &str) -> Option<Arc<LoadBalancer>> {
        self.loadbalancers
            .state()
            .iter()
            .find(|lb| lb.name_any() == name && lb.namespace().as_deref() == Some(namespace))
            .cloned()
    }

    /// List cached deployments in a namespace whose labels match `selector`.
    ///
    /// Returns owned deep copies so reconcilers can freely mutate them. The
    /// listing may be stale; adoption decisions based on it are re-verified
    /// with a live read by the claim manager.
    #[must_use]
    pub fn deployments_matching(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Vec<Deployment> {
        self.deployments
            .state()
            .iter()
            .filter(|dp| {
                dp.namespace().as_deref() == Some(namespace)
                    && labels::matches_selector(selector, dp.labels())
            })
            .map(|dp| (**dp).clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
