// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Provider plugin contract and registry.
//!
//! Multiple provider implementations share one controller host and are looked
//! up by name. The registry is populated once at process start and read-only
//! afterwards; there is no other static mutable state.

use crate::config::Configuration;
use crate::context::Context;
use crate::crd::LoadBalancer;
use crate::informer::EventHub;
use crate::reconcilers::azure::AzureProvider;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;

/// Lifecycle contract every provider plugin implements.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable provider name used for registry lookup and labels.
    fn name(&self) -> &'static str;

    /// Wire caches, event subscriptions and the work queue. Idempotent; must
    /// not start processing.
    fn init(&self, config: &Configuration, ctx: Arc<Context>, hub: &EventHub);

    /// Start the worker pool and event pumps, block until the stop signal
    /// fires, then drain.
    ///
    /// # Panics
    ///
    /// Panics if called before [`Plugin::init`].
    async fn run(&self, stop: watch::Receiver<bool>);

    /// External trigger (e.g. from an umbrella controller): enqueue the given
    /// owner for reconciliation.
    fn on_sync(&self, lb: &LoadBalancer);
}

/// Init-once, read-many plugin registry keyed by provider name.
pub struct Registry {
    plugins: BTreeMap<&'static str, Arc<dyn Plugin>>,
}

impl Registry {
    fn new() -> Self {
        let mut plugins: BTreeMap<&'static str, Arc<dyn Plugin>> = BTreeMap::new();
        let azure = Arc::new(AzureProvider::new());
        plugins.insert(azure.name(), azure);
        Self { plugins }
    }

    /// Look up a plugin by provider name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.get(name)
    }

    /// Iterate all registered plugins.
    pub fn plugins(&self) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins.values()
    }
}

/// The process-wide registry, built on first access.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::new)
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod provider_tests;
