// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Azure provider plugin: reconciles provider agent deployments.
//!
//! One reconciliation pass is level-triggered and idempotent: it claims the
//! deployments belonging to the owning LoadBalancer, compares them against the
//! generated desired state and applies the difference. Exactly one canonical
//! deployment (name prefixed `<lb>-provider-azure`) is kept running; claimed
//! duplicates are scaled to zero rather than deleted so an operator can
//! inspect them.

use crate::config::Configuration;
use crate::constants::PROVIDER_NAME;
use crate::context::Context;
use crate::crd::{validate_loadbalancer, LoadBalancer};
use crate::informer::{EventHub, ObjectEvent};
use crate::labels::{self, is_static, matches_provider_label};
use crate::metrics;
use crate::provider::Plugin;
use crate::queue::SyncQueue;
use crate::reconcilers::claim::{ClaimError, DeploymentClaimer};
use crate::reconcilers::resources::{
    build_provider_deployment, canonical_prefix, cleanup_delete_params,
};
use crate::reconcilers::status;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, ResourceExt};
use serde_json::json;
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// The azure provider plugin.
///
/// Constructed empty by the registry; all runtime state is wired in `init`.
pub struct AzureProvider {
    inner: OnceLock<Inner>,
}

struct Inner {
    image: String,
    workers: usize,
    ctx: Arc<Context>,
    queue: SyncQueue<LoadBalancer>,
    deployment_events: broadcast::Sender<ObjectEvent<Deployment>>,
}

impl AzureProvider {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }
}

impl Default for AzureProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for AzureProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn init(&self, config: &Configuration, ctx: Arc<Context>, hub: &EventHub) {
        if self.inner.get().is_some() {
            debug!("azure provider already initialized");
            return;
        }
        info!(image = %config.azure_image, "initializing azure provider");

        let queue = {
            let ctx = Arc::clone(&ctx);
            let image = config.azure_image.clone();
            SyncQueue::new(
                |lb: &LoadBalancer| {
                    format!("{}/{}", lb.namespace().unwrap_or_default(), lb.name_any())
                },
                move |lb| sync_load_balancer(Arc::clone(&ctx), image.clone(), lb),
            )
        };

        let _ = self.inner.set(Inner {
            image: config.azure_image.clone(),
            workers: config.workers,
            ctx,
            queue,
            deployment_events: hub.deployments.clone(),
        });
    }

    async fn run(&self, mut stop: watch::Receiver<bool>) {
        let inner = self
            .inner
            .get()
            .expect("azure provider must be initialized before running");
        info!(image = %inner.image, workers = inner.workers, "starting azure provider");

        inner.queue.run(inner.workers);
        let pump = spawn_deployment_pump(
            inner.deployment_events.subscribe(),
            Arc::clone(&inner.ctx),
            inner.queue.clone(),
        );

        while !*stop.borrow() {
            if stop.changed().await.is_err() {
                break;
            }
        }

        info!("stopping azure provider");
        pump.abort();
        inner.queue.shut_down().await;
    }

    fn on_sync(&self, lb: &LoadBalancer) {
        let Some(inner) = self.inner.get() else {
            warn!("azure provider not initialized, dropping sync trigger");
            return;
        };
        debug!(
            lb = %lb.name_any(),
            namespace = %lb.namespace().unwrap_or_default(),
            "sync triggered"
        );
        inner.queue.enqueue(lb.clone());
    }
}

/// Turn deployment change notifications into sync triggers for their owning
/// LoadBalancers. Events for workloads of other providers are discarded.
fn spawn_deployment_pump(
    mut rx: broadcast::Receiver<ObjectEvent<Deployment>>,
    ctx: Arc<Context>,
    queue: SyncQueue<LoadBalancer>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Level-triggered reconciliation tolerates missed events;
                    // the next change for each owner re-triggers.
                    warn!(skipped, "deployment event stream lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return,
            };

            let dp = match &event {
                ObjectEvent::Applied(dp) | ObjectEvent::Deleted(dp) => dp,
            };
            if !matches_provider_label(dp.labels()) {
                continue;
            }
            if let Some(lb) = resolve_owner(&ctx.stores, dp) {
                queue.enqueue(lb);
            }
        }
    })
}

/// Resolve the owning LoadBalancer of a managed deployment from the cache.
///
/// The controller owner reference wins; the created-by label is the fallback
/// for orphans awaiting adoption. A stale reference (owner replaced, UID
/// mismatch) resolves to nothing.
pub(crate) fn resolve_owner(stores: &crate::context::Stores, dp: &Deployment) -> Option<LoadBalancer> {
    let namespace = dp.namespace().unwrap_or_default();

    let by_ref = dp
        .owner_references()
        .iter()
        .find(|r| r.controller == Some(true) && r.kind == crate::constants::KIND_LOAD_BALANCER)
        .and_then(|r| {
            let lb = stores.get_loadbalancer(&namespace, &r.name)?;
            (lb.uid().as_deref() == Some(r.uid.as_str())).then_some(lb)
        });
    if let Some(lb) = by_ref {
        return Some((*lb).clone());
    }

    let created_by = dp.labels().get(labels::LABEL_KEY_CREATED_BY)?;
    let (name, label_ns) = created_by.split_once('@')?;
    if label_ns != namespace {
        return None;
    }
    stores
        .get_loadbalancer(&namespace, name)
        .map(|lb| (*lb).clone())
}

/// One reconciliation pass for an owning LoadBalancer; queue handler.
pub(crate) async fn sync_load_balancer(
    ctx: Arc<Context>,
    image: String,
    lb: LoadBalancer,
) -> anyhow::Result<()> {
    let result = sync_inner(&ctx, &image, lb).await;
    metrics::record_sync(PROVIDER_NAME, result.is_ok());
    result
}

async fn sync_inner(ctx: &Context, image: &str, lb: LoadBalancer) -> anyhow::Result<()> {
    let namespace = lb.namespace().unwrap_or_default();
    let name = lb.name_any();
    let key = format!("{namespace}/{name}");
    let start = std::time::Instant::now();
    debug!(lb = %key, "syncing azure provider");

    validate_loadbalancer(&lb)?;

    // Re-read from the cache: the queued snapshot may already be outdated.
    let Some(fresh) = ctx.stores.get_loadbalancer(&namespace, &name) else {
        info!(lb = %key, "LoadBalancer deleted, cleaning up provider deployments");
        return cleanup(ctx, &lb, false).await;
    };
    if fresh.uid() != lb.uid() {
        // The owner was deleted and recreated under the same name; the new
        // object's own events drive it.
        debug!(lb = %key, "cached LoadBalancer is a different instance, skipping pass");
        return Ok(());
    }
    let lb = (*fresh).clone();

    if lb.spec.providers.azure.is_none() {
        info!(lb = %key, "azure provider no longer requested, cleaning up");
        return cleanup(ctx, &lb, true).await;
    }

    let claimed = match claimed_deployments(ctx, &lb).await {
        Ok(claimed) => claimed,
        Err(err @ (ClaimError::OwnerGone { .. } | ClaimError::OwnerDeleting { .. })) => {
            // Lost a race with a concurrent owner deletion; the delete event
            // triggers cleanup.
            debug!(lb = %key, error = %err, "owner vanished during claim, skipping pass");
            return Ok(());
        }
        Err(ClaimError::Api(err)) => return Err(err.into()),
    };

    if lb.metadata.deletion_timestamp.is_some() {
        debug!(lb = %key, "LoadBalancer is being deleted, leaving workloads to garbage collection");
        return Ok(());
    }

    sync_deployments(ctx, &lb, &claimed, image).await?;
    debug!(lb = %key, elapsed = ?start.elapsed(), "finished syncing azure provider");
    Ok(())
}

/// List cache candidates by selector and resolve the claimed set.
async fn claimed_deployments(
    ctx: &Context,
    lb: &LoadBalancer,
) -> Result<Vec<Deployment>, ClaimError> {
    let selector = labels::provider_selector(lb);
    let candidates = ctx
        .stores
        .deployments_matching(&lb.namespace().unwrap_or_default(), &selector);
    DeploymentClaimer::new(ctx.client.clone(), lb)
        .claim(candidates)
        .await
}

/// A single mutation the reconciler wants applied.
#[derive(Clone, Debug)]
pub(crate) enum SyncOp {
    Create(Deployment),
    Update(Deployment),
    ScaleDown(String),
}

/// Compute the mutations needed to converge the claimed set on the desired
/// state. Pure; returns no ops when everything already converged.
///
/// The first claimed deployment carrying the canonical name prefix is kept as
/// the provider instance; every other claimed deployment is scaled to zero.
/// Static owners keep their canonical deployment untouched.
pub(crate) fn plan_sync(
    lb: &LoadBalancer,
    desired: &Deployment,
    claimed: &[Deployment],
) -> Vec<SyncOp> {
    let prefix = canonical_prefix(&lb.name_any());
    let static_owner = is_static(lb);
    let mut found_canonical = false;
    let mut ops = Vec::new();

    for dp in claimed {
        let name = dp.name_any();
        if found_canonical || !name.starts_with(&prefix) {
            if replicas_of(dp) != 0 {
                ops.push(SyncOp::ScaleDown(name));
            }
            continue;
        }

        found_canonical = true;
        if static_owner {
            continue;
        }
        let (updated, changed) = ensure_deployment(desired, dp);
        if changed {
            ops.push(SyncOp::Update(updated));
        }
    }

    if !found_canonical {
        ops.push(SyncOp::Create(desired.clone()));
    }
    ops
}

/// Overlay the desired labels, replica count and agent image onto an existing
/// deployment, preserving everything else (including unrelated labels). Pure;
/// returns the merged object and whether anything changed.
pub(crate) fn ensure_deployment(desired: &Deployment, current: &Deployment) -> (Deployment, bool) {
    let mut updated = current.clone();

    if let Some(desired_labels) = &desired.metadata.labels {
        let merged = updated.metadata.labels.get_or_insert_with(Default::default);
        for (k, v) in desired_labels {
            merged.insert(k.clone(), v.clone());
        }
    }

    let spec = updated.spec.get_or_insert_with(Default::default);
    spec.replicas = Some(replicas_of(desired));
    if let (Some(image), Some(pod)) = (image_of(desired), spec.template.spec.as_mut()) {
        if let Some(container) = pod.containers.first_mut() {
            container.image = Some(image);
        }
    }

    let changed = updated.metadata.labels != current.metadata.labels
        || replicas_of(&updated) != replicas_of(current)
        || image_of(&updated) != image_of(current);
    (updated, changed)
}

pub(crate) fn replicas_of(dp: &Deployment) -> i32 {
    dp.spec.as_ref().and_then(|s| s.replicas).unwrap_or(0)
}

fn image_of(dp: &Deployment) -> Option<String> {
    dp.spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()?
        .image
        .clone()
}

/// Apply the planned mutations. Scale-downs of duplicates are best effort and
/// never fail the pass; create/update failures propagate for retry.
async fn sync_deployments(
    ctx: &Context,
    lb: &LoadBalancer,
    claimed: &[Deployment],
    image: &str,
) -> anyhow::Result<()> {
    let desired = build_provider_deployment(lb, image);
    let ops = plan_sync(lb, &desired, claimed);
    if ops.is_empty() {
        debug!(lb = %lb.name_any(), "provider deployment already in desired state");
        return Ok(());
    }

    let api: Api<Deployment> = Api::namespaced(
        ctx.client.clone(),
        &lb.namespace().unwrap_or_default(),
    );
    for op in ops {
        match op {
            SyncOp::ScaleDown(name) => {
                info!(deployment = %name, "scaling duplicate provider deployment to zero");
                let patch = json!({"spec": {"replicas": 0}});
                match api
                    .patch(&name, &PatchParams::default(), &Patch::Merge(&patch))
                    .await
                {
                    Ok(_) => metrics::record_workload_mutation(PROVIDER_NAME, "scale_down"),
                    Err(err) => {
                        warn!(deployment = %name, error = %err,
                            "failed to scale down duplicate provider deployment");
                    }
                }
            }
            SyncOp::Update(dp) => {
                info!(deployment = %dp.name_any(), "updating provider deployment");
                api.replace(&dp.name_any(), &PostParams::default(), &dp)
                    .await?;
                metrics::record_workload_mutation(PROVIDER_NAME, "update");
            }
            SyncOp::Create(dp) => {
                info!(deployment = %dp.name_any(), "creating provider deployment");
                api.create(&PostParams::default(), &dp).await?;
                metrics::record_workload_mutation(PROVIDER_NAME, "create");
            }
        }
    }
    Ok(())
}

/// Delete every claimed deployment of the owner with a cascading foreground
/// delete, optionally clearing the provider status afterwards. Idempotent:
/// already-gone deployments count as deleted.
pub(crate) async fn cleanup(
    ctx: &Context,
    lb: &LoadBalancer,
    clear_status: bool,
) -> anyhow::Result<()> {
    let claimed = claimed_deployments(ctx, lb).await?;

    let api: Api<Deployment> =
        Api::namespaced(ctx.client.clone(), &lb.namespace().unwrap_or_default());
    for dp in claimed {
        let name = dp.name_any();
        info!(deployment = %name, "deleting provider deployment");
        match api.delete(&name, &cleanup_delete_params()).await {
            Ok(_) => metrics::record_workload_mutation(PROVIDER_NAME, "delete"),
            Err(kube::Error::Api(ae)) if ae.code == 404 => {}
            Err(err) => return Err(err.into()),
        }
    }

    if clear_status {
        status::clear_provider_status(&ctx.client, lb).await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "azure_tests.rs"]
mod azure_tests;
