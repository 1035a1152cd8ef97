// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Change notification source: reflectors plus event fan-out.
//!
//! This is the boundary to the watch machinery. For each watched kind a
//! reflector task keeps a [`Store`] warm and rebroadcasts add/update/delete
//! notifications on a `tokio::sync::broadcast` channel. Plugins subscribe in
//! `run` and turn notifications into work queue entries; delivery is
//! non-blocking for the watch stream (lagging subscribers drop the oldest
//! events, which is safe because reconciliation is level-triggered).

use crate::context::Stores;
use crate::crd::LoadBalancer;
use k8s_openapi::api::apps::v1::Deployment;
use kube::runtime::reflector::Store;
use kube::runtime::{reflector, watcher, WatchStreamExt};
use kube::{Api, Client};
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

/// Buffer size for the LoadBalancer event channel
const LB_EVENT_BUFFER: usize = 256;

/// Buffer size for the Deployment event channel (higher churn)
const DEPLOYMENT_EVENT_BUFFER: usize = 1024;

/// A change notification for one cached object.
///
/// `Applied` covers both add and update; the cached snapshot travels with the
/// event so handlers never have to re-fetch just to filter.
#[derive(Debug)]
pub enum ObjectEvent<K> {
    Applied(Arc<K>),
    Deleted(Arc<K>),
}

impl<K> Clone for ObjectEvent<K> {
    fn clone(&self) -> Self {
        match self {
            ObjectEvent::Applied(obj) => ObjectEvent::Applied(Arc::clone(obj)),
            ObjectEvent::Deleted(obj) => ObjectEvent::Deleted(Arc::clone(obj)),
        }
    }
}

/// Fan-out of change notifications for the two watched kinds.
///
/// Plugins keep a sender clone from `init` and subscribe fresh receivers when
/// `run` starts, so `init` never begins processing.
#[derive(Clone)]
pub struct EventHub {
    pub loadbalancers: broadcast::Sender<ObjectEvent<LoadBalancer>>,
    pub deployments: broadcast::Sender<ObjectEvent<Deployment>>,
}

/// Start the reflectors for both watched kinds and return their stores plus
/// the event hub. The reflector tasks run for the lifetime of the process and
/// restart their watches with backoff on stream errors.
#[must_use]
pub fn spawn_informers(client: &Client) -> (Stores, EventHub) {
    let (lb_tx, _) = broadcast::channel(LB_EVENT_BUFFER);
    let (dp_tx, _) = broadcast::channel(DEPLOYMENT_EVENT_BUFFER);

    let loadbalancers = spawn_reflector(Api::<LoadBalancer>::all(client.clone()), lb_tx.clone());
    let deployments = spawn_reflector(Api::<Deployment>::all(client.clone()), dp_tx.clone());

    (
        Stores {
            loadbalancers,
            deployments,
        },
        EventHub {
            loadbalancers: lb_tx,
            deployments: dp_tx,
        },
    )
}

/// Spawn a reflector task for one kind: populate the store and rebroadcast
/// every apply/delete to the hub.
fn spawn_reflector<K>(api: Api<K>, tx: broadcast::Sender<ObjectEvent<K>>) -> Store<K>
where
    K: kube::Resource<DynamicType = ()>
        + Clone
        + Debug
        + serde::de::DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    let (reader, writer) = reflector::store();

    tokio::spawn(async move {
        let stream = reflector(
            writer,
            watcher(api, watcher::Config::default()).default_backoff(),
        );
        futures::pin_mut!(stream);

        use futures::StreamExt;
        while let Some(event) = stream.next().await {
            match event {
                Ok(watcher::Event::Apply(obj) | watcher::Event::InitApply(obj)) => {
                    // Send fails only when no plugin is subscribed yet.
                    let _ = tx.send(ObjectEvent::Applied(Arc::new(obj)));
                }
                Ok(watcher::Event::Delete(obj)) => {
                    let _ = tx.send(ObjectEvent::Deleted(Arc::new(obj)));
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %err, "watch stream error, retrying with backoff");
                }
            }
        }
    });

    reader
}
