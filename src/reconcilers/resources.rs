// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Desired-state generation for the provider agent workload.
//!
//! [`build_provider_deployment`] maps an owning LoadBalancer to the fully
//! specified Deployment this provider wants to exist. Deterministic except for
//! the randomized name suffix (collision avoidance only) and owner-derived
//! values; the agent image comes from controller configuration.

use crate::constants::{
    API_GROUP_VERSION, CLEANUP_GRACE_PERIOD_SECS, KIND_LOAD_BALANCER, NAME_SUFFIX_LEN,
    PROVIDER_CPU_LIMIT, PROVIDER_CPU_REQUEST, PROVIDER_MEMORY_LIMIT, PROVIDER_MEMORY_REQUEST,
    PROVIDER_NAME, PROVIDER_NAME_SUFFIX, PROVIDER_REPLICAS, TERMINATION_GRACE_PERIOD_SECS,
};
use crate::crd::LoadBalancer;
use crate::labels::provider_selector;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, DeploymentStrategy};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, EnvVarSource, ObjectFieldSelector, PodSpec, PodTemplateSpec,
    ResourceRequirements, Toleration,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    LabelSelector, ObjectMeta, OwnerReference,
};
use kube::api::DeleteParams;
use kube::ResourceExt;
use rand::Rng;
use std::collections::BTreeMap;

/// Characters used for the randomized deployment name suffix
const SUFFIX_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random lowercase alphanumeric suffix of length `len`.
#[must_use]
pub fn rand_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| SUFFIX_CHARSET[rng.gen_range(0..SUFFIX_CHARSET.len())] as char)
        .collect()
}

/// The canonical deployment name prefix for an owner: `<name>-provider-azure`.
#[must_use]
pub fn canonical_prefix(owner_name: &str) -> String {
    format!("{owner_name}{PROVIDER_NAME_SUFFIX}")
}

/// Build the controller owner reference pointing back at the LoadBalancer.
///
/// `controller=true` and `blockOwnerDeletion=true` so platform garbage
/// collection also removes the workload if the owner is deleted outside this
/// controller's control.
#[must_use]
pub fn build_owner_reference(lb: &LoadBalancer) -> OwnerReference {
    OwnerReference {
        api_version: API_GROUP_VERSION.to_string(),
        kind: KIND_LOAD_BALANCER.to_string(),
        name: lb.name_any(),
        uid: lb.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }
}

/// Tolerations letting provider agents schedule onto tainted infrastructure
/// (control-plane) nodes.
#[must_use]
pub fn control_plane_tolerations() -> Vec<Toleration> {
    ["node-role.kubernetes.io/master", "node-role.kubernetes.io/control-plane"]
        .into_iter()
        .map(|key| Toleration {
            key: Some(key.to_string()),
            operator: Some("Exists".to_string()),
            effect: Some("NoSchedule".to_string()),
            ..Default::default()
        })
        .collect()
}

/// Delete parameters for cleanup: cascading foreground delete with a bounded
/// grace period.
#[must_use]
pub fn cleanup_delete_params() -> DeleteParams {
    DeleteParams::foreground().grace_period(CLEANUP_GRACE_PERIOD_SECS)
}

/// Generate the desired provider Deployment for an owning LoadBalancer.
///
/// The name is `<lb>-provider-azure-<rand>`; the update strategy is
/// `Recreate` because the agent cannot run two conflicting instances
/// simultaneously.
#[must_use]
pub fn build_provider_deployment(lb: &LoadBalancer, image: &str) -> Deployment {
    let labels = provider_selector(lb);
    let name = format!("{}-{}", canonical_prefix(&lb.name_any()), rand_suffix(NAME_SUFFIX_LEN));

    Deployment {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: lb.namespace(),
            labels: Some(labels.clone()),
            owner_references: Some(vec![build_owner_reference(lb)]),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(PROVIDER_REPLICAS),
            strategy: Some(DeploymentStrategy {
                type_: Some("Recreate".to_string()),
                ..Default::default()
            }),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(build_agent_pod_spec(lb, image)),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Build the agent pod spec: one container, fixed resources, identity env
/// vars and control-plane tolerations.
fn build_agent_pod_spec(lb: &LoadBalancer, image: &str) -> PodSpec {
    PodSpec {
        termination_grace_period_seconds: Some(TERMINATION_GRACE_PERIOD_SECS),
        tolerations: Some(control_plane_tolerations()),
        containers: vec![Container {
            name: PROVIDER_NAME.to_string(),
            image: Some(image.to_string()),
            image_pull_policy: Some("Always".to_string()),
            resources: Some(ResourceRequirements {
                requests: Some(quantities(&[
                    ("cpu", PROVIDER_CPU_REQUEST),
                    ("memory", PROVIDER_MEMORY_REQUEST),
                ])),
                limits: Some(quantities(&[
                    ("cpu", PROVIDER_CPU_LIMIT),
                    ("memory", PROVIDER_MEMORY_LIMIT),
                ])),
                ..Default::default()
            }),
            env: Some(build_agent_env(lb)),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Identity environment for the agent: its own pod coordinates plus the
/// owning LoadBalancer.
fn build_agent_env(lb: &LoadBalancer) -> Vec<EnvVar> {
    let field_ref = |path: &str| EnvVarSource {
        field_ref: Some(ObjectFieldSelector {
            field_path: path.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };

    vec![
        EnvVar {
            name: "POD_NAME".to_string(),
            value_from: Some(field_ref("metadata.name")),
            ..Default::default()
        },
        EnvVar {
            name: "POD_NAMESPACE".to_string(),
            value_from: Some(field_ref("metadata.namespace")),
            ..Default::default()
        },
        EnvVar {
            name: "LOADBALANCER_NAMESPACE".to_string(),
            value: Some(lb.namespace().unwrap_or_default()),
            ..Default::default()
        },
        EnvVar {
            name: "LOADBALANCER_NAME".to_string(),
            value: Some(lb.name_any()),
            ..Default::default()
        },
    ]
}

fn quantities(pairs: &[(&str, &str)]) -> BTreeMap<String, Quantity> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), Quantity((*v).to_string())))
        .collect()
}

#[cfg(test)]
#[path = "resources_tests.rs"]
mod resources_tests;
