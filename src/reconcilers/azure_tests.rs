// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Unit tests for the azure sync planner and owner resolution.
//!
//! The planner is pure, so the desired-state scenarios (create, converge,
//! duplicate handling, static owners) are covered without a cluster.

use super::*;
use crate::constants::NAME_SUFFIX_LEN;
use crate::context::Stores;
use crate::crd::{AzureProviderSpec, LoadBalancerSpec, ProvidersSpec};
use crate::labels::{provider_selector, ANNOTATION_STATIC, LABEL_KEY_CREATED_BY};
use crate::reconcilers::resources::rand_suffix;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::runtime::reflector::Store;
use kube::runtime::{reflector, watcher};
use std::collections::BTreeMap;

const IMAGE: &str = "azure-agent:v1";

fn make_lb(namespace: &str, name: &str, uid: &str) -> LoadBalancer {
    let mut lb = LoadBalancer::new(
        name,
        LoadBalancerSpec {
            nodes: None,
            providers: ProvidersSpec {
                azure: Some(AzureProviderSpec::default()),
            },
        },
    );
    lb.metadata.namespace = Some(namespace.to_string());
    lb.metadata.uid = Some(uid.to_string());
    lb
}

/// A claimed deployment shaped like the generator output, under a fresh
/// random suffix.
fn claimed_canonical(lb: &LoadBalancer) -> Deployment {
    build_provider_deployment(lb, IMAGE)
}

fn set_replicas(dp: &mut Deployment, replicas: i32) {
    dp.spec.get_or_insert_with(Default::default).replicas = Some(replicas);
}

fn set_image(dp: &mut Deployment, image: &str) {
    dp.spec
        .as_mut()
        .unwrap()
        .template
        .spec
        .as_mut()
        .unwrap()
        .containers[0]
        .image = Some(image.to_string());
}

fn store_with<K>(objects: Vec<K>) -> Store<K>
where
    K: kube::Resource<DynamicType = ()> + Clone + 'static,
{
    let (reader, mut writer) = reflector::store();
    for obj in objects {
        writer.apply_watcher_event(&watcher::Event::Apply(obj));
    }
    reader
}

// ----------------------------------------------------------------------------
// plan_sync
// ----------------------------------------------------------------------------

#[test]
fn test_plan_creates_deployment_when_none_claimed() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let desired = build_provider_deployment(&lb, IMAGE);

    let ops = plan_sync(&lb, &desired, &[]);
    assert_eq!(ops.len(), 1);
    match &ops[0] {
        SyncOp::Create(dp) => {
            assert!(dp.name_any().starts_with("lb1-provider-azure-"));
            assert_eq!(replicas_of(dp), 1);
        }
        other => panic!("expected create, got {other:?}"),
    }
}

#[test]
fn test_plan_is_empty_when_converged() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let desired = build_provider_deployment(&lb, IMAGE);
    let claimed = vec![claimed_canonical(&lb)];

    assert!(plan_sync(&lb, &desired, &claimed).is_empty());
}

#[test]
fn test_plan_updates_drifted_canonical_deployment() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let desired = build_provider_deployment(&lb, IMAGE);

    let mut drifted = claimed_canonical(&lb);
    set_replicas(&mut drifted, 3);
    set_image(&mut drifted, "azure-agent:v0");
    let stale_name = drifted.name_any();

    let ops = plan_sync(&lb, &desired, &[drifted]);
    assert_eq!(ops.len(), 1);
    match &ops[0] {
        SyncOp::Update(dp) => {
            // Converge in place: the existing deployment keeps its name.
            assert_eq!(dp.name_any(), stale_name);
            assert_eq!(replicas_of(dp), 1);
        }
        other => panic!("expected update, got {other:?}"),
    }
}

#[test]
fn test_plan_scales_down_duplicate_canonicals() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let desired = build_provider_deployment(&lb, IMAGE);
    let first = claimed_canonical(&lb);
    let second = claimed_canonical(&lb);
    let second_name = second.name_any();

    let ops = plan_sync(&lb, &desired, &[first, second]);
    assert_eq!(ops.len(), 1);
    match &ops[0] {
        SyncOp::ScaleDown(name) => assert_eq!(*name, second_name),
        other => panic!("expected scale down, got {other:?}"),
    }
}

#[test]
fn test_plan_skips_already_scaled_duplicates() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let desired = build_provider_deployment(&lb, IMAGE);
    let first = claimed_canonical(&lb);
    let mut second = claimed_canonical(&lb);
    set_replicas(&mut second, 0);

    // Second pass over an already-handled duplicate must be a no-op.
    assert!(plan_sync(&lb, &desired, &[first, second]).is_empty());
}

#[test]
fn test_plan_scales_down_claimed_deployment_without_canonical_name() {
    // Adopted via labels but never named by this provider: scale it down and
    // create the canonical instance.
    let lb = make_lb("ns", "lb1", "uid-1");
    let desired = build_provider_deployment(&lb, IMAGE);

    let mut renegade = claimed_canonical(&lb);
    renegade.metadata.name = Some(format!("legacy-{}", rand_suffix(NAME_SUFFIX_LEN)));

    let ops = plan_sync(&lb, &desired, &[renegade]);
    assert_eq!(ops.len(), 2);
    assert!(matches!(&ops[0], SyncOp::ScaleDown(_)));
    assert!(matches!(&ops[1], SyncOp::Create(_)));
}

#[test]
fn test_plan_leaves_static_owner_workload_untouched() {
    let mut lb = make_lb("ns", "lb1", "uid-1");
    lb.metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(ANNOTATION_STATIC.to_string(), "true".to_string());
    let desired = build_provider_deployment(&lb, IMAGE);

    let mut drifted = claimed_canonical(&lb);
    set_replicas(&mut drifted, 5);

    // Drift on the canonical deployment is an operator's business now.
    assert!(plan_sync(&lb, &desired, &[drifted]).is_empty());
}

#[test]
fn test_plan_static_owner_still_scales_down_duplicates() {
    let mut lb = make_lb("ns", "lb1", "uid-1");
    lb.metadata
        .annotations
        .get_or_insert_with(Default::default)
        .insert(ANNOTATION_STATIC.to_string(), "true".to_string());
    let desired = build_provider_deployment(&lb, IMAGE);
    let first = claimed_canonical(&lb);
    let second = claimed_canonical(&lb);

    let ops = plan_sync(&lb, &desired, &[first, second]);
    assert_eq!(ops.len(), 1);
    assert!(matches!(&ops[0], SyncOp::ScaleDown(_)));
}

// ----------------------------------------------------------------------------
// ensure_deployment
// ----------------------------------------------------------------------------

#[test]
fn test_ensure_reports_no_change_for_converged_deployment() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let desired = build_provider_deployment(&lb, IMAGE);
    let current = claimed_canonical(&lb);

    let (_, changed) = ensure_deployment(&desired, &current);
    assert!(!changed);
}

#[test]
fn test_ensure_forces_replicas_and_image() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let desired = build_provider_deployment(&lb, IMAGE);
    let mut current = claimed_canonical(&lb);
    set_replicas(&mut current, 0);
    set_image(&mut current, "azure-agent:v0");

    let (updated, changed) = ensure_deployment(&desired, &current);
    assert!(changed);
    assert_eq!(replicas_of(&updated), 1);
    assert_eq!(
        updated.spec.unwrap().template.spec.unwrap().containers[0]
            .image
            .as_deref(),
        Some(IMAGE)
    );
}

#[test]
fn test_ensure_merges_labels_preserving_unrelated_keys() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let desired = build_provider_deployment(&lb, IMAGE);
    let mut current = claimed_canonical(&lb);
    current
        .metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert("team".to_string(), "networking".to_string());
    current
        .metadata
        .labels
        .as_mut()
        .unwrap()
        .insert(LABEL_KEY_CREATED_BY.to_string(), "stale@ns".to_string());

    let (updated, changed) = ensure_deployment(&desired, &current);
    assert!(changed);
    let labels = updated.metadata.labels.unwrap();
    assert_eq!(labels.get("team").map(String::as_str), Some("networking"));
    assert_eq!(
        labels.get(LABEL_KEY_CREATED_BY).map(String::as_str),
        Some("lb1@ns")
    );
}

// ----------------------------------------------------------------------------
// resolve_owner
// ----------------------------------------------------------------------------

fn owned_deployment(lb: &LoadBalancer) -> Deployment {
    let mut dp = build_provider_deployment(lb, IMAGE);
    dp.metadata.uid = Some("dp-uid".to_string());
    dp
}

fn stores_with(lbs: Vec<LoadBalancer>) -> Stores {
    Stores {
        loadbalancers: store_with(lbs),
        deployments: store_with(vec![]),
    }
}

#[test]
fn test_resolve_owner_via_controller_reference() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let dp = owned_deployment(&lb);
    let stores = stores_with(vec![lb]);

    let owner = resolve_owner(&stores, &dp).unwrap();
    assert_eq!(owner.uid().as_deref(), Some("uid-1"));
}

#[test]
fn test_resolve_owner_falls_back_to_created_by_label() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let selector = provider_selector(&lb);
    let dp = Deployment {
        metadata: ObjectMeta {
            name: Some("orphan".to_string()),
            namespace: Some("ns".to_string()),
            labels: Some(selector),
            ..Default::default()
        },
        ..Default::default()
    };
    let stores = stores_with(vec![lb]);

    let owner = resolve_owner(&stores, &dp).unwrap();
    assert_eq!(owner.name_any(), "lb1");
}

#[test]
fn test_resolve_owner_rejects_stale_controller_reference() {
    // The referenced owner was deleted and recreated: the reference UID no
    // longer matches, and there is no created-by label to fall back on.
    let old = make_lb("ns", "lb1", "uid-old");
    let mut dp = owned_deployment(&old);
    dp.metadata.labels = None;
    let stores = stores_with(vec![make_lb("ns", "lb1", "uid-new")]);

    assert!(resolve_owner(&stores, &dp).is_none());
}

#[test]
fn test_resolve_owner_ignores_label_from_other_namespace() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_KEY_CREATED_BY.to_string(), "lb1@elsewhere".to_string());
    let dp = Deployment {
        metadata: ObjectMeta {
            name: Some("dp".to_string()),
            namespace: Some("ns".to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    };
    let stores = stores_with(vec![lb]);

    assert!(resolve_owner(&stores, &dp).is_none());
}

#[test]
fn test_resolve_owner_none_when_owner_not_cached() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let dp = owned_deployment(&lb);
    let stores = stores_with(vec![]);

    assert!(resolve_owner(&stores, &dp).is_none());
}

#[test]
fn test_owned_deployment_carries_controller_reference() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let dp = owned_deployment(&lb);
    let refs: &[OwnerReference] = dp.owner_references();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].controller, Some(true));
}
