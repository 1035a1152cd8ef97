// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Unit tests for the reflector store accessors.

use super::*;
use crate::crd::{LoadBalancerSpec, ProvidersSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::reflector;
use kube::runtime::watcher;

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

fn make_lb(namespace: &str, name: &str, uid: &str) -> LoadBalancer {
    let mut lb = LoadBalancer::new(
        name,
        LoadBalancerSpec {
            nodes: None,
            providers: ProvidersSpec::default(),
        },
    );
    lb.metadata.namespace = Some(namespace.to_string());
    lb.metadata.uid = Some(uid.to_string());
    lb
}

fn make_deployment(namespace: &str, name: &str, labels: BTreeMap<String, String>) -> Deployment {
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn stores(lbs: Vec<LoadBalancer>, dps: Vec<Deployment>) -> Stores {
    Stores {
        loadbalancers: store_with(lbs),
        deployments: store_with(dps),
    }
}

#[test]
fn test_get_loadbalancer_by_namespace_and_name() {
    let stores = stores(
        vec![make_lb("ns-a", "lb1", "uid-a"), make_lb("ns-b", "lb1", "uid-b")],
        vec![],
    );

    let found = stores.get_loadbalancer("ns-a", "lb1").unwrap();
    assert_eq!(found.uid().as_deref(), Some("uid-a"));

    assert!(stores.get_loadbalancer("ns-a", "lb2").is_none());
    assert!(stores.get_loadbalancer("ns-c", "lb1").is_none());
}

#[test]
fn test_deployments_matching_filters_namespace_and_selector() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let selector = labels::provider_selector(&lb);

    let mut extra = selector.clone();
    extra.insert("app".to_string(), "custom".to_string());

    let stores = stores(
        vec![],
        vec![
            make_deployment("ns", "match-exact", selector.clone()),
            make_deployment("ns", "match-superset", extra),
            make_deployment("other", "wrong-namespace", selector.clone()),
            make_deployment("ns", "no-labels", BTreeMap::new()),
        ],
    );

    let mut names: Vec<String> = stores
        .deployments_matching("ns", &selector)
        .iter()
        .map(ResourceExt::name_any)
        .collect();
    names.sort();
    assert_eq!(names, vec!["match-exact", "match-superset"]);
}

#[test]
fn test_deployments_matching_returns_deep_copies() {
    let lb = make_lb("ns", "lb1", "uid-1");
    let selector = labels::provider_selector(&lb);
    let stores = stores(vec![], vec![make_deployment("ns", "dp", selector.clone())]);

    let mut copy = stores.deployments_matching("ns", &selector).remove(0);
    copy.metadata.labels = None;

    // Mutating the copy must not leak into the cache.
    assert_eq!(stores.deployments_matching("ns", &selector).len(), 1);
}
