// Copyright (c) 2026 the loadbalancer-provider authors
// SPDX-License-Identifier: MIT

//! Kubernetes controller managing provider agent workloads for `LoadBalancer`
//! custom resources.
//!
//! Each provider plugin watches LoadBalancers and the Deployments it manages,
//! funnels change notifications through a deduplicating work queue, and drives
//! the cluster toward one running agent deployment per LoadBalancer that
//! requests the provider. Ownership is expressed twice: controller owner
//! references (authoritative) and provider/created-by labels (selection),
//! reconciled by the claim manager.

pub mod backoff;
pub mod config;
pub mod constants;
pub mod context;
pub mod crd;
pub mod informer;
pub mod labels;
pub mod metrics;
pub mod provider;
pub mod queue;
pub mod reconcilers;
