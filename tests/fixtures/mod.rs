// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for cluster-topology
//!
//! Deterministic backends and configurations shared by the integration
//! tests. Identifiers are fixed per node label so expectations never depend
//! on request order.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use cluster_topology::backend::ResourceRequest;
use cluster_topology::domain::{NodeId, ResourceKind, Secret};
use cluster_topology::{ClusterConfig, MockBackend, TopologyOrchestrator};

pub const REGION: &str = "ca-central";
pub const PASSWORD: &str = "correct-horse";

/// One group of three workers
pub fn worker_config() -> ClusterConfig {
    let mut config = ClusterConfig::new(Secret::new(PASSWORD));
    config.groups = vec!["worker".to_string()];
    config.region = REGION.to_string();
    config
}

/// Backend resolving `worker-0..2` to `"101"`, `"102"`, `"103"`
pub fn worker_backend() -> MockBackend {
    MockBackend::new()
        .with_id("worker-0", "101")
        .with_id("worker-1", "102")
        .with_id("worker-2", "103")
}

pub fn orchestrator(backend: &Arc<MockBackend>, config: ClusterConfig) -> TopologyOrchestrator {
    TopologyOrchestrator::new(backend.clone(), config)
}

/// The only request of `kind`
pub fn single_request(backend: &MockBackend, kind: ResourceKind) -> ResourceRequest {
    let requests = backend.requests_of(kind);
    assert_eq!(requests.len(), 1, "expected exactly one {kind} request");
    requests.into_iter().next().expect("one request")
}

/// Identifiers in a JSON array, as a set
pub fn id_set(value: &serde_json::Value) -> BTreeSet<NodeId> {
    value
        .as_array()
        .expect("identifier array")
        .iter()
        .map(|id| id.as_u64().expect("numeric identifier"))
        .collect()
}
