// Copyright (c) 2025 - Cowboy AI, Inc.
//! End-to-end provisioning runs against the mock backend
//!
//! Each test drives a full orchestrator run and checks what the backend was
//! asked to create, what was exported, and what the run reported.

mod fixtures;

use pretty_assertions::assert_eq;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use cluster_topology::domain::{CoercionPolicy, Diagnostic, ResourceKind};
use cluster_topology::state_machine::TopologyPhase;
use cluster_topology::{BackendError, MockBackend, TopologyError};

use fixtures::*;

#[tokio::test]
async fn test_identifiers_flow_into_firewall_and_pool() {
    let backend = Arc::new(worker_backend());
    let result = orchestrator(&backend, worker_config()).run().await.unwrap();

    assert_eq!(result.identifiers.as_slice(), &[101, 102, 103]);

    let expected: BTreeSet<u64> = [101, 102, 103].into_iter().collect();
    let firewall = single_request(&backend, ResourceKind::Firewall);
    assert_eq!(id_set(&firewall.args["devices"]["linodes"]), expected);

    let pool = single_request(&backend, ResourceKind::NodeBalancerConfig);
    assert_eq!(id_set(&pool.args["members"]), expected);

    assert!(result.identifiers.same_members(&result.firewall.members));
    assert!(result.identifiers.same_members(&result.load_balancer.pool.members));
    assert!(result.diagnostics.is_empty());
    assert!(result.node_failures.is_empty());
}

#[tokio::test]
async fn test_outputs_are_exported() {
    let backend = Arc::new(
        worker_backend()
            .with_id("Firewall", "9")
            .with_id("LoadBalancer", "55")
            .with_id("LoadBalancer-config", "77"),
    );
    let result = orchestrator(&backend, worker_config()).run().await.unwrap();
    let exports = backend.exports();

    assert_eq!(exports["Firewall"], json!("9"));
    assert_eq!(exports["LoadBalancer"], json!(55));
    assert_eq!(exports["LoadBalancer-conf-id"], json!("77"));
    assert_eq!(exports["publicIp"], json!(result.public_ipv4));
    assert_eq!(exports["worker-0"], json!(101));
    assert_eq!(exports["worker-2"], json!(103));
    assert!(!exports.contains_key("CertificateAuthority"));
}

#[tokio::test]
async fn test_node_shape() {
    let backend = Arc::new(worker_backend().with_principal("ops"));
    orchestrator(&backend, worker_config()).run().await.unwrap();

    let nodes = backend.requests_of(ResourceKind::Instance);
    let labels: Vec<_> = nodes.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(labels, vec!["worker-0", "worker-1", "worker-2"]);

    let args = &nodes[1].args;
    assert_eq!(args["type"], "g6-nanode-1");
    assert_eq!(args["region"], REGION);
    assert_eq!(args["image"], "linode/alpine3.15");
    assert_eq!(args["private_ip"], true);
    assert_eq!(args["root_pass"], PASSWORD);
    assert_eq!(args["authorized_users"], json!(["ops"]));
    assert_eq!(args["label"], "worker-1");
    assert_eq!(args["tags"], json!(["worker-1"]));
    assert_eq!(args["interfaces"][1]["label"], "internal");
}

#[tokio::test]
async fn test_groups_are_requested_in_order() {
    let backend = Arc::new(MockBackend::new());
    let mut config = worker_config();
    config.groups = vec!["controller".to_string(), "worker".to_string()];

    let result = orchestrator(&backend, config).run().await.unwrap();

    let labels: Vec<_> = result.nodes.iter().map(|n| n.label.as_str()).collect();
    assert_eq!(
        labels,
        vec!["controller-0", "controller-1", "controller-2", "worker-0", "worker-1", "worker-2"]
    );
    assert_eq!(result.identifiers.len(), 6);
}

#[tokio::test]
async fn test_failed_node_is_omitted_and_reported() {
    let backend = Arc::new(worker_backend().fail("worker-1", "host down"));
    let result = orchestrator(&backend, worker_config()).run().await.unwrap();

    assert_eq!(result.identifiers.as_slice(), &[101, 103]);
    assert_eq!(result.node_failures.len(), 1);
    assert_eq!(result.node_failures[0].label, "worker-1");
    assert!(result.node_failures[0].reason.contains("host down"));

    let firewall = single_request(&backend, ResourceKind::Firewall);
    assert_eq!(firewall.args["devices"]["linodes"], json!([101, 103]));
}

#[tokio::test]
async fn test_malformed_identifier_is_absorbed() {
    let backend = Arc::new(worker_backend().with_id("worker-1", "abc"));
    let result = orchestrator(&backend, worker_config()).run().await.unwrap();

    assert_eq!(result.identifiers.as_slice(), &[101, 0, 103]);
    assert_eq!(result.diagnostics.len(), 1);
    match &result.diagnostics[0] {
        Diagnostic::MalformedIdentifier {
            resource,
            raw,
            substituted,
            ..
        } => {
            assert_eq!(resource, "worker-1");
            assert_eq!(raw, "abc");
            assert_eq!(*substituted, 0);
        }
    }
    assert!(result.node_failures.is_empty());
}

#[tokio::test]
async fn test_strict_policy_drops_malformed_node() {
    let backend = Arc::new(worker_backend().with_id("worker-1", "abc"));
    let mut config = worker_config();
    config.coercion_policy = CoercionPolicy::Strict;

    let result = orchestrator(&backend, config).run().await.unwrap();

    assert_eq!(result.identifiers.as_slice(), &[101, 103]);
    assert!(result.diagnostics.is_empty());
    assert!(matches!(
        result.node_failures[0].error,
        BackendError::MalformedIdentifier { .. }
    ));
}

#[tokio::test]
async fn test_pool_waits_for_balancer_identifier() {
    // the mock rejects any pool config naming an unresolved balancer
    let backend = Arc::new(
        worker_backend()
            .with_id("LoadBalancer", "55")
            .delay("LoadBalancer", Duration::from_millis(50)),
    );
    let result = orchestrator(&backend, worker_config()).run().await.unwrap();

    assert_eq!(result.load_balancer.id, 55);
    let pool = single_request(&backend, ResourceKind::NodeBalancerConfig);
    assert_eq!(pool.args["nodebalancer_id"], 55);
    assert!(backend.is_resolved(ResourceKind::NodeBalancerConfig, "LoadBalancer-config"));

    let order: Vec<_> = backend.requests().into_iter().map(|r| r.kind).collect();
    let balancer_at = order.iter().position(|k| *k == ResourceKind::NodeBalancer).unwrap();
    let pool_at = order.iter().position(|k| *k == ResourceKind::NodeBalancerConfig).unwrap();
    assert!(balancer_at < pool_at);
}

#[tokio::test]
async fn test_balancer_is_composed_while_firewall_is_pending() {
    let backend = Arc::new(worker_backend().delay("Firewall", Duration::from_millis(300)));
    let orchestrator = orchestrator(&backend, worker_config());
    let run = tokio::spawn(async move { orchestrator.run().await });

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.requests_of(ResourceKind::Firewall).len(), 1);
    assert!(!backend.is_resolved(ResourceKind::Firewall, "Firewall"));
    assert_eq!(backend.requests_of(ResourceKind::NodeBalancer).len(), 1);
    assert!(backend.is_resolved(ResourceKind::NodeBalancerConfig, "LoadBalancer-config"));

    let result = run.await.unwrap().unwrap();
    assert!(result.identifiers.same_members(&result.firewall.members));
}

#[tokio::test]
async fn test_failure_report_keeps_node_outcomes() {
    let backend = Arc::new(
        worker_backend()
            .fail("worker-0", "host down")
            .with_id("worker-1", "abc")
            .fail("LoadBalancer", "no capacity"),
    );
    let failure = orchestrator(&backend, worker_config()).run().await.unwrap_err();

    assert!(matches!(failure.error, TopologyError::LoadBalancer(_)));
    assert_eq!(failure.node_failures.len(), 1);
    assert_eq!(failure.node_failures[0].label, "worker-0");
    assert_eq!(failure.diagnostics.len(), 1);
    assert_eq!(failure.transitions.last().map(|t| t.to), Some(TopologyPhase::Failed));
}

#[tokio::test]
async fn test_rerun_creates_nothing_new() {
    let backend = Arc::new(worker_backend());
    let first = orchestrator(&backend, worker_config()).run().await.unwrap();
    let created = backend.created();
    assert_eq!(created.len(), 6);

    let second = orchestrator(&backend, worker_config()).run().await.unwrap();

    assert_eq!(backend.created(), created);
    assert_eq!(backend.reused().len(), 6);
    assert_eq!(first.identifiers, second.identifiers);
    assert_eq!(first.load_balancer.id, second.load_balancer.id);
    assert_ne!(first.run_id, second.run_id);
}

#[tokio::test]
async fn test_no_nodes_fails_before_composing() {
    let backend = Arc::new(
        MockBackend::new()
            .fail("worker-0", "host down")
            .reject("worker-1", "quota")
            .fail("worker-2", "host down"),
    );
    let failure = orchestrator(&backend, worker_config()).run().await.unwrap_err();

    assert_eq!(failure.error, TopologyError::NoNodesProvisioned { failures: 3 });
    assert_eq!(failure.phase, TopologyPhase::NodesResolving);
    assert!(failure.created.is_empty());
    assert_eq!(failure.node_failures.len(), 3);
    assert!(backend.requests_of(ResourceKind::Firewall).is_empty());
    assert!(backend.requests_of(ResourceKind::NodeBalancer).is_empty());
}

#[tokio::test]
async fn test_firewall_failure_reports_created_resources() {
    let backend = Arc::new(worker_backend().fail("Firewall", "limit reached"));
    let failure = orchestrator(&backend, worker_config()).run().await.unwrap_err();

    assert!(matches!(failure.error, TopologyError::Firewall(_)));
    assert_eq!(failure.phase, TopologyPhase::PoliciesComposing);
    assert_eq!(failure.transitions.last().map(|t| t.to), Some(TopologyPhase::Failed));

    let created: BTreeSet<_> = failure.created.iter().map(|r| r.name.as_str()).collect();
    for name in ["worker-0", "worker-1", "worker-2", "LoadBalancer", "LoadBalancer-config"] {
        assert!(created.contains(name), "{name} should be listed");
    }
    assert!(!created.contains("Firewall"));

    let summary = failure.to_string();
    assert!(summary.contains("limit reached"));
    assert!(summary.contains("instance 'worker-1' (id 102)"));
    assert!(backend.exports().get("Firewall").is_none());
}

#[tokio::test]
async fn test_malformed_balancer_identifier_is_fatal() {
    let backend = Arc::new(worker_backend().with_id("LoadBalancer", "nb-1"));
    let failure = orchestrator(&backend, worker_config()).run().await.unwrap_err();

    assert_eq!(
        failure.error,
        TopologyError::LoadBalancer(BackendError::MalformedIdentifier {
            resource: "LoadBalancer".to_string(),
            raw: "nb-1".to_string(),
        })
    );
    assert!(backend.requests_of(ResourceKind::NodeBalancerConfig).is_empty());
}

#[tokio::test]
async fn test_principal_failure_requests_nothing() {
    let backend = Arc::new(worker_backend().without_principal());
    let failure = orchestrator(&backend, worker_config()).run().await.unwrap_err();

    assert!(matches!(failure.error, TopologyError::Principal(_)));
    assert_eq!(failure.phase, TopologyPhase::NodesRequested);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_certificates_are_issued_alongside() {
    let backend = Arc::new(worker_backend());
    let mut config = worker_config();
    config.issue_certificates = true;
    config.cluster_name = "hardos".to_string();

    let result = orchestrator(&backend, config).run().await.unwrap();

    let bundle = result.certificates.expect("certificates issued");
    assert_eq!(backend.exports()["CertificateAuthority"], json!(bundle.ca_cert_pem));
    let ca = single_request(&backend, ResourceKind::SelfSignedCert);
    assert_eq!(ca.args["subject"]["common_name"], "hardos");
}

#[tokio::test]
async fn test_result_serializes_without_secrets() {
    let backend = Arc::new(worker_backend());
    let result = orchestrator(&backend, worker_config()).run().await.unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["identifiers"], json!([101, 102, 103]));
    assert_eq!(json["transitions"].as_array().map(Vec::len), Some(4));
    assert!(!json.to_string().contains(PASSWORD));
}
