// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Node Provisioning

use cluster_topology::composer::NodeProvisioner;
use cluster_topology::domain::{
    node_label, CoercionPolicy, Diagnostics, IdentifierCoercion, NodeTemplate, Secret,
};
use cluster_topology::report::CreationLedger;
use cluster_topology::MockBackend;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

fn template() -> NodeTemplate {
    NodeTemplate::new("ca-central", "g6-nanode-1", "linode/alpine3.15", Secret::new("pw"), "mock-user")
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
        .block_on(future)
}

proptest! {
    /// K requests yield K distinct labels `{prefix}-{index}` in index order
    #[test]
    fn prop_labels_are_positional(prefix in "[a-z]{1,10}", count in 1usize..32) {
        let backend = Arc::new(MockBackend::new());
        let batch = block_on(async {
            NodeProvisioner::new(backend.clone()).provision(&prefix, count, &template())
        });

        let labels: Vec<String> = batch.nodes.iter().map(|n| n.label.clone()).collect();
        let expected: Vec<String> = (0..count).map(|i| node_label(&prefix, i)).collect();
        prop_assert_eq!(&labels, &expected);
        prop_assert_eq!(labels.iter().collect::<HashSet<_>>().len(), count);
    }

    /// The identifier set holds one entry per successful node, in request order
    #[test]
    fn prop_identifier_set_counts_successes(outcomes in prop::collection::vec(0u8..3, 1..16)) {
        // 0 = succeeds, 1 = fails after acceptance, 2 = refused up front
        let mut backend = MockBackend::new();
        let mut expected = Vec::new();
        for (index, outcome) in outcomes.iter().enumerate() {
            let label = node_label("worker", index);
            let id = 100 + index as u64;
            backend = match outcome {
                0 => {
                    expected.push(id);
                    backend.with_id(&label, &id.to_string())
                }
                1 => backend.fail(&label, "host down"),
                _ => backend.reject(&label, "quota"),
            };
        }
        let backend = Arc::new(backend);

        let resolution = block_on(async {
            NodeProvisioner::new(backend.clone())
                .provision("worker", outcomes.len(), &template())
                .resolve(
                    &IdentifierCoercion::new(CoercionPolicy::Absorb, Diagnostics::new()),
                    &CreationLedger::new(),
                )
                .await
        });

        prop_assert_eq!(resolution.identifier_set().into_vec(), expected.clone());
        prop_assert_eq!(resolution.failures.len(), outcomes.len() - expected.len());
    }
}
