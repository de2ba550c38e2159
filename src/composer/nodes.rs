// Copyright (c) 2025 - Cowboy AI, Inc.
//! Node Provisioner
//!
//! Requests a group of identically configured nodes labelled
//! `{prefix}-{index}` and collects their deferred identifiers.
//!
//! ```text
//! provision("worker", 3)
//!   ├── worker-0 ──> Deferred<"101">
//!   ├── worker-1 ──> Deferred<Err>        (kept, reported as a failure)
//!   └── worker-2 ──> Deferred<"103">
//!
//! resolve() ──> nodes [worker-0: 101, worker-2: 103], failures [worker-1]
//! ```

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{submit, PendingResource, ProvisioningBackend, ResourceHandle};
use crate::deferred::{join_settled, Deferred};
use crate::domain::{
    node_label, CoercedIdentifierSet, IdentifierCoercion, NodeId, NodeTemplate, ResourceKind,
};
use crate::errors::BackendError;
use crate::report::CreationLedger;

/// A node whose creation has been requested
#[derive(Debug, Clone)]
pub struct Node {
    pub label: String,
    pub resource: PendingResource,
}

impl Node {
    /// Deferred textual identifier
    pub fn id(&self) -> Deferred<String> {
        self.resource.id()
    }
}

/// A node whose creation did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    pub label: String,
    pub reason: String,
    #[serde(skip)]
    pub error: BackendError,
}

impl NodeFailure {
    fn new(label: impl Into<String>, error: BackendError) -> Self {
        Self {
            label: label.into(),
            reason: error.to_string(),
            error,
        }
    }
}

/// A node with its coerced numeric identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNode {
    pub label: String,
    pub id: NodeId,
    pub handle: ResourceHandle,
}

/// Nodes requested together
///
/// Requests refused up front are already failures; accepted requests are
/// pending until [`NodeBatch::resolve`].
#[derive(Debug, Clone, Default)]
pub struct NodeBatch {
    pub nodes: Vec<Node>,
    pub rejected: Vec<NodeFailure>,
}

impl NodeBatch {
    /// Append another batch, keeping request order
    pub fn extend(&mut self, other: NodeBatch) {
        self.nodes.extend(other.nodes);
        self.rejected.extend(other.rejected);
    }

    /// Number of nodes requested
    pub fn requested(&self) -> usize {
        self.nodes.len() + self.rejected.len()
    }

    /// Wait for every pending identifier and coerce it
    ///
    /// Order of the resolved nodes follows request order; failed nodes are
    /// left out of it and reported alongside. Every node the backend created
    /// is recorded in `ledger`.
    pub async fn resolve(
        self,
        coercion: &IdentifierCoercion,
        ledger: &CreationLedger,
    ) -> IdentifierResolution {
        debug!(
            "Resolving {} node identifiers ({:?} coercion)",
            self.nodes.len(),
            coercion.policy()
        );
        let coerced: Vec<Deferred<NodeId>> = self
            .nodes
            .iter()
            .map(|node| coercion.coerce(&node.label, &node.id()))
            .collect();

        let outcomes = join_settled(coerced).resolve().await.unwrap_or_default();

        let mut resolution = IdentifierResolution {
            nodes: Vec::with_capacity(self.nodes.len()),
            failures: self.rejected,
        };

        for (node, outcome) in self.nodes.into_iter().zip(outcomes) {
            // created at the backend even if its identifier is unusable
            if let Some(Ok(state)) = node.resource.state.peek() {
                ledger.record(&node.resource.handle, &state.id);
            }

            match outcome {
                Ok(id) => {
                    info!("Node '{}' resolved to {}", node.label, id);
                    resolution.nodes.push(ResolvedNode {
                        label: node.label,
                        id,
                        handle: node.resource.handle,
                    });
                }
                Err(err) => {
                    warn!("Node '{}' failed: {}", node.label, err);
                    resolution.failures.push(NodeFailure::new(node.label, err));
                }
            }
        }

        resolution
    }
}

/// Resolved nodes and the failures encountered getting there
#[derive(Debug, Clone, Default)]
pub struct IdentifierResolution {
    pub nodes: Vec<ResolvedNode>,
    pub failures: Vec<NodeFailure>,
}

impl IdentifierResolution {
    /// Coerced identifiers of every resolved node, in request order
    pub fn identifier_set(&self) -> CoercedIdentifierSet {
        CoercedIdentifierSet::new(self.nodes.iter().map(|node| node.id).collect())
    }
}

/// Issues node creation requests
#[derive(Clone)]
pub struct NodeProvisioner {
    backend: Arc<dyn ProvisioningBackend>,
}

impl NodeProvisioner {
    /// Create a provisioner on `backend`
    pub fn new(backend: Arc<dyn ProvisioningBackend>) -> Self {
        Self { backend }
    }

    /// Request `count` nodes labelled `{prefix}-0` .. `{prefix}-{count-1}`
    ///
    /// Requests are issued back to back without waiting on one another. A
    /// refused request does not stop the remaining ones.
    pub fn provision(&self, prefix: &str, count: usize, template: &NodeTemplate) -> NodeBatch {
        let mut batch = NodeBatch::default();

        for index in 0..count {
            let label = node_label(prefix, index);
            let args = template.instance_args(&label);

            match submit(self.backend.as_ref(), ResourceKind::Instance, &label, &args) {
                Ok(resource) => batch.nodes.push(Node { label, resource }),
                Err(err) => {
                    warn!("Node '{}' refused: {}", label, err);
                    batch.rejected.push(NodeFailure::new(label, err));
                }
            }
        }

        info!(
            "Requested {} '{}' nodes ({} refused)",
            count,
            prefix,
            batch.rejected.len()
        );
        batch
    }
}
