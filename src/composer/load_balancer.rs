// Copyright (c) 2025 - Cowboy AI, Inc.
//! Load Balancer Composer
//!
//! Creates the public load balancer and, once its identifier is known, the
//! backend pool configuration that points it at the nodes.
//!
//! ```text
//! NodeBalancer "LoadBalancer" ──> Deferred<id>
//!                                      │ and_then (runs only after resolution)
//!                                      ▼
//!                     NodeBalancerConfig "LoadBalancer-config"
//!                       { nodebalancer_id: id, members, leastconn, ... }
//! ```
//!
//! The pool request is never issued with a placeholder identifier: if the
//! load balancer fails or reports an identifier that does not parse, the
//! pool is not requested at all.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::backend::{submit, submit_deferred, ProvisioningBackend, ResourceHandle};
use crate::deferred::Deferred;
use crate::domain::{
    parse_identifier, BackendPoolConfig, CoercedIdentifierSet, NodeBalancerArgs, NodeId,
    ResourceKind,
};
use crate::errors::{BackendError, OrchestrationResult, TopologyError};
use crate::report::CreationLedger;

/// Name of the pool configuration belonging to load balancer `label`
pub fn pool_name(label: &str) -> String {
    format!("{label}-config")
}

/// A created backend pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendPoolHandle {
    pub handle: ResourceHandle,
    pub id: String,
    pub members: Vec<NodeId>,
}

/// A created load balancer with its pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadBalancerHandle {
    pub handle: ResourceHandle,
    pub id: NodeId,
    pub public_ipv4: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub pool: BackendPoolHandle,
}

/// Builds the load balancer and its backend pool
#[derive(Clone)]
pub struct LoadBalancerComposer {
    backend: Arc<dyn ProvisioningBackend>,
    label: String,
    conn_throttle: u32,
    ledger: CreationLedger,
}

impl LoadBalancerComposer {
    /// Create a composer for the load balancer named `label`
    pub fn new(
        backend: Arc<dyn ProvisioningBackend>,
        label: impl Into<String>,
        conn_throttle: u32,
        ledger: CreationLedger,
    ) -> Self {
        Self {
            backend,
            label: label.into(),
            conn_throttle,
            ledger,
        }
    }

    /// Create the load balancer, then its pool over `members`
    pub async fn compose(
        &self,
        members: CoercedIdentifierSet,
        region: &str,
    ) -> OrchestrationResult<LoadBalancerHandle> {
        let args = NodeBalancerArgs {
            label: self.label.clone(),
            region: region.to_string(),
            client_conn_throttle: self.conn_throttle,
        };
        let balancer = submit(self.backend.as_ref(), ResourceKind::NodeBalancer, &self.label, &args)
            .map_err(TopologyError::LoadBalancer)?;

        // the balancer id feeds another request, so it is never substituted
        let resource = self.label.clone();
        let balancer_id: Deferred<NodeId> = balancer.id().try_map(move |raw| {
            parse_identifier(&raw).map_err(|_| BackendError::MalformedIdentifier { resource, raw })
        });

        let members = members.into_vec();
        let pool = {
            let backend = self.backend.clone();
            let name = pool_name(&self.label);
            let members = members.clone();
            balancer_id.and_then(move |id| {
                let config = BackendPoolConfig::cluster_default(id, members);
                submit_deferred(backend.as_ref(), ResourceKind::NodeBalancerConfig, &name, &config)
            })
        };

        let state = balancer
            .state
            .resolve()
            .await
            .map_err(TopologyError::LoadBalancer)?;
        self.ledger.record(&balancer.handle, &state.id);

        let id = balancer_id.resolve().await.map_err(TopologyError::LoadBalancer)?;

        let pool_state = pool.resolve().await.map_err(TopologyError::BackendPool)?;
        let pool_handle = ResourceHandle::new(ResourceKind::NodeBalancerConfig, pool_name(&self.label));
        self.ledger.record(&pool_handle, &pool_state.id);

        let public_ipv4 = state
            .require_str(&self.label, "ipv4")
            .map_err(TopologyError::LoadBalancer)?;
        let hostname = state.attribute_str("hostname").map(str::to_string);

        info!(
            "Load balancer '{}' ({}) at {} balancing {} nodes",
            self.label,
            id,
            public_ipv4,
            members.len()
        );

        Ok(LoadBalancerHandle {
            handle: balancer.handle,
            id,
            public_ipv4,
            hostname,
            pool: BackendPoolHandle {
                handle: pool_handle,
                id: pool_state.id,
                members,
            },
        })
    }
}
