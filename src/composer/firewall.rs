// Copyright (c) 2025 - Cowboy AI, Inc.
//! Network Policy Composer
//!
//! One firewall, attached uniformly to every provisioned node, with a fixed
//! rule set:
//!
//! | direction | label | protocol | ports | addresses |
//! |---|---|---|---|---|
//! | in  | accept-inbound-SSH     | TCP  | 22      | 0.0.0.0/0 |
//! | in  | control-ingress        | TCP  | 6443    | 0.0.0.0/0 |
//! | in  | TCP-inter-node         | TCP  | 1-65535 | 192.168.0.0/16 |
//! | in  | UDP-inter-node         | UDP  | 1-65535 | 192.168.0.0/16 |
//! | in  | TCP-pods-traffic       | TCP  | 1-65535 | 10.200.0.0/16 |
//! | in  | UDP-pods-traffic       | UDP  | 1-65535 | 10.200.0.0/16 |
//! | in  | ICMP-ingress-for-pings | ICMP |         | 0.0.0.0/0 |
//! | out | ICMP-egress-for-pings  | ICMP |         | 0.0.0.0/0 |
//! | out | TCP-egress             | TCP  | 1-65535 | 0.0.0.0/0 |
//! | out | UDP-egress             | UDP  | 1-65535 | 0.0.0.0/0 |
//!
//! Everything else is dropped in both directions.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::backend::{submit, ProvisioningBackend, ResourceHandle};
use crate::domain::{
    CoercedIdentifierSet, FirewallDevices, FirewallPolicy, FirewallRule, FirewallRules,
    AddressPrefix, NetworkError, NodeId, PortRange, Protocol, ResourceKind, RuleAction,
};
use crate::errors::{OrchestrationResult, TopologyError};
use crate::report::CreationLedger;

/// Private network shared by the nodes
pub const NODE_NETWORK: &str = "192.168.0.0/16";

/// Pod network of the cluster
pub const POD_NETWORK: &str = "10.200.0.0/16";

/// Cluster control-plane API port
pub const CONTROL_PLANE_PORT: u16 = 6443;

/// SSH port
pub const SSH_PORT: u16 = 22;

/// The cluster's fixed firewall rules
pub fn cluster_rules() -> Result<FirewallRules, NetworkError> {
    use Protocol::{Icmp, Tcp, Udp};
    use RuleAction::{Accept, Drop};

    let anywhere = || vec![AddressPrefix::ANY];
    let nodes = vec![NODE_NETWORK.parse::<AddressPrefix>()?];
    let pods = vec![POD_NETWORK.parse::<AddressPrefix>()?];
    let all = Some(PortRange::ALL);

    let inbound = vec![
        FirewallRule::new("accept-inbound-SSH", Accept, Tcp, Some(PortRange::single(SSH_PORT)?), anywhere())?,
        FirewallRule::new(
            "control-ingress",
            Accept,
            Tcp,
            Some(PortRange::single(CONTROL_PLANE_PORT)?),
            anywhere(),
        )?,
        FirewallRule::new("TCP-inter-node", Accept, Tcp, all, nodes.clone())?,
        FirewallRule::new("UDP-inter-node", Accept, Udp, all, nodes)?,
        FirewallRule::new("TCP-pods-traffic", Accept, Tcp, all, pods.clone())?,
        FirewallRule::new("UDP-pods-traffic", Accept, Udp, all, pods)?,
        FirewallRule::new("ICMP-ingress-for-pings", Accept, Icmp, None, anywhere())?,
    ];

    let outbound = vec![
        FirewallRule::new("ICMP-egress-for-pings", Accept, Icmp, None, anywhere())?,
        FirewallRule::new("TCP-egress", Accept, Tcp, all, anywhere())?,
        FirewallRule::new("UDP-egress", Accept, Udp, all, anywhere())?,
    ];

    Ok(FirewallRules {
        inbound_policy: Drop,
        outbound_policy: Drop,
        inbound,
        outbound,
    })
}

/// A created firewall
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirewallHandle {
    pub handle: ResourceHandle,
    pub id: String,
    pub members: Vec<NodeId>,
}

/// Builds the cluster firewall
#[derive(Clone)]
pub struct NetworkPolicyComposer {
    backend: Arc<dyn ProvisioningBackend>,
    label: String,
    tags: Vec<String>,
    ledger: CreationLedger,
}

impl NetworkPolicyComposer {
    /// Create a composer for the firewall named `label`
    pub fn new(
        backend: Arc<dyn ProvisioningBackend>,
        label: impl Into<String>,
        tags: Vec<String>,
        ledger: CreationLedger,
    ) -> Self {
        Self {
            backend,
            label: label.into(),
            tags,
            ledger,
        }
    }

    /// Policy covering exactly `members`
    pub fn policy(&self, members: CoercedIdentifierSet) -> OrchestrationResult<FirewallPolicy> {
        let rules = cluster_rules().map_err(|e| TopologyError::Configuration(e.to_string()))?;

        Ok(FirewallPolicy {
            label: self.label.clone(),
            tags: self.tags.clone(),
            rules,
            devices: FirewallDevices {
                linodes: members.into_vec(),
            },
        })
    }

    /// Create the firewall and wait for it to resolve
    ///
    /// `region` only scopes logging; firewalls are not regional.
    pub async fn compose(
        &self,
        members: CoercedIdentifierSet,
        region: &str,
    ) -> OrchestrationResult<FirewallHandle> {
        let policy = self.policy(members)?;
        let members = policy.members().to_vec();

        let pending = submit(self.backend.as_ref(), ResourceKind::Firewall, &self.label, &policy)
            .map_err(TopologyError::Firewall)?;
        let state = pending
            .state
            .resolve()
            .await
            .map_err(TopologyError::Firewall)?;

        self.ledger.record(&pending.handle, &state.id);
        info!(
            "Firewall '{}' ({}) attached to {} nodes in {}",
            self.label,
            state.id,
            members.len(),
            region
        );

        Ok(FirewallHandle {
            handle: pending.handle,
            id: state.id,
            members,
        })
    }
}
