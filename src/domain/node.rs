// Copyright (c) 2025 - Cowboy AI, Inc.
//! Compute Node Configuration
//!
//! Every node in a group shares one [`NodeTemplate`]; nodes differ only by
//! their positional label.

use serde::{Deserialize, Serialize};

use super::secret::Secret;

/// Label of the node at `index` within a group
///
/// # Examples
///
/// ```rust
/// use cluster_topology::domain::node_label;
///
/// assert_eq!(node_label("worker", 0), "worker-0");
/// ```
pub fn node_label(prefix: &str, index: usize) -> String {
    format!("{prefix}-{index}")
}

/// Purpose of a network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfacePurpose {
    /// Internet-facing interface
    Public,
    /// Private VLAN shared by the cluster
    Vlan,
}

/// Network interface attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub purpose: InterfacePurpose,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,
}

impl NetworkInterface {
    /// Public interface
    pub fn public() -> Self {
        Self {
            purpose: InterfacePurpose::Public,
            label: None,
        }
    }

    /// Private VLAN interface
    pub fn vlan(label: impl Into<String>) -> Self {
        Self {
            purpose: InterfacePurpose::Vlan,
            label: Some(label.into()),
        }
    }
}

/// Name of the private VLAN every node joins
pub const INTERNAL_VLAN: &str = "internal";

/// Shared configuration for a group of nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTemplate {
    pub region: String,
    pub node_type: String,
    pub image: String,
    pub root_pass: Secret,
    pub authorized_users: Vec<String>,
    pub interfaces: Vec<NetworkInterface>,
}

impl NodeTemplate {
    /// Template with one public and one internal VLAN interface
    ///
    /// `principal` is authorised to log in to every node.
    pub fn new(
        region: impl Into<String>,
        node_type: impl Into<String>,
        image: impl Into<String>,
        root_pass: Secret,
        principal: impl Into<String>,
    ) -> Self {
        Self {
            region: region.into(),
            node_type: node_type.into(),
            image: image.into(),
            root_pass,
            authorized_users: vec![principal.into()],
            interfaces: vec![
                NetworkInterface::public(),
                NetworkInterface::vlan(INTERNAL_VLAN),
            ],
        }
    }

    /// Creation arguments for the node named `label`
    pub fn instance_args(&self, label: &str) -> InstanceArgs {
        InstanceArgs {
            node_type: self.node_type.clone(),
            region: self.region.clone(),
            image: self.image.clone(),
            private_ip: true,
            root_pass: self.root_pass.clone(),
            authorized_users: self.authorized_users.clone(),
            interfaces: self.interfaces.clone(),
            label: label.to_string(),
            tags: vec![label.to_string()],
        }
    }
}

/// Node creation request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceArgs {
    #[serde(rename = "type")]
    pub node_type: String,
    pub region: String,
    pub image: String,
    pub private_ip: bool,
    pub root_pass: Secret,
    pub authorized_users: Vec<String>,
    pub interfaces: Vec<NetworkInterface>,
    pub label: String,
    pub tags: Vec<String>,
}
