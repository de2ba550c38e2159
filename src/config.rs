// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Configuration
//!
//! Everything a provisioning run consumes but does not own: where to
//! provision, how many nodes, what they look like and what the shared
//! resources are called.
//!
//! # Environment
//!
//! | variable | default |
//! |---|---|
//! | `CLUSTER_REGION` | `ca-central` |
//! | `CLUSTER_NODE_TYPE` | `g6-nanode-1` |
//! | `CLUSTER_IMAGE` | `linode/alpine3.15` |
//! | `CLUSTER_NODES_PER_GROUP` | `3` |
//! | `CLUSTER_GROUPS` | `controller,worker` |
//! | `CLUSTER_NODE_PASSWORD` | required |
//! | `CLUSTER_FIREWALL_LABEL` | `Firewall` |
//! | `CLUSTER_FIREWALL_TAGS` | `test` |
//! | `CLUSTER_BALANCER_LABEL` | `LoadBalancer` |
//! | `CLUSTER_CONN_THROTTLE` | `20` |
//! | `CLUSTER_NAME` | `cluster` |
//! | `CLUSTER_ISSUE_CERTIFICATES` | `false` |
//! | `CLUSTER_COERCION_POLICY` | `absorb` |

use serde::Deserialize;
use std::collections::HashSet;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::{CoercionPolicy, NodeTemplate, Secret, MAX_CONN_THROTTLE};

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("{0} is not set")]
    Missing(&'static str),

    /// A variable is set to something unusable
    #[error("{variable} has invalid value '{value}': {reason}")]
    Invalid {
        variable: &'static str,
        value: String,
        reason: String,
    },

    /// The configuration as a whole is unusable
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

fn default_region() -> String {
    "ca-central".to_string()
}

fn default_node_type() -> String {
    "g6-nanode-1".to_string()
}

fn default_image() -> String {
    "linode/alpine3.15".to_string()
}

fn default_nodes_per_group() -> usize {
    3
}

fn default_groups() -> Vec<String> {
    vec!["controller".to_string(), "worker".to_string()]
}

fn default_firewall_label() -> String {
    "Firewall".to_string()
}

fn default_firewall_tags() -> Vec<String> {
    vec!["test".to_string()]
}

fn default_balancer_label() -> String {
    "LoadBalancer".to_string()
}

fn default_conn_throttle() -> u32 {
    crate::domain::DEFAULT_CONN_THROTTLE
}

fn default_cluster_name() -> String {
    "cluster".to_string()
}

/// Configuration of one provisioning run
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_node_type")]
    pub node_type: String,

    #[serde(default = "default_image")]
    pub image: String,

    /// Nodes requested in every group
    #[serde(default = "default_nodes_per_group")]
    pub nodes_per_group: usize,

    /// Label prefixes of the node groups, e.g. `controller` and `worker`
    #[serde(default = "default_groups")]
    pub groups: Vec<String>,

    /// Root password of every node
    pub node_password: Secret,

    #[serde(default = "default_firewall_label")]
    pub firewall_label: String,

    #[serde(default = "default_firewall_tags")]
    pub firewall_tags: Vec<String>,

    #[serde(default = "default_balancer_label")]
    pub balancer_label: String,

    /// New connections per second per client
    #[serde(default = "default_conn_throttle")]
    pub client_conn_throttle: u32,

    /// Common name of the cluster CA
    #[serde(default = "default_cluster_name")]
    pub cluster_name: String,

    #[serde(default)]
    pub issue_certificates: bool,

    #[serde(default)]
    pub coercion_policy: CoercionPolicy,
}

fn parse_var<T>(variable: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        variable,
        reason: e.to_string(),
        value,
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl ClusterConfig {
    /// Defaults with the given node password
    pub fn new(node_password: Secret) -> Self {
        Self {
            region: default_region(),
            node_type: default_node_type(),
            image: default_image(),
            nodes_per_group: default_nodes_per_group(),
            groups: default_groups(),
            node_password,
            firewall_label: default_firewall_label(),
            firewall_tags: default_firewall_tags(),
            balancer_label: default_balancer_label(),
            client_conn_throttle: default_conn_throttle(),
            cluster_name: default_cluster_name(),
            issue_certificates: false,
            coercion_policy: CoercionPolicy::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let password = lookup("CLUSTER_NODE_PASSWORD")
            .ok_or(ConfigError::Missing("CLUSTER_NODE_PASSWORD"))?;
        let mut config = Self::new(Secret::new(password));

        if let Some(region) = lookup("CLUSTER_REGION") {
            config.region = region;
        }
        if let Some(node_type) = lookup("CLUSTER_NODE_TYPE") {
            config.node_type = node_type;
        }
        if let Some(image) = lookup("CLUSTER_IMAGE") {
            config.image = image;
        }
        if let Some(count) = lookup("CLUSTER_NODES_PER_GROUP") {
            config.nodes_per_group = parse_var("CLUSTER_NODES_PER_GROUP", count)?;
        }
        if let Some(groups) = lookup("CLUSTER_GROUPS") {
            config.groups = split_list(&groups);
        }
        if let Some(label) = lookup("CLUSTER_FIREWALL_LABEL") {
            config.firewall_label = label;
        }
        if let Some(tags) = lookup("CLUSTER_FIREWALL_TAGS") {
            config.firewall_tags = split_list(&tags);
        }
        if let Some(label) = lookup("CLUSTER_BALANCER_LABEL") {
            config.balancer_label = label;
        }
        if let Some(throttle) = lookup("CLUSTER_CONN_THROTTLE") {
            config.client_conn_throttle = parse_var("CLUSTER_CONN_THROTTLE", throttle)?;
        }
        if let Some(name) = lookup("CLUSTER_NAME") {
            config.cluster_name = name;
        }
        if let Some(issue) = lookup("CLUSTER_ISSUE_CERTIFICATES") {
            config.issue_certificates = parse_var("CLUSTER_ISSUE_CERTIFICATES", issue)?;
        }
        if let Some(policy) = lookup("CLUSTER_COERCION_POLICY") {
            config.coercion_policy = parse_var("CLUSTER_COERCION_POLICY", policy)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration can describe a cluster
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::Validation("region is empty".to_string()));
        }
        if self.nodes_per_group == 0 {
            return Err(ConfigError::Validation(
                "nodes_per_group must be at least 1".to_string(),
            ));
        }
        if self.groups.is_empty() {
            return Err(ConfigError::Validation("no node groups".to_string()));
        }

        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.trim().is_empty() {
                return Err(ConfigError::Validation("empty group prefix".to_string()));
            }
            if !seen.insert(group.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate group prefix '{group}'"
                )));
            }
        }

        if self.node_password.is_empty() {
            return Err(ConfigError::Validation("node password is empty".to_string()));
        }
        if self.firewall_label.trim().is_empty() || self.balancer_label.trim().is_empty() {
            return Err(ConfigError::Validation(
                "firewall and load balancer labels must be set".to_string(),
            ));
        }
        if self.client_conn_throttle > MAX_CONN_THROTTLE {
            return Err(ConfigError::Validation(format!(
                "client_conn_throttle {} exceeds {}",
                self.client_conn_throttle, MAX_CONN_THROTTLE
            )));
        }
        Ok(())
    }

    /// Node template authorising `principal`
    pub fn template(&self, principal: &str) -> NodeTemplate {
        NodeTemplate::new(
            self.region.clone(),
            self.node_type.clone(),
            self.image.clone(),
            self.node_password.clone(),
            principal,
        )
    }
}
