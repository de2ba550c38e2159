// Copyright (c) 2025 - Cowboy AI, Inc.
//! Load Balancer and Backend Pool Configuration

use serde::{Deserialize, Serialize};

use super::identifier::NodeId;

/// Default ceiling on new connections per second per client
pub const DEFAULT_CONN_THROTTLE: u32 = 20;

/// Largest throttle the backend accepts
pub const MAX_CONN_THROTTLE: u32 = 20;

/// Load balancer creation request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBalancerArgs {
    pub label: String,
    pub region: String,
    pub client_conn_throttle: u32,
}

/// Member selection algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    #[serde(rename = "roundrobin")]
    RoundRobin,
    #[serde(rename = "leastconn")]
    LeastConnections,
    #[serde(rename = "source")]
    Source,
}

/// Health check probe type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthCheck {
    None,
    /// TCP connection probe
    Connection,
    /// HTTP status probe
    Http,
    /// HTTP body probe
    HttpBody,
}

/// Backend pool configuration of a load balancer
///
/// Invariant: `nodebalancer_id` is a resolved identifier, so a value of this
/// type can only be built once the load balancer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendPoolConfig {
    pub nodebalancer_id: NodeId,
    pub algorithm: Algorithm,
    pub check: HealthCheck,
    pub check_path: String,
    /// Seconds between probes
    pub check_interval: u32,
    /// Seconds before a probe times out
    pub check_timeout: u32,
    /// Consecutive failures before a member is marked unhealthy
    pub check_attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub port: Option<u16>,
    pub members: Vec<NodeId>,
}

impl BackendPoolConfig {
    /// Health check path probed on every member
    pub const CHECK_PATH: &'static str = "/healthz";

    /// The cluster's pool: least-connections, TCP probe every 10s with a
    /// 5s timeout, unhealthy after 3 failures
    pub fn cluster_default(nodebalancer_id: NodeId, members: Vec<NodeId>) -> Self {
        Self {
            nodebalancer_id,
            algorithm: Algorithm::LeastConnections,
            check: HealthCheck::Connection,
            check_path: Self::CHECK_PATH.to_string(),
            check_interval: 10,
            check_timeout: 5,
            check_attempts: 3,
            port: None,
            members,
        }
    }
}
