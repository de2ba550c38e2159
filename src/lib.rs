// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster topology provisioning
//!
//! Provisions a small compute cluster: groups of identical nodes, one
//! firewall over all of them and one load balancer in front of them, with an
//! optional certificate authority. Node identifiers only exist once the
//! remote backend has created the nodes, and arrive as text while the
//! firewall and load balancer want numbers; this crate threads those
//! deferred identifiers through the dependent resources.
//!
//! ```text
//! ClusterConfig ──> NodeProvisioner ──> Deferred<"101">, ...
//!                                           │ IdentifierCoercion
//!                                           ▼
//!                                 CoercedIdentifierSet [101, ...]
//!                                  ┌────────┴─────────┐
//!                                  ▼                  ▼
//!                      NetworkPolicyComposer   LoadBalancerComposer
//!                                  └────────┬─────────┘
//!                                           ▼
//!                                    TopologyResult
//! ```

pub mod backend;
pub mod composer;
pub mod config;
pub mod deferred;
pub mod domain;
pub mod errors;
pub mod orchestrator;
pub mod report;
pub mod state_machine;

pub use backend::{MockBackend, ProvisioningBackend};
pub use config::{ClusterConfig, ConfigError};
pub use deferred::Deferred;
pub use errors::{BackendError, OrchestrationResult, TopologyError};
pub use orchestrator::TopologyOrchestrator;
pub use report::{TopologyFailure, TopologyResult};

#[cfg(feature = "linode")]
pub use backend::{LinodeBackend, LinodeConfig};
