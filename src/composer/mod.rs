// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Composers
//!
//! Each composer turns one part of the cluster into backend requests and
//! waits for them to resolve:
//!
//! - [`NodeProvisioner`] - N identical nodes and their deferred identifiers
//! - [`NetworkPolicyComposer`] - the firewall over the resolved nodes
//! - [`LoadBalancerComposer`] - the load balancer and its backend pool
//! - [`CertificateAuthorityIssuer`] - optional CA and admin certificate
//!
//! Every resource a composer sees resolve is recorded in the run's
//! [`CreationLedger`](crate::report::CreationLedger).

pub mod certificate;
pub mod firewall;
pub mod load_balancer;
pub mod nodes;

pub use certificate::{CertificateAuthorityIssuer, CertificateBundle};
pub use firewall::{cluster_rules, FirewallHandle, NetworkPolicyComposer};
pub use load_balancer::{pool_name, BackendPoolHandle, LoadBalancerComposer, LoadBalancerHandle};
pub use nodes::{IdentifierResolution, Node, NodeBatch, NodeFailure, NodeProvisioner, ResolvedNode};
