// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Domain Models
//!
//! Value objects describing what a provisioning run asks the backend to
//! create, and the identifier coercion that threads node identifiers into
//! the resources that depend on them.
//!
//! # Value Objects with Invariants
//!
//! - [`AddressPrefix`] - IPv4 network prefix
//! - [`PortRange`] - inclusive, non-zero port span
//! - [`FirewallRule`] - ports required for TCP/UDP, forbidden for ICMP
//! - [`BackendPoolConfig`] - only constructible from a resolved balancer id
//! - [`CoercedIdentifierSet`] - numeric node identifiers in creation order
//! - [`Secret`] - redacted in logs

pub mod certificate;
pub mod identifier;
pub mod load_balancer;
pub mod network;
pub mod node;
pub mod resource_kind;
pub mod secret;

pub use certificate::{
    CertRequestArgs, KeyAlgorithm, LocallySignedCertArgs, PrivateKeyArgs, SelfSignedCertArgs,
    Subject,
};
pub use identifier::{
    parse_identifier, CoercedIdentifierSet, CoercionPolicy, Diagnostic, Diagnostics,
    IdentifierCoercion, IdentifierError, NodeId, PLACEHOLDER_ID,
};
pub use load_balancer::{
    Algorithm, BackendPoolConfig, HealthCheck, NodeBalancerArgs, DEFAULT_CONN_THROTTLE,
    MAX_CONN_THROTTLE,
};
pub use network::{
    AddressPrefix, FirewallDevices, FirewallPolicy, FirewallRule, FirewallRules, NetworkError,
    PortRange, Protocol, RuleAction, RuleAddresses,
};
pub use node::{node_label, InstanceArgs, InterfacePurpose, NetworkInterface, NodeTemplate};
pub use resource_kind::ResourceKind;
pub use secret::Secret;
