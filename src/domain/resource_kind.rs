// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Kind Taxonomy
//!
//! The kinds of remote resource a provisioning run asks the backend to
//! create. Cluster resources map onto Linode objects; the certificate kinds
//! are produced by a TLS-capable backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of remote resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    // Cluster resources
    /// Compute node
    Instance,
    /// Network firewall attached to nodes
    Firewall,
    /// Load balancer
    NodeBalancer,
    /// Backend pool configuration of a load balancer
    NodeBalancerConfig,

    // Trust material
    /// Private key
    PrivateKey,
    /// Self-signed (root) certificate
    SelfSignedCert,
    /// Certificate signing request
    CertRequest,
    /// Certificate signed by a local CA
    LocallySignedCert,
}

impl ResourceKind {
    /// Get the canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instance => "instance",
            Self::Firewall => "firewall",
            Self::NodeBalancer => "node_balancer",
            Self::NodeBalancerConfig => "node_balancer_config",
            Self::PrivateKey => "private_key",
            Self::SelfSignedCert => "self_signed_cert",
            Self::CertRequest => "cert_request",
            Self::LocallySignedCert => "locally_signed_cert",
        }
    }

    /// Whether this kind belongs to the certificate authority flow
    pub fn is_trust_material(&self) -> bool {
        matches!(
            self,
            Self::PrivateKey | Self::SelfSignedCert | Self::CertRequest | Self::LocallySignedCert
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_matches_as_str() {
        for kind in [
            ResourceKind::Instance,
            ResourceKind::Firewall,
            ResourceKind::NodeBalancer,
            ResourceKind::NodeBalancerConfig,
            ResourceKind::PrivateKey,
            ResourceKind::SelfSignedCert,
            ResourceKind::CertRequest,
            ResourceKind::LocallySignedCert,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_trust_material() {
        assert!(ResourceKind::CertRequest.is_trust_material());
        assert!(!ResourceKind::NodeBalancer.is_trust_material());
    }
}
