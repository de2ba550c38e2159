// Copyright (c) 2025 - Cowboy AI, Inc.
//! Trust Material Requests
//!
//! Shapes of the key and certificate requests issued by the certificate
//! authority flow. PEM inputs are resolved values of earlier steps.

use serde::{Deserialize, Serialize};

/// Uses granted to both the CA and the admin certificate
pub const ALLOWED_USES: [&str; 4] = ["signing", "key encipherment", "server auth", "client auth"];

/// One year
pub const VALIDITY_PERIOD_HOURS: u32 = 8760;

/// One week
pub const EARLY_RENEWAL_HOURS: u32 = 168;

/// Key algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum KeyAlgorithm {
    Rsa,
    Ecdsa,
}

/// Private key request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateKeyArgs {
    pub algorithm: KeyAlgorithm,
    pub rsa_bits: u32,
}

impl Default for PrivateKeyArgs {
    fn default() -> Self {
        Self {
            algorithm: KeyAlgorithm::Rsa,
            rsa_bits: 2048,
        }
    }
}

/// Distinguished name fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub common_name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub organizational_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub province: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub country: Option<String>,
}

impl Subject {
    /// Subject of the cluster administrator's certificate
    pub fn cluster_admin() -> Self {
        Self {
            common_name: "admin".to_string(),
            organization: Some("hardos".to_string()),
            organizational_unit: Some("system:masters".to_string()),
            locality: Some("Portland".to_string()),
            province: Some("Oregon".to_string()),
            country: Some("US".to_string()),
        }
    }
}

fn allowed_uses() -> Vec<String> {
    ALLOWED_USES.iter().map(|s| s.to_string()).collect()
}

/// Self-signed CA certificate request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfSignedCertArgs {
    pub allowed_uses: Vec<String>,
    pub is_ca_certificate: bool,
    pub key_algorithm: KeyAlgorithm,
    pub private_key_pem: String,
    pub subject: Subject,
    pub validity_period_hours: u32,
    pub early_renewal_hours: u32,
}

impl SelfSignedCertArgs {
    /// Root certificate for `cluster_name`
    pub fn root(cluster_name: &str, key_algorithm: KeyAlgorithm, private_key_pem: String) -> Self {
        Self {
            allowed_uses: allowed_uses(),
            is_ca_certificate: true,
            key_algorithm,
            private_key_pem,
            subject: Subject {
                common_name: cluster_name.to_string(),
                ..Subject::default()
            },
            validity_period_hours: VALIDITY_PERIOD_HOURS,
            early_renewal_hours: EARLY_RENEWAL_HOURS,
        }
    }
}

/// Certificate signing request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertRequestArgs {
    pub key_algorithm: KeyAlgorithm,
    pub private_key_pem: String,
    pub subject: Subject,
}

/// Certificate signed by the cluster CA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocallySignedCertArgs {
    pub allowed_uses: Vec<String>,
    pub ca_cert_pem: String,
    pub ca_key_algorithm: KeyAlgorithm,
    pub ca_private_key_pem: String,
    pub cert_request_pem: String,
    pub validity_period_hours: u32,
}

impl LocallySignedCertArgs {
    /// Leaf certificate signed by the CA
    pub fn leaf(
        ca_cert_pem: String,
        ca_key_algorithm: KeyAlgorithm,
        ca_private_key_pem: String,
        cert_request_pem: String,
    ) -> Self {
        Self {
            allowed_uses: allowed_uses(),
            ca_cert_pem,
            ca_key_algorithm,
            ca_private_key_pem,
            cert_request_pem,
            validity_period_hours: VALIDITY_PERIOD_HOURS,
        }
    }
}
