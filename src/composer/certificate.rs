// Copyright (c) 2025 - Cowboy AI, Inc.
//! Certificate Authority Issuer
//!
//! Issues the cluster's trust material as a chain of dependent requests:
//!
//! ```text
//! private-key ──┬──> certificate-authority ──┐
//!               └──> admin-cert-request ─────┴──> admin-cert
//! ```
//!
//! Each step is issued as a continuation of the steps it needs, so nothing is
//! requested with a PEM input that does not exist yet, and nothing waits on
//! a step it does not need.

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::backend::{submit, submit_deferred, ProvisioningBackend, ResourceHandle, ResourceState};
use crate::deferred::{join_all, join_settled, Deferred};
use crate::domain::{
    CertRequestArgs, LocallySignedCertArgs, PrivateKeyArgs, ResourceKind,
    SelfSignedCertArgs, Subject,
};
use crate::errors::{BackendError, OrchestrationResult, TopologyError};
use crate::report::CreationLedger;

pub const PRIVATE_KEY: &str = "private-key";
pub const CERTIFICATE_AUTHORITY: &str = "certificate-authority";
pub const ADMIN_CERT_REQUEST: &str = "admin-cert-request";
pub const ADMIN_CERT: &str = "admin-cert";

/// Issued certificates
///
/// The private key stays with the backend; only certificates are carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateBundle {
    pub ca_cert_pem: String,
    pub admin_cert_pem: String,
}

/// Issues the CA and the admin certificate
#[derive(Clone)]
pub struct CertificateAuthorityIssuer {
    backend: Arc<dyn ProvisioningBackend>,
    ledger: CreationLedger,
}

fn pem_of(state: &Deferred<ResourceState>, resource: &'static str, key: &'static str) -> Deferred<String> {
    state.try_map(move |state| state.require_str(resource, key))
}

impl CertificateAuthorityIssuer {
    pub fn new(backend: Arc<dyn ProvisioningBackend>, ledger: CreationLedger) -> Self {
        Self { backend, ledger }
    }

    /// Issue a CA named after `cluster_name` and an admin certificate signed by it
    pub async fn issue(&self, cluster_name: &str) -> OrchestrationResult<CertificateBundle> {
        let key_args = PrivateKeyArgs::default();
        let algorithm = key_args.algorithm;

        let key = submit(self.backend.as_ref(), ResourceKind::PrivateKey, PRIVATE_KEY, &key_args)
            .map_err(TopologyError::Certificate)?;
        let key_pem = pem_of(&key.state, PRIVATE_KEY, "private_key_pem");

        let ca = {
            let backend = self.backend.clone();
            let cluster_name = cluster_name.to_string();
            key_pem.and_then(move |pem| {
                let args = SelfSignedCertArgs::root(&cluster_name, algorithm, pem);
                submit_deferred(backend.as_ref(), ResourceKind::SelfSignedCert, CERTIFICATE_AUTHORITY, &args)
            })
        };

        let request = {
            let backend = self.backend.clone();
            key_pem.and_then(move |pem| {
                let args = CertRequestArgs {
                    key_algorithm: algorithm,
                    private_key_pem: pem,
                    subject: Subject::cluster_admin(),
                };
                submit_deferred(backend.as_ref(), ResourceKind::CertRequest, ADMIN_CERT_REQUEST, &args)
            })
        };

        let ca_pem = pem_of(&ca, CERTIFICATE_AUTHORITY, "cert_pem");
        let request_pem = pem_of(&request, ADMIN_CERT_REQUEST, "cert_request_pem");

        let admin = {
            let backend = self.backend.clone();
            join_all(vec![ca_pem.clone(), key_pem.clone(), request_pem]).and_then(move |pems| {
                match <[String; 3]>::try_from(pems) {
                    Ok([ca_cert, ca_key, request]) => {
                        let args = LocallySignedCertArgs::leaf(ca_cert, algorithm, ca_key, request);
                        submit_deferred(backend.as_ref(), ResourceKind::LocallySignedCert, ADMIN_CERT, &args)
                    }
                    Err(_) => Deferred::failed(BackendError::MissingAttribute {
                        resource: ADMIN_CERT.to_string(),
                        attribute: "signing inputs".to_string(),
                    }),
                }
            })
        };

        let steps = [
            (PRIVATE_KEY, ResourceKind::PrivateKey, key.state.clone()),
            (CERTIFICATE_AUTHORITY, ResourceKind::SelfSignedCert, ca),
            (ADMIN_CERT_REQUEST, ResourceKind::CertRequest, request),
            (ADMIN_CERT, ResourceKind::LocallySignedCert, admin.clone()),
        ];

        // branches run independently; wait for all of them so every created
        // step lands in the ledger before the first failure is reported
        let settled = join_settled(steps.iter().map(|(_, _, state)| state.clone()).collect())
            .resolve()
            .await
            .unwrap_or_default();

        let mut first_error = None;
        for ((name, kind, _), outcome) in steps.iter().zip(settled) {
            match outcome {
                Ok(resolved) => self.ledger.record(&ResourceHandle::new(*kind, *name), &resolved.id),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(TopologyError::Certificate(err));
        }

        let bundle = CertificateBundle {
            ca_cert_pem: ca_pem.resolve().await.map_err(TopologyError::Certificate)?,
            admin_cert_pem: pem_of(&admin, ADMIN_CERT, "cert_pem")
                .resolve()
                .await
                .map_err(TopologyError::Certificate)?,
        };

        info!("Issued certificate authority for cluster '{}'", cluster_name);
        Ok(bundle)
    }
}
