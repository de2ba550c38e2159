// Copyright (c) 2025 - Cowboy AI, Inc.
//! Topology Orchestrator
//!
//! Single-pass pipeline for one provisioning run:
//!
//! ```text
//! Idle ──> NodesRequested ──> NodesResolving ──> PoliciesComposing ──> Done
//!   │            │                  │                    │
//!   └────────────┴──────────────────┴────────────────────┴──────────> Failed
//! ```
//!
//! Nodes of every group are requested back to back, their identifiers are
//! resolved and coerced together, and the firewall and load balancer (plus
//! the optional certificate authority) are composed concurrently over the
//! resulting identifier set. The first fatal error ends the run; resources
//! created up to that point are listed in the failure report and left in
//! place.

use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::backend::ProvisioningBackend;
use crate::composer::{
    CertificateAuthorityIssuer, CertificateBundle, FirewallHandle, LoadBalancerComposer,
    LoadBalancerHandle, NetworkPolicyComposer, NodeBatch, NodeFailure, NodeProvisioner,
};
use crate::config::ClusterConfig;
use crate::domain::{Diagnostics, IdentifierCoercion};
use crate::errors::{OrchestrationResult, TopologyError};
use crate::report::{CreationLedger, PhaseRecord, TopologyFailure, TopologyResult};
use crate::state_machine::{Lifecycle, PhaseInput, TopologyPhase};

/// Output names published through the backend
pub mod outputs {
    pub const FIREWALL: &str = "Firewall";
    pub const LOAD_BALANCER: &str = "LoadBalancer";
    pub const PUBLIC_IP: &str = "publicIp";
    pub const BACKEND_POOL: &str = "LoadBalancer-conf-id";
    pub const CERTIFICATE_AUTHORITY: &str = "CertificateAuthority";
}

/// What one concurrent composer produced
enum Composed {
    Firewall(FirewallHandle),
    LoadBalancer(LoadBalancerHandle),
    Certificates(CertificateBundle),
}

/// Per-run context, passed explicitly through the pipeline
struct Run {
    id: Uuid,
    lifecycle: Lifecycle<TopologyPhase>,
    ledger: CreationLedger,
    diagnostics: Diagnostics,
    node_failures: Vec<NodeFailure>,
}

impl Run {
    fn new() -> Self {
        Self {
            id: Uuid::now_v7(),
            lifecycle: Lifecycle::new(TopologyPhase::Idle),
            ledger: CreationLedger::new(),
            diagnostics: Diagnostics::new(),
            node_failures: Vec::new(),
        }
    }

    fn phase(&self) -> TopologyPhase {
        *self.lifecycle.state()
    }

    fn advance(&mut self, input: PhaseInput) -> OrchestrationResult<()> {
        let from = self.phase();
        self.lifecycle.step(input)?;
        info!(from = %from, to = %self.phase(), "Phase change");
        Ok(())
    }

    fn transitions(&self) -> Vec<PhaseRecord> {
        self.lifecycle
            .steps()
            .iter()
            .map(|step| PhaseRecord {
                from: step.from,
                to: step.to,
                at: step.at,
            })
            .collect()
    }

    fn fail(mut self, error: TopologyError) -> TopologyFailure {
        let phase = self.phase();
        if let Err(err) = self.advance(PhaseInput::Fail) {
            warn!("Could not record failure: {}", err);
        }

        let created = self.ledger.snapshot();
        let diagnostics = self.diagnostics.snapshot();
        let transitions = self.transitions();
        error!(
            phase = %phase,
            created = created.len(),
            "Run failed: {}",
            error
        );

        TopologyFailure {
            run_id: self.id,
            error,
            phase,
            created,
            node_failures: self.node_failures,
            diagnostics,
            transitions,
        }
    }
}

/// Drives one provisioning run against a backend
pub struct TopologyOrchestrator {
    backend: Arc<dyn ProvisioningBackend>,
    config: ClusterConfig,
}

impl TopologyOrchestrator {
    /// Create an orchestrator for `config`
    pub fn new(backend: Arc<dyn ProvisioningBackend>, config: ClusterConfig) -> Self {
        Self { backend, config }
    }

    /// Provision the cluster
    ///
    /// Never retries; every call is an independent run.
    pub async fn run(&self) -> Result<TopologyResult, TopologyFailure> {
        let mut run = Run::new();
        let span = info_span!("topology", run_id = %run.id, region = %self.config.region);

        async move {
            info!("Provisioning run started");
            match self.execute(&mut run).await {
                Ok(result) => {
                    info!(
                        nodes = result.nodes.len(),
                        failed = result.node_failures.len(),
                        public_ip = %result.public_ipv4,
                        "Provisioning run complete"
                    );
                    Ok(result)
                }
                Err(error) => Err(run.fail(error)),
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, run: &mut Run) -> OrchestrationResult<TopologyResult> {
        self.config.validate()?;

        run.advance(PhaseInput::RequestNodes)?;
        let principal = self
            .backend
            .current_principal()
            .await
            .map_err(TopologyError::Principal)?;
        info!("Authorising '{}' on every node", principal.username);

        let template = self.config.template(&principal.username);
        let provisioner = NodeProvisioner::new(self.backend.clone());
        let mut batch = NodeBatch::default();
        for group in &self.config.groups {
            batch.extend(provisioner.provision(group, self.config.nodes_per_group, &template));
        }

        run.advance(PhaseInput::AwaitIdentifiers)?;
        let coercion = IdentifierCoercion::new(self.config.coercion_policy, run.diagnostics.clone());
        let requested = batch.requested();
        let resolution = batch.resolve(&coercion, &run.ledger).await;
        run.node_failures = resolution.failures.clone();

        for node in &resolution.nodes {
            self.backend.export_output(&node.label, json!(node.id));
        }
        info!(
            "{} of {} nodes resolved",
            resolution.nodes.len(),
            requested
        );

        if resolution.nodes.is_empty() {
            return Err(TopologyError::NoNodesProvisioned {
                failures: resolution.failures.len(),
            });
        }

        run.advance(PhaseInput::ComposePolicies)?;
        let identifiers = resolution.identifier_set();
        let mut tasks = JoinSet::new();

        let firewall = NetworkPolicyComposer::new(
            self.backend.clone(),
            self.config.firewall_label.clone(),
            self.config.firewall_tags.clone(),
            run.ledger.clone(),
        );
        let (members, region) = (identifiers.clone(), self.config.region.clone());
        tasks.spawn(
            async move { firewall.compose(members, &region).await.map(Composed::Firewall) }
                .in_current_span(),
        );

        let balancer = LoadBalancerComposer::new(
            self.backend.clone(),
            self.config.balancer_label.clone(),
            self.config.client_conn_throttle,
            run.ledger.clone(),
        );
        let (members, region) = (identifiers.clone(), self.config.region.clone());
        tasks.spawn(
            async move { balancer.compose(members, &region).await.map(Composed::LoadBalancer) }
                .in_current_span(),
        );

        if self.config.issue_certificates {
            let issuer = CertificateAuthorityIssuer::new(self.backend.clone(), run.ledger.clone());
            let cluster_name = self.config.cluster_name.clone();
            tasks.spawn(
                async move { issuer.issue(&cluster_name).await.map(Composed::Certificates) }
                    .in_current_span(),
            );
        }

        // every task runs to completion; the first error by completion wins
        let mut first_error = None;
        let (mut firewall, mut load_balancer, mut certificates) = (None, None, None);
        while let Some(joined) = tasks.join_next().await {
            match joined.map_err(TopologyError::from).and_then(|composed| composed) {
                Ok(Composed::Firewall(handle)) => firewall = Some(handle),
                Ok(Composed::LoadBalancer(handle)) => load_balancer = Some(handle),
                Ok(Composed::Certificates(bundle)) => certificates = Some(bundle),
                Err(err) if first_error.is_none() => first_error = Some(err),
                Err(err) => warn!("Further composer failure: {}", err),
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let firewall = firewall
            .ok_or_else(|| TopologyError::TaskFailed("firewall composer returned nothing".to_string()))?;
        let load_balancer = load_balancer.ok_or_else(|| {
            TopologyError::TaskFailed("load balancer composer returned nothing".to_string())
        })?;

        run.advance(PhaseInput::Complete)?;
        self.backend.export_output(outputs::FIREWALL, json!(firewall.id));
        self.backend.export_output(outputs::LOAD_BALANCER, json!(load_balancer.id));
        self.backend.export_output(outputs::PUBLIC_IP, json!(load_balancer.public_ipv4));
        self.backend.export_output(outputs::BACKEND_POOL, json!(load_balancer.pool.id));
        if let Some(bundle) = &certificates {
            self.backend
                .export_output(outputs::CERTIFICATE_AUTHORITY, json!(bundle.ca_cert_pem));
        }

        Ok(TopologyResult {
            run_id: run.id,
            region: self.config.region.clone(),
            public_ipv4: load_balancer.public_ipv4.clone(),
            nodes: resolution.nodes,
            identifiers,
            firewall,
            load_balancer,
            certificates,
            node_failures: resolution.failures,
            diagnostics: run.diagnostics.snapshot(),
            transitions: run.transitions(),
        })
    }
}
