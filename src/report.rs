// Copyright (c) 2025 - Cowboy AI, Inc.
//! Run Results and Failure Reports
//!
//! [`TopologyResult`] is what a successful run exports. [`TopologyFailure`]
//! is what an operator gets instead: the first fatal error plus every
//! resource that was created before it, so the run can be reconciled by
//! hand.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::backend::ResourceHandle;
use crate::composer::{CertificateBundle, FirewallHandle, LoadBalancerHandle, NodeFailure, ResolvedNode};
use crate::domain::{CoercedIdentifierSet, Diagnostic, ResourceKind};
use crate::errors::TopologyError;
use crate::state_machine::TopologyPhase;

/// A resource the backend confirmed as created (or matched)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedResource {
    pub kind: ResourceKind,
    pub name: String,
    pub id: String,
}

/// Record of every resource resolved during one run
#[derive(Debug, Clone, Default)]
pub struct CreationLedger {
    entries: Arc<Mutex<Vec<CreatedResource>>>,
}

impl CreationLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved resource
    pub fn record(&self, handle: &ResourceHandle, id: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CreatedResource {
                kind: handle.kind,
                name: handle.name.clone(),
                id: id.to_string(),
            });
    }

    /// Everything recorded so far, in resolution order
    pub fn snapshot(&self) -> Vec<CreatedResource> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// One lifecycle step of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseRecord {
    pub from: TopologyPhase,
    pub to: TopologyPhase,
    pub at: DateTime<Utc>,
}

/// Exported aggregate of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct TopologyResult {
    pub run_id: Uuid,
    pub region: String,
    pub nodes: Vec<ResolvedNode>,
    pub identifiers: CoercedIdentifierSet,
    pub firewall: FirewallHandle,
    pub load_balancer: LoadBalancerHandle,
    pub public_ipv4: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificates: Option<CertificateBundle>,
    /// Nodes that failed while the run still succeeded
    pub node_failures: Vec<NodeFailure>,
    pub diagnostics: Vec<Diagnostic>,
    pub transitions: Vec<PhaseRecord>,
}

/// Outcome of a failed run
#[derive(Debug, Clone, Serialize)]
pub struct TopologyFailure {
    pub run_id: Uuid,
    #[serde(serialize_with = "serialize_display")]
    pub error: TopologyError,
    /// Last phase entered before failing
    pub phase: TopologyPhase,
    pub created: Vec<CreatedResource>,
    pub node_failures: Vec<NodeFailure>,
    pub diagnostics: Vec<Diagnostic>,
    pub transitions: Vec<PhaseRecord>,
}

fn serialize_display<S, T>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
    T: fmt::Display,
{
    serializer.collect_str(value)
}

impl fmt::Display for TopologyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run {} failed during {:?}: {}", self.run_id, self.phase, self.error)?;

        if self.created.is_empty() {
            writeln!(f, "no resources were created")?;
        } else {
            writeln!(f, "resources created before the failure:")?;
            for resource in &self.created {
                writeln!(f, "  {} '{}' (id {})", resource.kind, resource.name, resource.id)?;
            }
        }

        for failure in &self.node_failures {
            writeln!(f, "node '{}' failed: {}", failure.label, failure.reason)?;
        }
        for diagnostic in &self.diagnostics {
            writeln!(f, "diagnostic: {diagnostic}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TopologyFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
