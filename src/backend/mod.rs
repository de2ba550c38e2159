// Copyright (c) 2025 - Cowboy AI, Inc.
//! Remote Provisioning Backend
//!
//! The boundary between the topology core and whatever actually creates
//! cloud resources. A creation request returns immediately with a handle and
//! a [`Deferred`] state that resolves once the backend finishes.
//!
//! ```text
//! ResourceRequest ──create_resource──> PendingResource
//!                                        ├── handle   (kind, name)  known now
//!                                        └── state    Deferred<ResourceState>
//!                                                       ├── id          "101"
//!                                                       └── attributes  { ipv4, ... }
//! ```
//!
//! # Implementations
//!
//! - [`MockBackend`] - deterministic in-memory backend for tests
//! - `LinodeBackend` - Linode v4 API (feature `linode`)

pub mod mock;

#[cfg(feature = "linode")]
pub mod linode;

pub use mock::MockBackend;

#[cfg(feature = "linode")]
pub use linode::{LinodeBackend, LinodeConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::deferred::Deferred;
use crate::domain::ResourceKind;
use crate::errors::{BackendError, BackendResult};

/// In-process reference to a remote resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceHandle {
    /// Create a handle
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// Resolved state of a remote resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    /// Backend identifier, always textual
    pub id: String,
    /// Everything else the backend reported
    pub attributes: serde_json::Value,
}

impl ResourceState {
    /// A string attribute, if present
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(serde_json::Value::as_str)
    }

    /// A string attribute the caller cannot proceed without
    pub fn require_str(&self, resource: &str, key: &str) -> BackendResult<String> {
        self.attribute_str(key)
            .map(str::to_string)
            .ok_or_else(|| BackendError::MissingAttribute {
                resource: resource.to_string(),
                attribute: key.to_string(),
            })
    }
}

/// A creation request
///
/// `name` must be deterministic so a backend can match an already existing
/// resource instead of creating a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
    pub name: String,
    pub args: serde_json::Value,
}

impl ResourceRequest {
    /// Build a request from typed arguments
    pub fn new<A: Serialize>(kind: ResourceKind, name: impl Into<String>, args: &A) -> BackendResult<Self> {
        Ok(Self {
            kind,
            name: name.into(),
            args: serde_json::to_value(args)?,
        })
    }

    /// Handle the request will produce
    pub fn handle(&self) -> ResourceHandle {
        ResourceHandle::new(self.kind, self.name.clone())
    }
}

/// A resource whose creation has been requested
#[derive(Debug, Clone)]
pub struct PendingResource {
    pub handle: ResourceHandle,
    pub state: Deferred<ResourceState>,
}

impl PendingResource {
    /// Deferred backend identifier
    pub fn id(&self) -> Deferred<String> {
        self.state.map(|state| state.id)
    }
}

/// The authenticated principal running the provisioning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
}

/// Remote provisioning backend
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    /// Issue a creation request
    ///
    /// Returns without waiting for the resource to exist. An `Err` means the
    /// request was refused up front; failures after acceptance surface
    /// through the returned deferred state.
    fn create_resource(&self, request: ResourceRequest) -> BackendResult<PendingResource>;

    /// Look up the principal the backend is authenticated as
    async fn current_principal(&self) -> BackendResult<Principal>;

    /// Publish a named value as part of the run's visible outputs
    fn export_output(&self, name: &str, value: serde_json::Value);
}

/// Serialize `args` and issue a creation request
pub fn submit<A: Serialize>(
    backend: &dyn ProvisioningBackend,
    kind: ResourceKind,
    name: &str,
    args: &A,
) -> BackendResult<PendingResource> {
    let request = ResourceRequest::new(kind, name, args)?;
    debug!("Requesting {} '{}'", kind, name);
    backend.create_resource(request)
}

/// Like [`submit`], folding an up-front refusal into the deferred state
///
/// Used inside continuations, where the only way to report failure is
/// through the deferred value being built.
pub fn submit_deferred<A: Serialize>(
    backend: &dyn ProvisioningBackend,
    kind: ResourceKind,
    name: &str,
    args: &A,
) -> Deferred<ResourceState> {
    submit(backend, kind, name, args)
        .map(|pending| pending.state)
        .unwrap_or_else(Deferred::failed)
}
