// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for topology provisioning

use thiserror::Error;

use crate::domain::ResourceKind;
use crate::state_machine::TransitionError;

/// Errors reported by the remote provisioning backend
///
/// Cloneable because the same failure is observed by every continuation
/// attached to a shared deferred value.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend refused the creation request outright
    #[error("{kind} '{name}' rejected: {reason}")]
    Rejected {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    /// The creation request was accepted but did not complete
    #[error("{kind} '{name}' creation failed: {reason}")]
    CreationFailed {
        kind: ResourceKind,
        name: String,
        reason: String,
    },

    /// Rate limiting, timeouts and other conditions the backend may clear on its own
    #[error("transient backend error for '{name}': {reason}")]
    Transient { name: String, reason: String },

    /// The backend dropped the request without ever resolving it
    #[error("'{name}' was abandoned before resolving")]
    Abandoned { name: String },

    /// A resolved identifier could not be parsed as a number
    #[error("'{resource}' resolved to a malformed identifier '{raw}'")]
    MalformedIdentifier { resource: String, raw: String },

    /// The backend cannot create this kind of resource
    #[error("{kind} is not supported by this backend")]
    Unsupported { kind: ResourceKind },

    /// Transport-level failure talking to the backend
    #[error("HTTP error: {0}")]
    Http(String),

    /// A request or response body could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A resolved resource lacks an attribute the caller depends on
    #[error("'{resource}' resolved without attribute '{attribute}'")]
    MissingAttribute { resource: String, attribute: String },
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::Serialization(err.to_string())
    }
}

/// Fatal errors that end a provisioning run
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The authenticated principal could not be looked up
    #[error("Principal lookup failed: {0}")]
    Principal(#[source] BackendError),

    /// Every node creation request failed
    #[error("No nodes were provisioned ({failures} failed)")]
    NoNodesProvisioned { failures: usize },

    /// Firewall creation failed
    #[error("Firewall composition failed: {0}")]
    Firewall(#[source] BackendError),

    /// Load balancer creation failed
    #[error("Load balancer composition failed: {0}")]
    LoadBalancer(#[source] BackendError),

    /// Backend pool config creation failed
    #[error("Backend pool composition failed: {0}")]
    BackendPool(#[source] BackendError),

    /// Certificate authority issuance failed
    #[error("Certificate issuance failed: {0}")]
    Certificate(#[source] BackendError),

    /// The orchestrator attempted an illegal phase change
    #[error("Lifecycle error: {0}")]
    Transition(#[from] TransitionError),

    /// A composer task panicked or was aborted
    #[error("Composer task failed: {0}")]
    TaskFailed(String),
}

/// Result type for orchestration operations
pub type OrchestrationResult<T> = Result<T, TopologyError>;

impl From<tokio::task::JoinError> for TopologyError {
    fn from(err: tokio::task::JoinError) -> Self {
        TopologyError::TaskFailed(err.to_string())
    }
}

impl From<crate::config::ConfigError> for TopologyError {
    fn from(err: crate::config::ConfigError) -> Self {
        TopologyError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_messages_name_the_resource() {
        let err = BackendError::CreationFailed {
            kind: ResourceKind::Instance,
            name: "worker-1".to_string(),
            reason: "out of capacity".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "instance 'worker-1' creation failed: out of capacity"
        );
    }

    #[test]
    fn test_topology_error_wraps_backend_error() {
        let err = TopologyError::BackendPool(BackendError::Abandoned {
            name: "LoadBalancer-config".to_string(),
        });
        assert!(err.to_string().contains("LoadBalancer-config"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
