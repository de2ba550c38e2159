// Copyright (c) 2025 - Cowboy AI, Inc.
//! In-Memory Mock Backend
//!
//! Deterministic stand-in for the remote provisioning backend. Resources
//! resolve on spawned tokio tasks, so continuations genuinely run after the
//! creation request returns.
//!
//! Behaviour per resource name:
//!
//! - identifiers: configured text via [`MockBackend::with_id`], otherwise
//!   sequential numbers starting at 1000
//! - [`MockBackend::reject`] - refuse the request up front
//! - [`MockBackend::fail`] - accept, then resolve to a failure
//! - [`MockBackend::delay`] - hold resolution for a while
//! - [`MockBackend::with_existing`] - resource already exists and is reused
//!
//! A backend pool config whose `nodebalancer_id` does not belong to an
//! already resolved load balancer is always rejected.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::debug;

use super::{
    PendingResource, Principal, ProvisioningBackend, ResourceHandle, ResourceRequest,
    ResourceState,
};
use crate::deferred::Deferred;
use crate::domain::ResourceKind;
use crate::errors::{BackendError, BackendResult};

/// First identifier handed out when none is configured
pub const FIRST_MOCK_ID: u64 = 1000;

/// Public address reported for load balancers unless overridden
pub const MOCK_BALANCER_IPV4: &str = "203.0.113.10";

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    requests: Vec<ResourceRequest>,
    created: Vec<ResourceHandle>,
    reused: Vec<ResourceHandle>,
    existing: HashMap<ResourceHandle, ResourceState>,
    exports: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default)]
struct MockBehavior {
    ids: HashMap<String, String>,
    rejections: HashMap<String, String>,
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    attributes: HashMap<String, Map<String, Value>>,
    principal: Option<String>,
}

/// Deterministic in-memory backend
#[derive(Debug, Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    behavior: Arc<MockBehavior>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Backend authenticated as `mock-user`
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_id: FIRST_MOCK_ID,
                ..MockState::default()
            })),
            behavior: Arc::new(MockBehavior {
                principal: Some("mock-user".to_string()),
                ..MockBehavior::default()
            }),
        }
    }

    fn configure(mut self, f: impl FnOnce(&mut MockBehavior)) -> Self {
        // builder methods run before the backend is shared
        let mut behavior =
            Arc::try_unwrap(self.behavior).unwrap_or_else(|shared| (*shared).clone());
        f(&mut behavior);
        self.behavior = Arc::new(behavior);
        self
    }

    /// Resolve `name` to the raw identifier `raw`
    pub fn with_id(self, name: &str, raw: &str) -> Self {
        let (name, raw) = (name.to_string(), raw.to_string());
        self.configure(|b| {
            b.ids.insert(name, raw);
        })
    }

    /// Refuse the creation request for `name`
    pub fn reject(self, name: &str, reason: &str) -> Self {
        let (name, reason) = (name.to_string(), reason.to_string());
        self.configure(|b| {
            b.rejections.insert(name, reason);
        })
    }

    /// Accept the creation request for `name`, then fail it
    pub fn fail(self, name: &str, reason: &str) -> Self {
        let (name, reason) = (name.to_string(), reason.to_string());
        self.configure(|b| {
            b.failures.insert(name, reason);
        })
    }

    /// Hold resolution of `name` for `delay`
    pub fn delay(self, name: &str, delay: Duration) -> Self {
        let name = name.to_string();
        self.configure(|b| {
            b.delays.insert(name, delay);
        })
    }

    /// Add or override a resolved attribute of `name`
    pub fn with_attribute(self, name: &str, key: &str, value: Value) -> Self {
        let (name, key) = (name.to_string(), key.to_string());
        self.configure(|b| {
            b.attributes.entry(name).or_default().insert(key, value);
        })
    }

    /// Authenticate as `username`
    pub fn with_principal(self, username: &str) -> Self {
        let username = username.to_string();
        self.configure(|b| b.principal = Some(username))
    }

    /// Fail every principal lookup
    pub fn without_principal(self) -> Self {
        self.configure(|b| b.principal = None)
    }

    /// Pretend `name` of `kind` already exists with identifier `id`
    pub fn with_existing(self, kind: ResourceKind, name: &str, id: &str) -> Self {
        self.lock().existing.insert(
            ResourceHandle::new(kind, name),
            ResourceState {
                id: id.to_string(),
                attributes: Value::Object(Self::synthesized(kind, name)),
            },
        );
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<ResourceRequest> {
        self.lock().requests.clone()
    }

    /// Requests of one kind, in order
    pub fn requests_of(&self, kind: ResourceKind) -> Vec<ResourceRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    /// Resources newly created (not reused), in request order
    pub fn created(&self) -> Vec<ResourceHandle> {
        self.lock().created.clone()
    }

    /// Resources matched by name instead of created
    pub fn reused(&self) -> Vec<ResourceHandle> {
        self.lock().reused.clone()
    }

    /// Exported outputs by name
    pub fn exports(&self) -> BTreeMap<String, Value> {
        self.lock().exports.clone()
    }

    /// Whether `kind`/`name` has resolved successfully
    pub fn is_resolved(&self, kind: ResourceKind, name: &str) -> bool {
        self.lock()
            .existing
            .contains_key(&ResourceHandle::new(kind, name))
    }

    fn balancer_resolved(state: &MockState, id: &Value) -> bool {
        let id = match id {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            _ => return false,
        };
        state
            .existing
            .iter()
            .any(|(handle, resolved)| handle.kind == ResourceKind::NodeBalancer && resolved.id == id)
    }

    fn synthesized(kind: ResourceKind, name: &str) -> Map<String, Value> {
        let pem = |label: &str| format!("-----BEGIN {label}-----\nmock:{name}\n-----END {label}-----\n");
        let mut attributes = Map::new();
        match kind {
            ResourceKind::NodeBalancer => {
                attributes.insert("ipv4".to_string(), json!(MOCK_BALANCER_IPV4));
                attributes.insert("hostname".to_string(), json!(format!("{name}.nodebalancer.mock")));
            }
            ResourceKind::PrivateKey => {
                attributes.insert("private_key_pem".to_string(), json!(pem("RSA PRIVATE KEY")));
            }
            ResourceKind::SelfSignedCert | ResourceKind::LocallySignedCert => {
                attributes.insert("cert_pem".to_string(), json!(pem("CERTIFICATE")));
            }
            ResourceKind::CertRequest => {
                attributes.insert("cert_request_pem".to_string(), json!(pem("CERTIFICATE REQUEST")));
            }
            ResourceKind::Instance | ResourceKind::Firewall | ResourceKind::NodeBalancerConfig => {}
        }
        attributes
    }
}

#[async_trait]
impl ProvisioningBackend for MockBackend {
    fn create_resource(&self, request: ResourceRequest) -> BackendResult<PendingResource> {
        let handle = request.handle();
        let mut state = self.lock();
        state.requests.push(request.clone());

        if let Some(reason) = self.behavior.rejections.get(&request.name) {
            return Err(BackendError::Rejected {
                kind: request.kind,
                name: request.name,
                reason: reason.clone(),
            });
        }

        if request.kind == ResourceKind::NodeBalancerConfig
            && !Self::balancer_resolved(&state, &request.args["nodebalancer_id"])
        {
            return Err(BackendError::Rejected {
                kind: request.kind,
                name: request.name,
                reason: "load balancer identifier has not resolved".to_string(),
            });
        }

        if let Some(existing) = state.existing.get(&handle).cloned() {
            debug!("Mock reusing {} '{}'", handle.kind, handle.name);
            state.reused.push(handle.clone());
            return Ok(PendingResource {
                handle,
                state: Deferred::resolved(existing),
            });
        }

        let id = match self.behavior.ids.get(&request.name) {
            Some(raw) => raw.clone(),
            None => {
                let id = state.next_id;
                state.next_id += 1;
                id.to_string()
            }
        };
        state.created.push(handle.clone());
        drop(state);

        let mut attributes = match request.args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        attributes.extend(Self::synthesized(request.kind, &request.name));
        if let Some(overrides) = self.behavior.attributes.get(&request.name) {
            attributes.extend(overrides.clone());
        }

        let failure = self.behavior.failures.get(&request.name).cloned();
        let delay = self.behavior.delays.get(&request.name).copied();
        let shared = self.state.clone();
        let resolved_handle = handle.clone();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            match delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }

            let resolution = match failure {
                Some(reason) => Err(BackendError::CreationFailed {
                    kind: resolved_handle.kind,
                    name: resolved_handle.name.clone(),
                    reason,
                }),
                None => {
                    let resolved = ResourceState {
                        id,
                        attributes: Value::Object(attributes),
                    };
                    shared
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .existing
                        .insert(resolved_handle.clone(), resolved.clone());
                    Ok(resolved)
                }
            };
            let _ = tx.send(resolution);
        });

        Ok(PendingResource {
            state: Deferred::from_receiver(rx, handle.name.clone()),
            handle,
        })
    }

    async fn current_principal(&self) -> BackendResult<Principal> {
        match &self.behavior.principal {
            Some(username) => Ok(Principal {
                username: username.clone(),
            }),
            None => Err(BackendError::Http("401 Unauthorized: invalid token".to_string())),
        }
    }

    fn export_output(&self, name: &str, value: Value) {
        self.lock().exports.insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::submit;

    #[tokio::test]
    async fn test_sequential_ids() {
        let backend = MockBackend::new();
        let a = submit(&backend, ResourceKind::Instance, "worker-0", &json!({})).unwrap();
        let b = submit(&backend, ResourceKind::Instance, "worker-1", &json!({})).unwrap();

        assert_eq!(a.id().resolve().await, Ok("1000".to_string()));
        assert_eq!(b.id().resolve().await, Ok("1001".to_string()));
    }

    #[tokio::test]
    async fn test_configured_id_and_echoed_args() {
        let backend = MockBackend::new().with_id("worker-0", "101");
        let node = submit(&backend, ResourceKind::Instance, "worker-0", &json!({ "region": "ca-central" }))
            .unwrap();

        let state = node.state.resolve().await.unwrap();
        assert_eq!(state.id, "101");
        assert_eq!(state.attribute_str("region"), Some("ca-central"));
    }

    #[tokio::test]
    async fn test_rejection_and_failure() {
        let backend = MockBackend::new()
            .reject("worker-0", "quota exceeded")
            .fail("worker-1", "host down");

        let rejected = submit(&backend, ResourceKind::Instance, "worker-0", &json!({}));
        assert!(matches!(rejected, Err(BackendError::Rejected { .. })));

        let failed = submit(&backend, ResourceKind::Instance, "worker-1", &json!({})).unwrap();
        assert!(matches!(
            failed.state.resolve().await,
            Err(BackendError::CreationFailed { .. })
        ));
        assert!(!backend.is_resolved(ResourceKind::Instance, "worker-1"));
    }

    #[tokio::test]
    async fn test_pool_config_before_balancer_resolution_is_rejected() {
        let backend = MockBackend::new().with_id("LoadBalancer", "55");
        let balancer = submit(&backend, ResourceKind::NodeBalancer, "LoadBalancer", &json!({})).unwrap();

        let early = submit(
            &backend,
            ResourceKind::NodeBalancerConfig,
            "LoadBalancer-config",
            &json!({ "nodebalancer_id": 55 }),
        );
        assert!(matches!(early, Err(BackendError::Rejected { .. })));

        balancer.state.resolve().await.unwrap();
        let late = submit(
            &backend,
            ResourceKind::NodeBalancerConfig,
            "LoadBalancer-config",
            &json!({ "nodebalancer_id": 55 }),
        );
        assert!(late.is_ok());
    }

    #[tokio::test]
    async fn test_existing_resources_are_reused() {
        let backend = MockBackend::new().with_existing(ResourceKind::Firewall, "Firewall", "9");
        let firewall = submit(&backend, ResourceKind::Firewall, "Firewall", &json!({})).unwrap();

        assert_eq!(firewall.id().resolve().await, Ok("9".to_string()));
        assert!(backend.created().is_empty());
        assert_eq!(backend.reused().len(), 1);
    }

    #[tokio::test]
    async fn test_principal() {
        let backend = MockBackend::new().with_principal("alice");
        assert_eq!(backend.current_principal().await.unwrap().username, "alice");
        assert!(MockBackend::new().without_principal().current_principal().await.is_err());
    }
}
