// Copyright (c) 2025 - Cowboy AI, Inc.

//! Linode API Backend
//!
//! Provisions resources through the Linode v4 REST API.
//!
//! ```text
//! Instance            GET/POST /linode/instances            (matched by label)
//! Firewall            GET/POST /networking/firewalls        (matched by label)
//! NodeBalancer        GET/POST /nodebalancers               (matched by label)
//! NodeBalancerConfig  GET/POST /nodebalancers/{id}/configs  (matched by port)
//!                     POST     /nodebalancers/{id}/configs/{config}/nodes
//! Principal           GET      /profile
//! ```
//!
//! Every creation runs on its own spawned task. A resource whose label
//! already exists is reused rather than created again. Trust material is not
//! something this API issues, so certificate kinds are refused up front.
//!
//! Rate limiting (429) and server errors (5xx) are reported as transient;
//! nothing is retried here.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::{
    PendingResource, Principal, ProvisioningBackend, ResourceHandle, ResourceRequest,
    ResourceState,
};
use crate::config::ConfigError;
use crate::deferred::Deferred;
use crate::domain::{NodeId, ResourceKind, Secret};
use crate::errors::{BackendError, BackendResult};

/// Public Linode API
pub const DEFAULT_API_URL: &str = "https://api.linode.com/v4";

/// Port balanced when the pool config does not name one
pub const DEFAULT_POOL_PORT: u16 = 80;

fn default_timeout() -> u64 {
    30
}

/// Connection settings for the Linode API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinodeConfig {
    /// API base URL, without a trailing slash
    pub base_url: String,

    /// Personal access token
    pub api_token: Secret,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl LinodeConfig {
    /// Load `LINODE_TOKEN` and `LINODE_API_URL`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_token = lookup("LINODE_TOKEN")
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::Missing("LINODE_TOKEN"))?;
        let base_url = lookup("LINODE_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: Secret::new(api_token),
            timeout_secs: default_timeout(),
        })
    }
}

/// Collection endpoint for kinds matched by label
fn collection(kind: ResourceKind) -> Option<&'static str> {
    match kind {
        ResourceKind::Instance => Some("/linode/instances"),
        ResourceKind::Firewall => Some("/networking/firewalls"),
        ResourceKind::NodeBalancer => Some("/nodebalancers"),
        _ => None,
    }
}

/// Map an unsuccessful response to a backend error
fn classify(handle: &ResourceHandle, status: StatusCode, body: &str) -> BackendError {
    let reason = format!("{status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        BackendError::Transient {
            name: handle.name.clone(),
            reason,
        }
    } else {
        BackendError::CreationFailed {
            kind: handle.kind,
            name: handle.name.clone(),
            reason,
        }
    }
}

/// Resource state from an API object; the numeric id is kept as text
fn state_from(resource: &str, object: Value) -> BackendResult<ResourceState> {
    let id = match &object["id"] {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => {
            return Err(BackendError::MissingAttribute {
                resource: resource.to_string(),
                attribute: "id".to_string(),
            })
        }
    };

    let mut attributes = object;
    // NodeBalancers report a single address; instances report a list
    if let Some(first) = attributes["ipv4"].as_array().and_then(|a| a.first()).cloned() {
        attributes["public_ipv4"] = first;
    }
    Ok(ResourceState { id, attributes })
}

/// Private address of an instance object
fn private_ipv4(instance: &Value) -> Option<String> {
    instance["ipv4"]
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .find(|ip| {
            ip.parse::<std::net::Ipv4Addr>()
                .map(|ip| ip.is_private())
                .unwrap_or(false)
        })
        .map(str::to_string)
}

/// A pool config exists but its members could not all be attached
///
/// The config id goes into the reason so the failure report still names a
/// resource that is live at the backend.
fn partially_created(handle: &ResourceHandle, config_id: &str, err: BackendError) -> BackendError {
    BackendError::CreationFailed {
        kind: handle.kind,
        name: handle.name.clone(),
        reason: format!("config {config_id} was created but registering members failed: {err}"),
    }
}

#[derive(Clone)]
struct Api {
    client: Client,
    base_url: String,
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, handle: &ResourceHandle, request: RequestBuilder) -> BackendResult<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Http(format!("Linode API error: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| BackendError::Serialization(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify(handle, status, &body))
        }
    }

    async fn list(&self, handle: &ResourceHandle, path: &str, filter: Option<Value>) -> BackendResult<Vec<Value>> {
        let mut request = self.client.get(self.url(path));
        if let Some(filter) = filter {
            request = request.header("X-Filter", filter.to_string());
        }
        let page = self.send(handle, request).await?;
        Ok(page["data"].as_array().cloned().unwrap_or_default())
    }

    async fn post(&self, handle: &ResourceHandle, path: &str, body: &Value) -> BackendResult<Value> {
        self.send(handle, self.client.post(self.url(path)).json(body)).await
    }

    async fn create(&self, request: ResourceRequest) -> BackendResult<ResourceState> {
        let handle = request.handle();
        match collection(request.kind) {
            Some(path) => {
                let filter = json!({ "label": request.name });
                if let Some(existing) = self.list(&handle, path, Some(filter)).await?.into_iter().next() {
                    info!("Reusing existing {} '{}'", handle.kind, handle.name);
                    return state_from(&handle.name, existing);
                }
                let created = self.post(&handle, path, &request.args).await?;
                debug!("Created {} '{}'", handle.kind, handle.name);
                state_from(&handle.name, created)
            }
            None if request.kind == ResourceKind::NodeBalancerConfig => self.create_pool(&handle, request.args).await,
            None => Err(BackendError::Unsupported { kind: request.kind }),
        }
    }

    async fn create_pool(&self, handle: &ResourceHandle, mut args: Value) -> BackendResult<ResourceState> {
        let balancer = args["nodebalancer_id"].as_u64().ok_or_else(|| BackendError::MissingAttribute {
            resource: handle.name.clone(),
            attribute: "nodebalancer_id".to_string(),
        })?;
        let members: Vec<NodeId> = match args.get_mut("members") {
            Some(members) => serde_json::from_value(members.take())?,
            None => Vec::new(),
        };
        let port = args["port"].as_u64().unwrap_or(u64::from(DEFAULT_POOL_PORT));

        if let Some(object) = args.as_object_mut() {
            object.remove("nodebalancer_id");
            object.remove("members");
            object.insert("port".to_string(), json!(port));
        }

        let path = format!("/nodebalancers/{balancer}/configs");
        let existing = self
            .list(handle, &path, None)
            .await?
            .into_iter()
            .find(|config| config["port"].as_u64() == Some(port));
        if let Some(existing) = existing {
            info!("Reusing existing {} '{}'", handle.kind, handle.name);
            return state_from(&handle.name, existing);
        }

        let config = state_from(&handle.name, self.post(handle, &path, &args).await?)?;
        self.register_members(handle, &path, &config.id, &members, port)
            .await
            .map_err(|err| partially_created(handle, &config.id, err))?;
        Ok(config)
    }

    async fn register_members(
        &self,
        handle: &ResourceHandle,
        path: &str,
        config_id: &str,
        members: &[NodeId],
        port: u64,
    ) -> BackendResult<()> {
        for member in members {
            let instance = self
                .send(handle, self.client.get(self.url(&format!("/linode/instances/{member}"))))
                .await?;
            let address = private_ipv4(&instance).ok_or_else(|| BackendError::MissingAttribute {
                resource: format!("instance {member}"),
                attribute: "private ipv4".to_string(),
            })?;
            let node = json!({
                "address": format!("{address}:{port}"),
                "label": format!("node-{member}"),
            });
            self.post(handle, &format!("{path}/{config_id}/nodes"), &node).await?;
            debug!("Registered node {} ({}) with '{}'", member, address, handle.name);
        }
        Ok(())
    }
}

/// Linode v4 API backend
pub struct LinodeBackend {
    api: Api,
    outputs: Mutex<BTreeMap<String, Value>>,
}

impl LinodeBackend {
    /// Create a backend authenticated with the configured token
    pub fn new(config: LinodeConfig) -> BackendResult<Self> {
        info!("Using Linode API at {}", config.base_url);

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_token.expose()))
            .map_err(|e| BackendError::Http(format!("Invalid API token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| BackendError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api: Api {
                client,
                base_url: config.base_url,
            },
            outputs: Mutex::new(BTreeMap::new()),
        })
    }

    /// Outputs exported so far
    pub fn outputs(&self) -> BTreeMap<String, Value> {
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ProvisioningBackend for LinodeBackend {
    fn create_resource(&self, request: ResourceRequest) -> BackendResult<PendingResource> {
        if request.kind.is_trust_material() {
            return Err(BackendError::Unsupported { kind: request.kind });
        }

        let handle = request.handle();
        let api = self.api.clone();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(api.create(request).await);
        });

        Ok(PendingResource {
            state: Deferred::from_receiver(rx, handle.name.clone()),
            handle,
        })
    }

    async fn current_principal(&self) -> BackendResult<Principal> {
        let handle = ResourceHandle::new(ResourceKind::Instance, "profile");
        let profile = self
            .api
            .send(&handle, self.api.client.get(self.api.url("/profile")))
            .await?;
        Ok(serde_json::from_value(profile)?)
    }

    fn export_output(&self, name: &str, value: Value) {
        info!("Output {} = {}", name, value);
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults_and_token() {
        let vars: HashMap<&str, &str> = [("LINODE_TOKEN", "t0k3n")].into_iter().collect();
        let config = LinodeConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.timeout_secs, 30);
        assert!(!format!("{config:?}").contains("t0k3n"));

        assert_eq!(
            LinodeConfig::from_lookup(|_| None).unwrap_err(),
            ConfigError::Missing("LINODE_TOKEN")
        );
    }

    #[test]
    fn test_rate_limit_and_server_errors_are_transient() {
        let handle = ResourceHandle::new(ResourceKind::Instance, "worker-0");
        assert!(matches!(
            classify(&handle, StatusCode::TOO_MANY_REQUESTS, ""),
            BackendError::Transient { .. }
        ));
        assert!(matches!(
            classify(&handle, StatusCode::BAD_GATEWAY, ""),
            BackendError::Transient { .. }
        ));
        assert!(matches!(
            classify(&handle, StatusCode::BAD_REQUEST, "region invalid"),
            BackendError::CreationFailed { .. }
        ));
    }

    #[test]
    fn test_numeric_id_becomes_text() {
        let state = state_from(
            "LoadBalancer",
            json!({ "id": 4312, "ipv4": "203.0.113.4", "hostname": "nb-203-0-113-4.ca-central.nodebalancer.linode.com" }),
        )
        .unwrap();
        assert_eq!(state.id, "4312");
        assert_eq!(state.attribute_str("ipv4"), Some("203.0.113.4"));

        assert!(state_from("worker-0", json!({ "label": "worker-0" })).is_err());
    }

    #[test]
    fn test_private_address_is_picked() {
        let instance = json!({ "ipv4": ["198.51.100.20", "192.168.140.7"] });
        assert_eq!(private_ipv4(&instance), Some("192.168.140.7".to_string()));
        assert_eq!(private_ipv4(&json!({ "ipv4": ["198.51.100.20"] })), None);
    }

    #[test]
    fn test_member_failure_names_created_config() {
        let handle = ResourceHandle::new(ResourceKind::NodeBalancerConfig, "LoadBalancer-config");
        let err = partially_created(
            &handle,
            "8812",
            BackendError::Transient {
                name: "LoadBalancer-config".to_string(),
                reason: "HTTP 503".to_string(),
            },
        );

        match err {
            BackendError::CreationFailed { kind, reason, .. } => {
                assert_eq!(kind, ResourceKind::NodeBalancerConfig);
                assert!(reason.contains("config 8812 was created"));
                assert!(reason.contains("HTTP 503"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_exports_are_kept() {
        let config = LinodeConfig::from_lookup(|k| (k == "LINODE_TOKEN").then(|| "t".to_string())).unwrap();
        let backend = LinodeBackend::new(config).unwrap();
        backend.export_output("publicIp", json!("203.0.113.4"));
        backend.export_output("LoadBalancer", json!(4312));

        let outputs = backend.outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs["LoadBalancer"], json!(4312));
    }

    #[tokio::test]
    async fn test_trust_material_is_refused() {
        let config = LinodeConfig::from_lookup(|k| (k == "LINODE_TOKEN").then(|| "t".to_string())).unwrap();
        let backend = LinodeBackend::new(config).unwrap();
        let request = ResourceRequest::new(ResourceKind::PrivateKey, "private-key", &json!({})).unwrap();
        assert!(matches!(
            backend.create_resource(request),
            Err(BackendError::Unsupported { .. })
        ));
    }
}
