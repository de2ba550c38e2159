// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Provisioner
//!
//! Provisions the cluster described by `CLUSTER_*` environment variables on
//! Linode and prints the resulting topology as JSON.
//!
//! Run with: cargo run --bin provision-cluster --features linode
//!
//! Prerequisites:
//! 1. `LINODE_TOKEN` set to a personal access token
//! 2. `CLUSTER_NODE_PASSWORD` set to the nodes' root password
//!
//! On failure the first fatal error and every resource created before it
//! are printed, and the process exits non-zero.

use anyhow::{Context, Result};
use cluster_topology::{ClusterConfig, LinodeBackend, LinodeConfig, TopologyOrchestrator};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = ClusterConfig::from_env().context("Failed to load cluster configuration")?;
    let linode = LinodeConfig::from_env().context("Failed to load Linode configuration")?;

    info!("Configuration loaded:");
    info!("  - Region: {}", config.region);
    info!(
        "  - Groups: {} x {} ({})",
        config.groups.join(", "),
        config.nodes_per_group,
        config.node_type
    );
    info!("  - Linode API: {}", linode.base_url);

    let backend = Arc::new(LinodeBackend::new(linode).context("Failed to create Linode backend")?);
    let orchestrator = TopologyOrchestrator::new(backend.clone(), config);

    match orchestrator.run().await {
        Ok(result) => {
            for (name, value) in backend.outputs() {
                info!("  {} = {}", name, value);
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(failure) => {
            eprintln!("{failure}");
            Err(anyhow::Error::new(failure).context("Provisioning failed"))
        }
    }
}
