//! Cluster Watch Controller
//!
//! Keeps event-driven local mirrors of Pods and Nodes:
//! - Pods: cached per namespace, changes logged and counted
//! - Nodes: cached cluster-wide, changes to one label reported to a notifier
//!
//! The caches are served read-only over HTTP (`/ping`, `/pod`, `/node`,
//! `/metrics`).

mod config;
mod controller;
mod error;
mod handlers;
mod http;

use crate::config::Config;
use crate::controller::Controller;
use crate::error::ControllerError;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("Crypto provider already installed");
    }

    info!("Starting Cluster Watch Controller");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  Listen address: {}", config.listen_addr);
    info!(
        "  Pod namespace: {}",
        config.watch_namespace.as_deref().unwrap_or("all namespaces")
    );
    info!("  Node label: {}", config.node_label_key);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
