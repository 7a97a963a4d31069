//! Controller-specific error types.

use informer::InformerError;
use kube::config::KubeconfigError;
use thiserror::Error;

/// Errors that can occur in the cluster-watch controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Credential file could not be read or used
    #[error("Kubeconfig error: {0}")]
    KubeConfig(#[from] KubeconfigError),

    /// A mirror failed to start or run
    #[error("Informer error: {0}")]
    Informer(#[from] InformerError),

    /// Socket or filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registration or encoding failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// A background task panicked or was cancelled
    #[error("Task failed: {0}")]
    Task(String),
}
