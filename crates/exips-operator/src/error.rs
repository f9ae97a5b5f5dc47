//! Error types
//!
//! Failures are split by boundary: configuration at startup, the watch
//! source that feeds the registry, and the publish collaborator behind the
//! reconciler. Policy evaluation is total and has no error type.

use thiserror::Error;

/// The node has no external or internal IP outside the private ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no public IP")]
pub struct NoPublicIp;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("service name must not be empty")]
    EmptyServiceName,
    #[error("namespace must not be empty")]
    EmptyNamespace,
    #[error("failed to read kubeconfig {path}: {source}")]
    Kubeconfig {
        path: String,
        #[source]
        source: kube::config::KubeconfigError,
    },
    #[error("failed to load in-cluster config: {0}")]
    InCluster(#[source] kube::config::InClusterError),
    #[error("failed to build Kubernetes client: {0}")]
    Client(#[source] kube::Error),
}

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch failed before initial sync: {0}")]
    InitialSync(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("watch stream ended unexpectedly")]
    StreamEnded,
    #[error("watch stopped before initial sync completed")]
    Stopped,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to read service {namespace}/{name}: {source}")]
    Read {
        name: String,
        namespace: String,
        #[source]
        source: kube::Error,
    },
    #[error("failed to apply service {namespace}/{name}: {source}")]
    Write {
        name: String,
        namespace: String,
        #[source]
        source: kube::Error,
    },
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("reading published record: {0}")]
    Read(#[source] PublishError),
    #[error("writing published record: {0}")]
    Write(#[source] PublishError),
}
