//! Error types for skybridge-kube

use thiserror::Error;

/// Result type for skybridge-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors raised by the Kubernetes-facing collaborators
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// The referenced kind is not registered
    #[error("unsupported kind {gvr:?}")]
    UnsupportedKind { gvr: String },

    /// A fresh object of a registered kind could not be built
    #[error("failed to build {kind} object: {message}")]
    Construct { kind: String, message: String },

    /// A value had the wrong shape for a kind's codec
    #[error("unexpected value: {message}")]
    Value { message: String },

    /// Tree or codec failure from the core crate
    #[error(transparent)]
    Core(#[from] skybridge_core::CoreError),
}
