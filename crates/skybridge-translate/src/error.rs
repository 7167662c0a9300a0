//! Error types for skybridge-translate

use thiserror::Error;

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, TranslateError>;

/// Errors raised while translating between resource and API shapes
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TranslateError {
    /// A failure wrapped with the path or field being processed, so the
    /// outermost error carries a full trail
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<TranslateError>,
    },

    /// The mapping document holds a node matching no known shape
    #[error("malformed mapping node at {path:?}: {reason}")]
    Mapping { path: String, reason: String },

    /// A populated reference carries no usable name selector value
    #[error("reference at {path:?} has no name selector value")]
    MissingSelector { path: String },

    /// The referenced object is absent from the dependency set
    #[error("referenced object {name:?} not found")]
    ReferenceNotFound { name: String },

    /// No declared property or selector matched on the referenced kind
    #[error("no property or selector matched for {name:?}")]
    ReferenceValueNotFound { name: String },

    /// The found object does not carry the declared kind identity
    #[error("referenced object {name:?} is {found:?}, expected {expected:?}")]
    TypeConflict {
        name: String,
        expected: String,
        found: String,
    },

    /// The requested version is not declared by the resource definition
    #[error("schema does not declare version {version:?}")]
    UnknownVersion { version: String },

    /// The resource definition carries no usable schema
    #[error("resource definition has no usable schema: {message}")]
    Schema { message: String },

    /// An object violated the compiled resource schema
    #[error("schema validation failed: {message}")]
    Validation { message: String },

    /// The mapping document annotation is not valid YAML
    #[error("failed to parse the mapping document: {0}")]
    MappingDocument(#[from] serde_yaml::Error),

    /// Tree or codec failure from the core crate
    #[error(transparent)]
    Core(#[from] skybridge_core::CoreError),

    /// Registry or object-construction failure
    #[error(transparent)]
    Kube(#[from] skybridge_kube::KubeError),
}

impl TranslateError {
    /// Wrap this error with the path or field being processed.
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

pub(crate) trait ResultExt<T> {
    /// Add path context to a failure on the way out.
    fn context_with(self, f: impl FnOnce() -> String) -> Result<T>;
}

impl<T, E: Into<TranslateError>> ResultExt<T> for std::result::Result<T, E> {
    fn context_with(self, f: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|e| e.into().context(f()))
    }
}
