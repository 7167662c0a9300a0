//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("path {path:?} not found")]
    NotFound { path: String },

    #[error("path {path:?} holds {found}, expected an object")]
    TypeMismatch { path: String, found: &'static str },

    #[error("path {path:?} is already set")]
    AlreadySet { path: String },

    #[error("failed to convert value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("encoding error: {message}")]
    Encoding { message: String },

    #[error("failed to decode opaque payload: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("decoded payload is not valid UTF-8: {0}")]
    DecodeUtf8(#[from] std::string::FromUtf8Error),
}

impl CoreError {
    /// Whether this error is the matchable not-found condition used to
    /// drive ordered fallback chains.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
