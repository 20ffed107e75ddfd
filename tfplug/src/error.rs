//! Error types for tfplug

/// Failures of the framework plumbing itself. Provider-visible problems are
/// reported as [`crate::types::Diagnostic`]s instead.
#[derive(Debug, thiserror::Error)]
pub enum TfplugError {
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("unknown data source type: {0}")]
    UnknownDataSourceType(String),

    #[error("provider not configured")]
    ProviderNotConfigured,

    #[error("configuring {type_name} failed: {summary}")]
    ConfigureFailed { type_name: String, summary: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("attribute not found: {0}")]
    AttributeNotFound(String),

    #[error("invalid attribute path: {0}")]
    InvalidPath(String),

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

pub type Result<T> = std::result::Result<T, TfplugError>;

impl From<serde_json::Error> for TfplugError {
    fn from(e: serde_json::Error) -> Self {
        TfplugError::EncodingError(e.to_string())
    }
}
