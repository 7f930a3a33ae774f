//! Error types for Manifold

use thiserror::Error;

/// Result type for Manifold operations
pub type Result<T> = std::result::Result<T, ManifoldError>;

/// Manifold error types
#[derive(Error, Debug)]
pub enum ManifoldError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed service '{service}' field '{field}': {message}")]
    MalformedServiceSpec {
        service: String,
        field: String,
        message: String,
    },

    #[error("Compose file parse error: {0}")]
    ComposeParse(String),

    #[error("Build error: {0}")]
    Build(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ManifoldError {
    /// Build a malformed-field error for a service
    pub fn malformed(service: &str, field: &str, message: impl Into<String>) -> Self {
        ManifoldError::MalformedServiceSpec {
            service: service.to_string(),
            field: field.to_string(),
            message: message.into(),
        }
    }
}
