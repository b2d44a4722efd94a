//! Stack synthesis errors
//!
//! Every variant here aborts synthesis. The one recoverable failure,
//! an unresolvable EKS cluster, never surfaces as a `StackError`; the
//! trust module logs it and falls back to account-root trust.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading configuration or declaring resources
#[derive(Debug, Error)]
pub enum StackError {
    /// A required configuration key has no value in any layer
    #[error("Missing required configuration value: {key}")]
    MissingConfig { key: String },

    /// A configuration value exists but cannot be used
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    /// The stack settings file exists but could not be read or parsed
    #[error("Failed to load stack settings from {path}: {reason}")]
    ConfigFile { path: PathBuf, reason: String },

    /// Two resources were declared with the same logical name
    #[error("Resource already declared: {0}")]
    DuplicateResource(String),

    /// A resource or export references a resource not declared before it
    #[error("Resource {from} references undeclared resource {to}")]
    UnknownReference { from: String, to: String },

    /// STS caller identity could not be determined
    #[error("Caller identity lookup failed: {0}")]
    CallerIdentity(String),

    /// Rendering the program document failed
    #[error("Failed to render program: {0}")]
    Render(String),
}

impl From<serde_yaml::Error> for StackError {
    fn from(err: serde_yaml::Error) -> Self {
        StackError::Render(err.to_string())
    }
}

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        StackError::Render(err.to_string())
    }
}

pub type Result<T, E = StackError> = std::result::Result<T, E>;
