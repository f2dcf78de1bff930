//! Result and error types for Vigia.

use thiserror::Error;

/// Result type for Vigia operations
pub type VigiaResult<T> = Result<T, VigiaError>;

/// Errors that can occur in Vigia
#[derive(Debug, Error)]
pub enum VigiaError {
    /// DOM query or mutation failed
    #[error("DOM operation failed: {message}")]
    Dom {
        /// Error message
        message: String,
    },

    /// Drawing surface operation failed
    #[error("Surface operation {operation} failed: {message}")]
    Surface {
        /// Operation name (e.g. `fillRect`)
        operation: String,
        /// Error message
        message: String,
    },

    /// Scheduling a frame or timer callback failed
    #[error("Scheduler error: {message}")]
    Scheduler {
        /// Error message
        message: String,
    },

    /// The host exposes no heap introspection API
    #[error("Memory introspection is not available on this page")]
    MemoryUnavailable,

    /// Reading heap usage failed
    #[error("Memory read failed: {message}")]
    MemoryRead {
        /// Error message
        message: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl VigiaError {
    /// Create a DOM error
    #[must_use]
    pub fn dom(message: impl Into<String>) -> Self {
        Self::Dom {
            message: message.into(),
        }
    }

    /// Create a surface error for the given operation
    #[must_use]
    pub fn surface(operation: &str, message: impl Into<String>) -> Self {
        Self::Surface {
            operation: operation.to_string(),
            message: message.into(),
        }
    }

    /// Create a config error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
