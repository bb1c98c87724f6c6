//! Error types for the geowatch system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for geowatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the geowatch system
#[derive(Error, Debug)]
pub enum Error {
    /// Provider-specific error (network, status, malformed body)
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// A provider call exceeded the per-request timeout
    #[error("Provider {provider} timed out after {secs}s")]
    Timeout {
        /// Provider name
        provider: String,
        /// Timeout that elapsed
        secs: u64,
    },

    /// A payload field could not be converted to its canonical type
    #[error("Cannot normalize field {field}: {message}")]
    Normalize {
        /// Canonical field name
        field: String,
        /// Error message
        message: String,
    },

    /// History store errors
    #[error("History store error: {0}")]
    History(String),

    /// Notification channel errors
    #[error("Notification error ({channel}): {message}")]
    Notify {
        /// Channel name
        channel: String,
        /// Error message
        message: String,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQLite errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(provider: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            provider: provider.into(),
            secs,
        }
    }

    /// Create a normalization error
    pub fn normalize(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Normalize {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a history store error
    pub fn history(msg: impl Into<String>) -> Self {
        Self::History(msg.into())
    }

    /// Create a notification error
    pub fn notify(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Notify {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error only concerns a single provider's contribution
    pub fn is_provider_scoped(&self) -> bool {
        matches!(
            self,
            Self::Provider { .. } | Self::Timeout { .. } | Self::Normalize { .. }
        )
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
