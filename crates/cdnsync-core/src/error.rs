//! Error types for cdnsync
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

use crate::model::{ServiceId, VersionNumber};

/// Result type alias for cdnsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for cdnsync
#[derive(Error, Debug)]
pub enum Error {
    /// Remote provider returned an error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// HTTP transport errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication errors
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limiting errors
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Remote object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The remote system rejected a draft version during validation
    #[error("Invalid configuration for service {service_id} version {version}: {message}")]
    Validation {
        /// Service being reconciled
        service_id: ServiceId,
        /// Draft version that failed validation
        version: VersionNumber,
        /// Message reported by the remote system, verbatim
        message: String,
    },

    /// A deleted service is still listed by the remote system
    #[error("Tried deleting service {service_id}, but it was still found after delete")]
    StillPresent {
        /// Service that should be gone
        service_id: ServiceId,
    },

    /// A cloned version never became writable
    #[error("Version {version} of service {service_id} not ready after {attempts} attempts")]
    VersionNotReady {
        /// Service owning the clone
        service_id: ServiceId,
        /// Cloned version
        version: VersionNumber,
        /// Number of readiness polls performed
        attempts: u32,
    },

    /// A remote failure with the operation it happened in
    #[error("{context}")]
    Context {
        /// What was being attempted (service, version, sub-resource)
        context: String,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// State store-related errors
    #[error("State store error: {0}")]
    StateStore(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

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

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a rate limit error
    pub fn rate_limited(msg: impl Into<String>) -> Self {
        Self::RateLimited(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a state store error
    pub fn state_store(msg: impl Into<String>) -> Self {
        Self::StateStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Wrap this error with a description of the failed operation
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context layers
    pub fn root(&self) -> &Error {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the remote system reported the object as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), Self::NotFound(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Extension for attaching operation context to remote results
pub trait ResultExt<T> {
    /// Attach context lazily, only on the error path
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| e.context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_the_remote_message() {
        let err = Error::provider("fastly", "409 conflict")
            .context("deleting backend origin-a (service abc, version 4)");

        let rendered = err.to_string();
        assert!(rendered.contains("deleting backend origin-a"));
        assert!(rendered.contains("409 conflict"));
    }

    #[test]
    fn root_skips_nested_context() {
        let err = Error::not_found("service abc")
            .context("fetching service")
            .context("reconciling abc");

        assert!(err.is_not_found());
        assert!(matches!(err.root(), Error::NotFound(_)));
    }

    #[test]
    fn validation_error_surfaces_message_verbatim() {
        let err = Error::Validation {
            service_id: ServiceId::new("abc"),
            version: VersionNumber::new(2),
            message: "missing origin".to_string(),
        };
        assert!(err.to_string().ends_with("missing origin"));
    }
}
