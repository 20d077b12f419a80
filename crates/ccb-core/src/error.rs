//! Error types for CCB Core
//!
//! - [`ConfigError`] for configuration loading
//! - [`ApiError`] for the analytics backend
//! - [`BuilderError`], the umbrella type returned by session operations

use ccb_bridge::{BridgeError, HostError};
use ccb_query::QueryPrepError;
use ccb_slots::{ManifestError, SlotError};

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        source: std::io::Error,
    },

    /// TOML could not be parsed
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Analytics backend errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Request never produced a response
    #[error("request failed: {0}")]
    Transport(String),

    /// Request exceeded its timeout
    #[error("request timed out")]
    Timeout,

    /// Non-success HTTP status without an error body
    #[error("backend returned status {0}")]
    Status(u16),

    /// Backend answered with `{error: {message}}`
    #[error("{0}")]
    Backend(String),

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),

    /// No credentials configured
    #[error("missing API credentials")]
    MissingCredentials,
}

impl ApiError {
    /// Whether retrying the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status(status) => *status >= 500 || *status == 429,
            Self::Backend(_) | Self::Decode(_) | Self::MissingCredentials => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Main chart builder error type
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Manifest error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Slot mutation rejected
    #[error("slot error: {0}")]
    Slot(#[from] SlotError),

    /// Query could not be derived
    #[error("query preparation failed: {0}")]
    QueryPrep(#[from] QueryPrepError),

    /// Bridge error
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Sandbox host error
    #[error("sandbox error: {0}")]
    Host(#[from] HostError),

    /// Backend error
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// No authenticated user; the chart bundle is not loaded
    #[error("not authenticated")]
    Unauthenticated,

    /// The session task has stopped
    #[error("chart session closed")]
    SessionClosed,
}

impl BuilderError {
    /// Check if error is retryable
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable(),
            Self::Host(e) => e.is_transient(),
            _ => false,
        }
    }
}
