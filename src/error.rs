//! Error handling for the TrackHub sync client

use std::fmt;
use thiserror::Error;

/// Unified error type for the TrackHub sync client
#[derive(Error, Debug)]
pub enum Error {
    /// Network or HTTP related errors (connection failures, timeouts)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The token endpoint rejected an authorization code exchange
    #[error("Token error: {0}")]
    TokenExchange(String),

    /// The revoke endpoint rejected a revocation request
    #[error("Revoke failed with status {status}: {body}")]
    Revoke { status: u16, body: String },

    /// The authorization callback carried a `state` we did not send
    #[error("Authorization state mismatch")]
    StateMismatch,

    /// The operation was cancelled before it completed
    #[error("Operation cancelled")]
    Cancelled,

    /// Secret store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new storage error
    pub fn storage<T: fmt::Display>(msg: T) -> Self {
        Error::Storage(msg.to_string())
    }

    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// Whether this error is a cancellation rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
