//! User stream error types.

use thiserror::Error;

/// Errors raised while building a client or opening the stream.
///
/// Per-line decode failures never surface here; the decode loop logs them and
/// moves on (see [`ProjectionError`]).
#[derive(Error, Debug)]
pub enum UserStreamError {
    /// Credentials could not be read from the environment or the credentials file
    #[error("Credentials unavailable from {source_desc}: {reason}")]
    CredentialUnavailable { source_desc: String, reason: String },

    /// Transport failure while building or executing the request
    #[error("Connection error: {0}")]
    Connection(#[from] reqwest::Error),

    /// OAuth signature generation failed
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Streaming endpoint answered with a non-success status
    #[error("Stream API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Reading from the open response body failed
    #[error("Line read error: {0}")]
    LineRead(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl UserStreamError {
    /// True when the failure was on the network side of `connect`.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Api { .. } | Self::OAuth(_))
    }
}

/// Why a data record could not be turned into a [`crate::Tweet`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    /// A required field is absent or null
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A field is present with the wrong JSON type
    #[error("field `{field}` has wrong type, expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// Result type for user stream operations.
pub type UserStreamResult<T> = Result<T, UserStreamError>;
