//! OAuth credential resolution.
//!
//! Credentials come from the environment when `OAUTH_CONSUMER_KEY` is set,
//! otherwise from a four-line plaintext file.

use std::fmt;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{UserStreamError, UserStreamResult};

/// Environment variable holding the consumer key. Its presence selects env mode.
pub const ENV_CONSUMER_KEY: &str = "OAUTH_CONSUMER_KEY";
/// Environment variable holding the consumer secret.
pub const ENV_CONSUMER_SECRET: &str = "OAUTH_CONSUMER_SECRET";
/// Environment variable holding the access token.
pub const ENV_TOKEN: &str = "OAUTH_TOKEN";
/// Environment variable holding the access token secret.
pub const ENV_TOKEN_SECRET: &str = "OAUTH_TOKEN_SECRET";

/// The four OAuth 1.0a secrets needed to sign user-context requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// OAuth 1.0a Consumer Key (API Key)
    pub consumer_key: String,

    /// OAuth 1.0a Consumer Secret (API Secret)
    pub consumer_secret: String,

    /// OAuth 1.0a Access Token
    pub access_token: String,

    /// OAuth 1.0a Access Token Secret
    pub access_token_secret: String,
}

impl Credentials {
    /// Build credentials from the four values.
    pub fn new(
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
        access_token: impl Into<String>,
        access_token_secret: impl Into<String>,
    ) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            access_token: access_token.into(),
            access_token_secret: access_token_secret.into(),
        }
    }

    /// Resolve credentials from the process environment, falling back to `path`.
    pub fn resolve(path: &Path) -> UserStreamResult<Self> {
        Self::resolve_with(|key| std::env::var(key).ok(), path)
    }

    /// Resolve credentials using `lookup` as the environment.
    ///
    /// Env mode wins whenever the consumer key variable is present. The other
    /// three are then taken verbatim, with absent ones read as empty strings.
    pub fn resolve_with<F>(lookup: F, path: &Path) -> UserStreamResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = if let Some(credentials) = Self::from_env_with(&lookup) {
            debug!("Resolved OAuth credentials from environment");
            credentials
        } else {
            let credentials = Self::from_file(path)?;
            debug!(path = %path.display(), "Resolved OAuth credentials from file");
            credentials
        };

        if !credentials.is_complete() {
            warn!("Resolved OAuth credentials are incomplete");
        }
        Ok(credentials)
    }

    /// Read credentials from the environment, if env mode applies.
    pub fn from_env_with<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let consumer_key = lookup(ENV_CONSUMER_KEY)?;

        Some(Self {
            consumer_key,
            consumer_secret: lookup(ENV_CONSUMER_SECRET).unwrap_or_default(),
            access_token: lookup(ENV_TOKEN).unwrap_or_default(),
            access_token_secret: lookup(ENV_TOKEN_SECRET).unwrap_or_default(),
        })
    }

    /// Read credentials from a newline-separated file.
    pub fn from_file(path: &Path) -> UserStreamResult<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| UserStreamError::CredentialUnavailable {
                source_desc: format!("file {}", path.display()),
                reason: e.to_string(),
            })?;

        Self::parse(&contents).map_err(|reason| UserStreamError::CredentialUnavailable {
            source_desc: format!("file {}", path.display()),
            reason,
        })
    }

    /// Map the first four newline-separated fields of `contents` positionally.
    ///
    /// Order: consumer key, consumer secret, access token, access token secret.
    /// Every `\n` separates a field, so a trailing newline after the third
    /// value yields an empty fourth. A trailing `\r` on a field is dropped.
    /// Values are not checked beyond their count.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let mut lines = contents.split('\n');
        let mut next = |index: usize| {
            lines
                .next()
                .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                .ok_or_else(|| format!("expected 4 lines, found {index}"))
        };

        Ok(Self {
            consumer_key: next(0)?,
            consumer_secret: next(1)?,
            access_token: next(2)?,
            access_token_secret: next(3)?,
        })
    }

    /// Whether all four values are non-empty.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.consumer_key.is_empty()
            && !self.consumer_secret.is_empty()
            && !self.access_token.is_empty()
            && !self.access_token_secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("access_token", &self.access_token)
            .field("access_token_secret", &"[REDACTED]")
            .finish()
    }
}
