//! User stream client configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::decode::DEFAULT_MAX_LINE_BYTES;
use crate::error::{UserStreamError, UserStreamResult};

/// Environment variable overriding [`StreamConfig::stream_url`].
pub const ENV_STREAM_URL: &str = "USERSTREAM_URL";
/// Environment variable overriding [`StreamConfig::credentials_path`].
pub const ENV_CREDENTIALS_PATH: &str = "USERSTREAM_CREDENTIALS";

/// Configuration for the user stream client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Streaming endpoint (default: https://userstream.twitter.com/1.1/user.json)
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// Credentials file used when the environment does not provide them
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,

    /// Undelivered tweets buffered before the decode loop blocks
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// TCP/TLS connect timeout
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Longest wait for body data before it counts as a read error
    #[serde(default = "default_stall_timeout", with = "duration_secs")]
    pub stall_timeout: Duration,

    /// Consecutive read errors tolerated before the decode loop gives up
    #[serde(default = "default_max_read_errors")]
    pub max_read_errors: u32,

    /// Longest line buffered while waiting for its newline
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_stream_url() -> String {
    "https://userstream.twitter.com/1.1/user.json".into()
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("CREDENTIALS")
}

const fn default_channel_capacity() -> usize {
    10
}

const fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

// Keep-alive newlines arrive every 30s; three missed ones means the stream stalled.
const fn default_stall_timeout() -> Duration {
    Duration::from_secs(90)
}

const fn default_max_read_errors() -> u32 {
    5
}

const fn default_max_line_bytes() -> usize {
    DEFAULT_MAX_LINE_BYTES
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            stream_url: default_stream_url(),
            credentials_path: default_credentials_path(),
            channel_capacity: default_channel_capacity(),
            connect_timeout: default_connect_timeout(),
            stall_timeout: default_stall_timeout(),
            max_read_errors: default_max_read_errors(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

impl StreamConfig {
    /// Defaults with overrides from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides read through `lookup`.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_STREAM_URL).filter(|v| !v.is_empty()) {
            config.stream_url = url;
        }
        if let Some(path) = lookup(ENV_CREDENTIALS_PATH).filter(|v| !v.is_empty()) {
            config.credentials_path = PathBuf::from(path);
        }
        config
    }

    /// Parse and check the endpoint URL.
    pub fn endpoint(&self) -> UserStreamResult<reqwest::Url> {
        let url = reqwest::Url::parse(&self.stream_url).map_err(|e| {
            UserStreamError::Config(format!("invalid stream_url {:?}: {e}", self.stream_url))
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(UserStreamError::Config(format!(
                "unsupported stream_url scheme: {other}"
            ))),
        }
    }

    /// Reject settings the decode loop cannot run with.
    pub fn validate(&self) -> UserStreamResult<()> {
        self.endpoint()?;

        if self.channel_capacity == 0 {
            return Err(UserStreamError::Config(
                "channel_capacity must be at least 1".into(),
            ));
        }
        if self.stall_timeout.is_zero() {
            return Err(UserStreamError::Config(
                "stall_timeout must be non-zero".into(),
            ));
        }
        if self.max_read_errors == 0 {
            return Err(UserStreamError::Config(
                "max_read_errors must be at least 1".into(),
            ));
        }
        if self.max_line_bytes == 0 {
            return Err(UserStreamError::Config(
                "max_line_bytes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert_eq!(config.stream_url, "https://userstream.twitter.com/1.1/user.json");
        assert_eq!(config.credentials_path, PathBuf::from("CREDENTIALS"));
        assert_eq!(config.channel_capacity, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_fills_defaults() {
        let config: StreamConfig =
            serde_json::from_str(r#"{"stream_url":"http://localhost:8080/stream","stall_timeout":5}"#)
                .unwrap();

        assert_eq!(config.stream_url, "http://localhost:8080/stream");
        assert_eq!(config.stall_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.max_read_errors, 5);
        assert_eq!(config.max_line_bytes, 1 << 20);
    }

    #[test]
    fn test_env_overrides() {
        let config = StreamConfig::from_env_with(|key| match key {
            ENV_STREAM_URL => Some("http://127.0.0.1:9000/user.json".into()),
            ENV_CREDENTIALS_PATH => Some("/etc/userstream/creds".into()),
            _ => None,
        });

        assert_eq!(config.stream_url, "http://127.0.0.1:9000/user.json");
        assert_eq!(config.credentials_path, PathBuf::from("/etc/userstream/creds"));
    }

    #[test]
    fn test_empty_env_override_is_ignored() {
        let config = StreamConfig::from_env_with(|_| Some(String::new()));
        assert_eq!(config.stream_url, default_stream_url());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = StreamConfig {
            channel_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(UserStreamError::Config(_))));

        let config = StreamConfig {
            stream_url: "ftp://example.com/stream".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StreamConfig {
            stream_url: "not a url".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StreamConfig {
            max_read_errors: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = StreamConfig {
            max_line_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
