//! User stream client: connects with a signed request and hands the body to
//! the decode loop.

use reqwest::{Client, Response};
use tracing::{error, info, instrument};

use crate::{
    config::StreamConfig,
    credentials::Credentials,
    error::{UserStreamError, UserStreamResult},
    oauth::{OAuthSigner, RequestSigner},
    stream::{DecodeOptions, TweetStream},
};

/// Client for one logical user stream session.
pub struct StreamClient {
    client: Client,
    signer: Box<dyn RequestSigner>,
    endpoint: reqwest::Url,
    config: StreamConfig,
}

impl StreamClient {
    /// Build a client from environment configuration and resolved credentials.
    ///
    /// Returns `None` and logs the cause when anything is missing.
    #[must_use]
    pub fn new() -> Option<Self> {
        match Self::with_config(StreamConfig::from_env()) {
            Ok(client) => Some(client),
            Err(e) => {
                error!(error = %e, "Could not create user stream client");
                None
            }
        }
    }

    /// Build a client, resolving credentials from the environment or
    /// `config.credentials_path`.
    pub fn with_config(config: StreamConfig) -> UserStreamResult<Self> {
        Self::with_config_and_env(config, |key| std::env::var(key).ok())
    }

    /// Like [`Self::with_config`], reading credential variables through `lookup`.
    pub fn with_config_and_env<F>(config: StreamConfig, lookup: F) -> UserStreamResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = Credentials::resolve_with(lookup, &config.credentials_path)?;
        Self::from_credentials(credentials, config)
    }

    /// Build a client signing with OAuth 1.0a `credentials`.
    pub fn from_credentials(credentials: Credentials, config: StreamConfig) -> UserStreamResult<Self> {
        Self::from_signer(OAuthSigner::new(credentials), config)
    }

    /// Build a client around any request signer.
    pub fn from_signer(
        signer: impl RequestSigner + 'static,
        config: StreamConfig,
    ) -> UserStreamResult<Self> {
        config.validate()?;
        let endpoint = config.endpoint()?;

        // No overall timeout: it would cut the long-lived body short.
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(format!("userstream/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            signer: Box::new(signer),
            endpoint,
            config,
        })
    }

    /// The configuration this client was built with.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Open the stream: sign a GET to the endpoint and return the response
    /// once headers arrive, body unread.
    #[instrument(skip(self), fields(url = %self.endpoint))]
    pub async fn connect(&self) -> UserStreamResult<Response> {
        info!("Connecting to user stream");

        let mut request = self.client.get(self.endpoint.clone()).build()?;
        self.signer.sign(&mut request)?;

        let response = self.client.execute(request).await.map_err(|e| {
            error!(error = %e, "Connection error");
            UserStreamError::Connection(e)
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!(status, message = %message, "User stream rejected connection");
            return Err(UserStreamError::Api { status, message });
        }

        info!(status = response.status().as_u16(), "User stream connected");
        Ok(response)
    }

    /// Start decoding `response` on a background task.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn read_stream(&self, response: Response) -> TweetStream {
        TweetStream::spawn(response.bytes_stream(), DecodeOptions::from(&self.config))
    }

    /// [`Self::connect`] followed by [`Self::read_stream`].
    pub async fn stream(&self) -> UserStreamResult<TweetStream> {
        let response = self.connect().await?;
        Ok(self.read_stream(response))
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
