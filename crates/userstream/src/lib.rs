//! Twitter user stream client.
//!
//! Signs a request with OAuth 1.0a, opens the long-lived user stream, and
//! decodes its newline-delimited JSON into a bounded channel of [`Tweet`]s.
//!
//! ```no_run
//! # async fn run() -> userstream::UserStreamResult<()> {
//! let client = userstream::StreamClient::with_config(userstream::StreamConfig::from_env())?;
//! let mut tweets = client.stream().await?;
//! while let Some(tweet) = tweets.recv().await {
//!     println!("@{}: {}", tweet.author.screen_name, tweet.text);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Heartbeats, `event` and `friends` control messages, and records that do
//! not project cleanly are dropped inside the decode loop. The consumer only
//! ever sees complete tweets.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod client;
mod config;
mod credentials;
mod decode;
mod error;
mod oauth;
mod stream;
mod types;

pub use client::StreamClient;
pub use config::{ENV_CREDENTIALS_PATH, ENV_STREAM_URL, StreamConfig};
pub use credentials::{
    Credentials, ENV_CONSUMER_KEY, ENV_CONSUMER_SECRET, ENV_TOKEN, ENV_TOKEN_SECRET,
};
pub use decode::{DEFAULT_MAX_LINE_BYTES, LineDecoder, LineOutcome, classify, decode_line};
pub use error::{ProjectionError, UserStreamError, UserStreamResult};
pub use oauth::{OAuthSigner, RequestSigner};
pub use stream::{DecodeOptions, DecodeReport, DecodeStats, StreamEnd, TweetStream};
pub use types::{NoiseKind, RawRecord, StreamLine, Tweet, User, project};
