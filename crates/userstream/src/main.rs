//! userstream - prints the authenticated user's stream as JSON lines.
//!
//! Credentials come from `OAUTH_CONSUMER_KEY`, `OAUTH_CONSUMER_SECRET`,
//! `OAUTH_TOKEN` and `OAUTH_TOKEN_SECRET`, or from the `CREDENTIALS` file.

#![forbid(unsafe_code)]

use std::io::Write;

use anyhow::{Result, bail};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use userstream::StreamClient;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let Some(client) = StreamClient::new() else {
        bail!("could not create user stream client");
    };

    let mut tweets = match client.stream().await {
        Ok(tweets) => tweets,
        Err(e) if e.is_connection_error() => bail!("could not connect to user stream: {e}"),
        Err(e) => return Err(e.into()),
    };
    let mut stdout = std::io::stdout();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, closing stream");
                break;
            }
            next = tweets.recv() => {
                let Some(tweet) = next else { break };
                let line = serde_json::to_string(&tweet)?;
                writeln!(stdout, "{line}")?;
                stdout.flush()?;
            }
        }
    }

    let report = tweets.shutdown().await;
    tracing::info!(end = ?report.end, stats = ?report.stats, "User stream closed");

    Ok(())
}
