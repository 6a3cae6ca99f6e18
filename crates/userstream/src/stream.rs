//! Decode loop and the bounded tweet channel.
//!
//! [`TweetStream::spawn`] runs one tokio task that reads body chunks, splits
//! them into lines, and sends projected tweets over an `mpsc` channel. A full
//! channel blocks the task, which in turn stops reads from the body.

use std::fmt::Display;
use std::ops::ControlFlow;
use std::pin::{Pin, pin};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::StreamConfig;
use crate::decode::{LineDecoder, LineOutcome, decode_line};
use crate::error::UserStreamError;
use crate::types::Tweet;

/// Settings for one decode task.
#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Channel capacity
    pub capacity: usize,

    /// Longest wait for a body chunk
    pub stall_timeout: Duration,

    /// Consecutive read errors before giving up
    pub max_read_errors: u32,

    /// Longest unterminated line kept in memory
    pub max_line_bytes: usize,
}

impl From<&StreamConfig> for DecodeOptions {
    fn from(config: &StreamConfig) -> Self {
        Self {
            capacity: config.channel_capacity,
            stall_timeout: config.stall_timeout,
            max_read_errors: config.max_read_errors,
            max_line_bytes: config.max_line_bytes,
        }
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::from(&StreamConfig::default())
    }
}

/// Counters collected by the decode task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    /// Non-empty lines seen
    pub lines: u64,
    /// Tweets delivered to the channel
    pub tweets: u64,
    /// Event and friends-list messages discarded
    pub noise: u64,
    /// JSON objects that were not statuses
    pub skipped: u64,
    /// Statuses dropped for missing or mistyped fields
    pub rejected: u64,
    /// Lines that were not valid JSON objects
    pub malformed: u64,
    /// Body read failures and stalls
    pub read_errors: u64,
}

/// Why the decode task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The response body ended
    Exhausted,
    /// The cancellation token fired
    Cancelled,
    /// The consumer dropped its side of the channel
    ConsumerDropped,
    /// Too many consecutive read errors
    ReadErrors,
}

/// Final state of a decode task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeReport {
    pub stats: DecodeStats,
    pub end: StreamEnd,
}

/// Receiving side of a running decode task.
///
/// Yields tweets in wire order. `recv` returns `None` once the task has ended
/// and everything buffered has been drained.
pub struct TweetStream {
    rx: mpsc::Receiver<Tweet>,
    cancel: CancellationToken,
    task: JoinHandle<DecodeReport>,
}

impl TweetStream {
    /// Spawn a decode task over `body`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<S, E>(body: S, options: DecodeOptions) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        Self::spawn_inner(body, options, CancellationToken::new())
    }

    /// Spawn a decode task that also stops when `parent` fires.
    ///
    /// The stream holds a child of `parent`: cancelling or dropping the stream
    /// never cancels `parent` or its other children.
    pub fn spawn_with_token<S, E>(body: S, options: DecodeOptions, parent: &CancellationToken) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        Self::spawn_inner(body, options, parent.child_token())
    }

    fn spawn_inner<S, E>(body: S, options: DecodeOptions, cancel: CancellationToken) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let options = DecodeOptions {
            capacity: options.capacity.max(1),
            max_read_errors: options.max_read_errors.max(1),
            max_line_bytes: options.max_line_bytes.max(1),
            ..options
        };
        let (tx, rx) = mpsc::channel(options.capacity);
        let task = tokio::spawn(run_decode_loop(body, tx, options, cancel.clone()));

        Self { rx, cancel, task }
    }

    /// Receive the next tweet.
    pub async fn recv(&mut self) -> Option<Tweet> {
        self.rx.recv().await
    }

    /// Ask the decode task to stop. Buffered tweets can still be drained.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that stops this stream when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel, wait for the task to release the connection, and report.
    pub async fn shutdown(self) -> DecodeReport {
        self.cancel.cancel();
        self.join().await
    }

    /// Disconnect the consumer, then wait for the task to finish.
    ///
    /// Undelivered tweets are discarded. A task blocked on a full channel
    /// ends with [`StreamEnd::ConsumerDropped`]; one waiting on the body keeps
    /// running until the body ends or the stream is cancelled.
    pub async fn join(mut self) -> DecodeReport {
        // Fails any pending send so the task sees the consumer is gone.
        self.rx.close();

        match (&mut self.task).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Decode task failed");
                DecodeReport {
                    stats: DecodeStats::default(),
                    end: StreamEnd::Cancelled,
                }
            }
        }
    }
}

impl Drop for TweetStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for TweetStream {
    type Item = Tweet;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Tweet>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for TweetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TweetStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

enum Chunk<E> {
    Data(Bytes),
    End,
    Failed(E),
    Stalled,
    Cancelled,
}

async fn run_decode_loop<S, E>(
    body: S,
    tx: mpsc::Sender<Tweet>,
    options: DecodeOptions,
    cancel: CancellationToken,
) -> DecodeReport
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let mut body = pin!(body);
    let mut decoder = LineDecoder::with_max_line_bytes(options.max_line_bytes);
    let mut stats = DecodeStats::default();
    let mut consecutive_errors = 0u32;

    let end = loop {
        let chunk = tokio::select! {
            biased;
            () = cancel.cancelled() => Chunk::Cancelled,
            next = tokio::time::timeout(options.stall_timeout, body.next()) => match next {
                Ok(Some(Ok(bytes))) => Chunk::Data(bytes),
                Ok(Some(Err(e))) => Chunk::Failed(e),
                Ok(None) => Chunk::End,
                Err(_) => Chunk::Stalled,
            },
        };

        let bytes = match chunk {
            Chunk::Data(bytes) => {
                consecutive_errors = 0;
                bytes
            }
            Chunk::Cancelled => {
                info!("Stream cancelled");
                break StreamEnd::Cancelled;
            }
            Chunk::End => {
                if let Some(line) = decoder.finish() {
                    if let ControlFlow::Break(end) =
                        handle_line(&line, &tx, &cancel, &mut stats).await
                    {
                        break end;
                    }
                }
                info!("Stream ended");
                break StreamEnd::Exhausted;
            }
            Chunk::Failed(e) => {
                let err = UserStreamError::LineRead(e.to_string());
                if read_failed(&err, &mut stats, &mut consecutive_errors, options) {
                    break StreamEnd::ReadErrors;
                }
                continue;
            }
            Chunk::Stalled => {
                let err = UserStreamError::LineRead(format!(
                    "no data for {}s",
                    options.stall_timeout.as_secs()
                ));
                if read_failed(&err, &mut stats, &mut consecutive_errors, options) {
                    break StreamEnd::ReadErrors;
                }
                continue;
            }
        };

        decoder.push(&bytes);
        let mut stop = None;
        while let Some(line) = decoder.next_line() {
            if let ControlFlow::Break(end) = handle_line(&line, &tx, &cancel, &mut stats).await {
                stop = Some(end);
                break;
            }
        }
        if let Some(end) = stop {
            break end;
        }

        if let Some(dropped) = decoder.take_overflow() {
            let err = UserStreamError::LineRead(format!(
                "line exceeds {} bytes, dropped {dropped} buffered bytes",
                options.max_line_bytes
            ));
            if read_failed(&err, &mut stats, &mut consecutive_errors, options) {
                break StreamEnd::ReadErrors;
            }
        }
    };

    info!(
        end = ?end,
        lines = stats.lines,
        tweets = stats.tweets,
        rejected = stats.rejected,
        malformed = stats.malformed,
        read_errors = stats.read_errors,
        "Decode loop finished"
    );

    DecodeReport { stats, end }
}

/// Record a read failure. Returns true once the error budget is spent.
fn read_failed(
    err: &UserStreamError,
    stats: &mut DecodeStats,
    consecutive_errors: &mut u32,
    options: DecodeOptions,
) -> bool {
    stats.read_errors += 1;
    *consecutive_errors += 1;
    warn!(
        error = %err,
        consecutive = *consecutive_errors,
        max = options.max_read_errors,
        "Error reading stream body"
    );
    *consecutive_errors >= options.max_read_errors
}

async fn handle_line(
    line: &str,
    tx: &mpsc::Sender<Tweet>,
    cancel: &CancellationToken,
    stats: &mut DecodeStats,
) -> ControlFlow<StreamEnd> {
    stats.lines += 1;

    match decode_line(line) {
        LineOutcome::Tweet(tweet) => {
            if tweet.in_reply_to_id == "null" {
                debug!(tweet_id = %tweet.id, "in_reply_to_status_id_str is the literal \"null\"");
            }
            debug!(tweet_id = %tweet.id, author = %tweet.author.screen_name, "Received tweet");

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    info!("Stream cancelled");
                    return ControlFlow::Break(StreamEnd::Cancelled);
                }
                sent = tx.send(tweet) => {
                    if sent.is_err() {
                        info!("Tweet receiver dropped, stopping stream");
                        return ControlFlow::Break(StreamEnd::ConsumerDropped);
                    }
                }
            }
            stats.tweets += 1;
        }
        LineOutcome::Noise(kind) => {
            stats.noise += 1;
            trace!(kind = ?kind, "Skipping control message");
        }
        LineOutcome::Skipped => {
            stats.skipped += 1;
            debug!("Skipping non-status record");
        }
        LineOutcome::Rejected(e) => {
            stats.rejected += 1;
            warn!(error = %e, "Dropping malformed tweet record");
        }
        LineOutcome::Malformed(e) => {
            stats.malformed += 1;
            warn!(error = %e, data = %line, "Failed to parse stream line");
        }
    }

    ControlFlow::Continue(())
}
