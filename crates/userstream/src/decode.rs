//! Line splitting and classification for the stream body.

use crate::error::ProjectionError;
use crate::types::{NoiseKind, RawRecord, StreamLine, Tweet, project};

const EVENT_PREFIX: &str = r#"{"event":"#;
const FRIENDS_PREFIX: &str = r#"{"friends":"#;

/// Longest unterminated line [`LineDecoder::new`] keeps buffered.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1 << 20;

/// Reassembles newline-delimited lines from arbitrarily split body chunks.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    // Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    max_line_bytes: usize,
    // Set after an overflow until the oversized line's newline goes by.
    discarding: bool,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_max_line_bytes(DEFAULT_MAX_LINE_BYTES)
    }

    /// Decoder that gives up on lines longer than `max_line_bytes`.
    #[must_use]
    pub const fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes,
            discarding: false,
        }
    }

    /// Append a body chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete, trimmed, non-empty line.
    ///
    /// Bytes after the last newline stay buffered until more data arrives.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let newline_pos = self.scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.scanned = 0;

            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if let Some(line) = trimmed(&line) {
                return Some(line);
            }
        }
        self.scanned = self.buffer.len();
        None
    }

    /// Drop a partial line that has outgrown the limit.
    ///
    /// Returns the number of bytes dropped. The rest of that line, up to its
    /// newline, is discarded as it arrives.
    pub fn take_overflow(&mut self) -> Option<usize> {
        if self.buffer.len() <= self.max_line_bytes {
            return None;
        }
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.scanned = 0;
        self.discarding = true;
        Some(dropped)
    }

    /// Flush an unterminated final line once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        trimmed(&rest)
    }

    /// Bytes waiting for a newline.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn trimmed(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Classify a trimmed, non-empty line.
#[must_use]
pub fn classify(line: &str) -> StreamLine {
    if line.starts_with(EVENT_PREFIX) {
        return StreamLine::Noise(NoiseKind::Event);
    }
    if line.starts_with(FRIENDS_PREFIX) {
        return StreamLine::Noise(NoiseKind::Friends);
    }

    match serde_json::from_str::<RawRecord>(line) {
        Ok(record) => StreamLine::Record(record),
        Err(e) => StreamLine::Malformed(e),
    }
}

/// What became of one line.
#[derive(Debug)]
pub enum LineOutcome {
    /// A tweet to deliver
    Tweet(Tweet),

    /// Control message, dropped silently
    Noise(NoiseKind),

    /// Valid JSON that is not a status (deletes, limits, ...)
    Skipped,

    /// A status whose fields could not be projected
    Rejected(ProjectionError),

    /// Not parseable as a JSON object
    Malformed(serde_json::Error),
}

/// Run one line through classification and projection.
#[must_use]
pub fn decode_line(line: &str) -> LineOutcome {
    match classify(line) {
        StreamLine::Noise(kind) => LineOutcome::Noise(kind),
        StreamLine::Malformed(e) => LineOutcome::Malformed(e),
        StreamLine::Record(record) if !record.is_status() => LineOutcome::Skipped,
        StreamLine::Record(record) => match project(record) {
            Ok(tweet) => LineOutcome::Tweet(tweet),
            Err(e) => LineOutcome::Rejected(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOB: &str = r#"{"id":123,"id_str":"123","text":"hi","in_reply_to_status_id_str":"null","user":{"screen_name":"bob","name":"Bob"}}"#;

    #[test]
    fn test_splits_and_trims_lines() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"  first  \r\nsecond\n");

        assert_eq!(decoder.next_line().as_deref(), Some("first"));
        assert_eq!(decoder.next_line().as_deref(), Some("second"));
        assert_eq!(decoder.next_line(), None);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_skips_blank_keepalive_lines() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"\r\n\n   \t\nvalue\n\r\n");

        assert_eq!(decoder.next_line().as_deref(), Some("value"));
        assert_eq!(decoder.next_line(), None);
    }

    #[test]
    fn test_holds_partial_line_across_chunks() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"{\"id\":1,");
        assert_eq!(decoder.next_line(), None);
        assert_eq!(decoder.pending(), 8);

        decoder.push(b"\"text\":\"x\"}\n{\"id");
        assert_eq!(decoder.next_line().as_deref(), Some(r#"{"id":1,"text":"x"}"#));
        assert_eq!(decoder.next_line(), None);
        assert_eq!(decoder.finish().as_deref(), Some("{\"id"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_many_small_chunks_form_one_line() {
        let line = r#"{"id":1,"id_str":"1","text":"chunked"}"#;
        let mut decoder = LineDecoder::new();
        for byte in line.as_bytes() {
            decoder.push(std::slice::from_ref(byte));
            assert_eq!(decoder.next_line(), None);
        }
        decoder.push(b"\n");
        assert_eq!(decoder.next_line().as_deref(), Some(line));
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_overflow_drops_rest_of_long_line() {
        let mut decoder = LineDecoder::with_max_line_bytes(8);
        decoder.push(b"abcdef");
        assert_eq!(decoder.next_line(), None);
        assert_eq!(decoder.take_overflow(), None);

        decoder.push(b"ghij");
        assert_eq!(decoder.next_line(), None);
        assert_eq!(decoder.take_overflow(), Some(10));
        assert_eq!(decoder.pending(), 0);

        decoder.push(b"klm\nnext\n");
        assert_eq!(decoder.next_line().as_deref(), Some("next"));
        assert_eq!(decoder.next_line(), None);
    }

    #[test]
    fn test_finish_drops_overflowed_tail() {
        let mut decoder = LineDecoder::with_max_line_bytes(4);
        decoder.push(b"toolong");
        assert_eq!(decoder.next_line(), None);
        assert!(decoder.take_overflow().is_some());

        decoder.push(b"tail");
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let bytes = "caf\u{e9}\n".as_bytes();
        let mut decoder = LineDecoder::new();
        decoder.push(&bytes[..4]);
        decoder.push(&bytes[4..]);
        assert_eq!(decoder.next_line().as_deref(), Some("caf\u{e9}"));
    }

    #[test]
    fn test_classify_noise() {
        assert!(matches!(
            classify(r#"{"friends":[1,2,3]}"#),
            StreamLine::Noise(NoiseKind::Friends)
        ));
        assert!(matches!(
            classify(r#"{"event":"favorite","source":{}}"#),
            StreamLine::Noise(NoiseKind::Event)
        ));
    }

    #[test]
    fn test_classify_malformed() {
        assert!(matches!(classify("{not json"), StreamLine::Malformed(_)));
        assert!(matches!(classify("[1,2,3]"), StreamLine::Malformed(_)));
    }

    #[test]
    fn test_decode_reference_line() {
        let LineOutcome::Tweet(tweet) = decode_line(BOB) else {
            panic!("expected a tweet");
        };
        assert_eq!(tweet.id, "123");
        assert_eq!(tweet.text, "hi");
        assert_eq!(tweet.in_reply_to_id, "null");
        assert_eq!(tweet.author.screen_name, "bob");
        assert_eq!(tweet.author.display_name, "Bob");
    }

    #[test]
    fn test_decode_non_status_is_skipped() {
        assert!(matches!(
            decode_line(r#"{"delete":{"status":{"id":1,"id_str":"1"}}}"#),
            LineOutcome::Skipped
        ));
    }

    #[test]
    fn test_decode_missing_user_is_rejected() {
        assert!(matches!(
            decode_line(r#"{"id":1,"id_str":"1","text":"t"}"#),
            LineOutcome::Rejected(ProjectionError::MissingField("user"))
        ));
    }
}
