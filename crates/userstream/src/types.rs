//! Stream record and event types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProjectionError;

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

/// A tweet delivered to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    /// Tweet ID, kept as the `id_str` string to avoid precision loss
    pub id: String,

    /// Tweet text content
    pub text: String,

    /// Author of the tweet
    pub author: User,

    /// ID of the tweet this replies to, verbatim; empty when not a reply
    pub in_reply_to_id: String,
}

impl Tweet {
    /// Whether the record named a parent tweet.
    ///
    /// The stream sometimes sends the literal string `"null"`, which is not a reply.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        !self.in_reply_to_id.is_empty() && self.in_reply_to_id != "null"
    }
}

/// Tweet author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Handle without the leading `@`
    pub screen_name: String,

    /// Display name
    pub display_name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Records
// ─────────────────────────────────────────────────────────────────────────────

/// Control message kinds interleaved with tweets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseKind {
    /// `{"event": ...}` notifications (follows, favorites, ...)
    Event,

    /// `{"friends": [...]}` preamble sent after connecting
    Friends,
}

/// One stream line decoded with every field optional.
///
/// Values stay as raw JSON so projection can tell a missing field from a
/// wrongly-typed one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    /// Numeric status ID
    #[serde(default)]
    pub id: Option<Value>,

    /// Status ID as a string
    #[serde(default)]
    pub id_str: Option<Value>,

    /// Status text
    #[serde(default)]
    pub text: Option<Value>,

    /// Parent status ID as a string
    #[serde(default)]
    pub in_reply_to_status_id_str: Option<Value>,

    /// Embedded author object
    #[serde(default)]
    pub user: Option<Value>,
}

impl RawRecord {
    /// Whether this looks like a status at all: `id` and `text` both present.
    ///
    /// Deletes, limit notices and other non-status objects fail this check.
    #[must_use]
    pub fn is_status(&self) -> bool {
        is_present(self.id.as_ref()) && is_present(self.text.as_ref())
    }
}

/// A classified stream line.
#[derive(Debug)]
pub enum StreamLine {
    /// Control message to discard
    Noise(NoiseKind),

    /// A JSON object to try projecting
    Record(RawRecord),

    /// Not a JSON object
    Malformed(serde_json::Error),
}

fn is_present(value: Option<&Value>) -> bool {
    value.is_some_and(|v| !v.is_null())
}

// ─────────────────────────────────────────────────────────────────────────────
// Projection
// ─────────────────────────────────────────────────────────────────────────────

/// Project a status record into a [`Tweet`].
///
/// All-or-nothing: the first missing or wrongly-typed field aborts.
pub fn project(record: RawRecord) -> Result<Tweet, ProjectionError> {
    let id = required_string(record.id_str, "id_str")?;
    let text = required_string(record.text, "text")?;

    let in_reply_to_id = match record.in_reply_to_status_id_str {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(_) => {
            return Err(ProjectionError::WrongType {
                field: "in_reply_to_status_id_str",
                expected: "string",
            });
        }
    };

    let mut user = match record.user {
        None | Some(Value::Null) => return Err(ProjectionError::MissingField("user")),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(ProjectionError::WrongType {
                field: "user",
                expected: "object",
            });
        }
    };

    let screen_name = required_string(user.remove("screen_name"), "user.screen_name")?;
    let display_name = required_string(user.remove("name"), "user.name")?;

    Ok(Tweet {
        id,
        text,
        author: User {
            screen_name,
            display_name,
        },
        in_reply_to_id,
    })
}

fn required_string(value: Option<Value>, field: &'static str) -> Result<String, ProjectionError> {
    match value {
        None | Some(Value::Null) => Err(ProjectionError::MissingField(field)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ProjectionError::WrongType {
            field,
            expected: "string",
        }),
    }
}
