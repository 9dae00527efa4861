//! Error types surfaced by the crate.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Result type alias for feed operations.
pub type Result<T, E = FeedError> = std::result::Result<T, E>;

/// A `Link` header that breaks the pagination contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedCursorError {
    /// The header could not be tokenized.
    #[error("invalid Link header: {0}")]
    Syntax(String),
    /// A link target is not a valid URL.
    #[error("invalid URL in Link header: {0}")]
    InvalidUrl(String),
    /// The header carries no `prev` relation.
    #[error("Link header lacks a `prev` field")]
    MissingPrev,
    /// A relation points at another origin or path than the request.
    #[error("`{rel}` field from Link header unexpectedly includes different path")]
    ForeignPath {
        /// Relation name (`next` or `prev`).
        rel: &'static str,
    },
    /// A relation lacks its mandatory query parameter.
    #[error("`{rel}` field from Link header unexpectedly lacks `{param}`")]
    MissingParam {
        /// Relation name (`next` or `prev`).
        rel: &'static str,
        /// Required parameter (`max_id` or `since_id`).
        param: &'static str,
    },
}

/// A rejected loader call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The server answered with a non-success status.
    #[error("{message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Message surfaced to the user.
        message: String,
    },
    /// The request never produced a response.
    #[error("{0}")]
    Transport(String),
    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
    /// The response carried a malformed pagination header.
    #[error(transparent)]
    Cursor(#[from] MalformedCursorError),
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Value,
}

impl LoadError {
    /// Maps a non-success HTTP response to the message shown to the user.
    ///
    /// A 404 surfaces the literal body. Any other status surfaces
    /// `API error: <error>` when the body is JSON with an `error` field, and
    /// `Unknown API error` otherwise.
    pub fn from_response(status: u16, body: &str) -> Self {
        if status == 404 {
            return LoadError::Status {
                status,
                message: body.to_string(),
            };
        }
        let detail = serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .and_then(|parsed| match parsed.error {
                Value::Null | Value::Bool(false) => None,
                Value::String(text) if text.is_empty() => None,
                Value::String(text) => Some(text),
                other => Some(other.to_string()),
            });
        let message = match detail {
            Some(detail) => format!("API error: {detail}"),
            None => "Unknown API error".to_string(),
        };
        LoadError::Status { status, message }
    }
}

/// A stream event whose payload could not be decoded.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The JSON payload of a named event is malformed.
    #[error("malformed `{event}` payload: {source}")]
    Payload {
        /// Server-sent event name.
        event: String,
        /// Underlying decode failure.
        source: serde_json::Error,
    },
}

/// Errors surfaced to callers of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// The loader rejected the request; the hole stays in place.
    #[error(transparent)]
    Load(#[from] LoadError),
    /// The feed was detached from its screen.
    #[error("feed has been detached")]
    Detached,
    /// The feed task is gone.
    #[error("feed task is no longer running")]
    Closed,
}

/// A collection state that breaks one of its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    /// Two adjacent slots are out of order.
    #[error("slot {index} is out of order with its older neighbor")]
    Order {
        /// Position of the first slot of the pair.
        index: usize,
    },
    /// An id is held twice.
    #[error("id {0} is held more than once")]
    Duplicate(String),
    /// The id index disagrees with the slot positions.
    #[error("id index is stale for {0}")]
    StaleIndex(String),
    /// More slots than the configured capacity.
    #[error("{len} slots exceed capacity {max}")]
    Capacity {
        /// Current length.
        len: usize,
        /// Configured capacity.
        max: usize,
    },
    /// A boundary that is neither holed nor exhausted.
    #[error("{edge} boundary is neither exhausted nor marked as a hole")]
    OpenBoundary {
        /// Offending edge.
        edge: crate::collection::Edge,
    },
}
