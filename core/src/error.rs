use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SessionErr>;

/// Errors returned to callers of the session. Transport and server-side
/// failures never show up here; they are recorded on the turn itself.
#[derive(Error, Debug)]
pub enum SessionErr {
    /// A turn is already opening or streaming; one in-flight turn per
    /// session.
    #[error("a turn is already in flight; wait for it to finish or cancel it")]
    AlreadyStreaming,

    #[error("query must not be empty")]
    EmptyQuery,

    #[error("history index {index} out of range (history has {len} turns)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("history is empty")]
    EmptyHistory,

    /// The session task has exited and its channels are closed.
    #[error("internal error; session task died")]
    InternalSessionDied,

    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

/// Failure of the connection carrying a turn's events.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("idle timeout waiting for SSE")]
    IdleTimeout,

    #[error("{0}")]
    Stream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid stream url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// No decoder exists for the event name.
    UnknownEvent,
    /// The payload is not valid JSON.
    Malformed,
    /// Valid JSON of the wrong shape, e.g. a missing required field.
    InvalidShape,
}

/// A single SSE message that could not be turned into a domain event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to decode `{event_name}` event ({detail})")]
pub struct DecodeError {
    pub event_name: String,
    pub raw_payload: String,
    pub kind: DecodeErrorKind,
    pub detail: String,
}

impl DecodeError {
    pub(crate) fn new(
        event_name: &str,
        raw_payload: &str,
        kind: DecodeErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            event_name: event_name.to_string(),
            raw_payload: raw_payload.to_string(),
            kind,
            detail: detail.into(),
        }
    }
}
