//! Defines the protocol between a presentation layer and a streaming search
//! session.
//!
//! Uses a SQ (Submission Queue) / EQ (Event Queue) pattern: callers push
//! [`Op`]s wrapped in [`Submission`]s and read back [`Event`]s.

use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use ts_rs::TS;

use crate::turn::Turn;
use crate::turn_id::TurnId;

/// Submission Queue Entry - requests from the caller
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Submission {
    /// Unique id for this Submission to correlate with Events
    pub id: String,
    /// Payload
    pub op: Op,
}

/// Submission operation
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Op {
    /// Start a new turn for `query`. Rejected while another turn is in
    /// flight.
    Submit { query: String },

    /// Abort the in-flight turn and drop its placeholder from history.
    Cancel,

    /// Move the navigation cursor one turn back.
    Previous,

    /// Move the navigation cursor one turn forward.
    Next,

    /// Move the navigation cursor to an absolute index.
    JumpTo { index: usize },

    /// While pinned, appends do not move the cursor to the newest turn.
    SetPinned { pinned: bool },

    /// Request a [`SessionSnapshot`].
    GetSnapshot,

    /// Close any open stream and stop the session task.
    Shutdown,
}

/// Event Queue Entry - events from the session
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Event {
    /// Submission `id` that this event is correlated with.
    pub id: String,
    /// Payload
    pub msg: EventMsg,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, TS, Display)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventMsg {
    /// A placeholder turn was appended and its stream is opening.
    TurnStarted(Turn),

    /// The in-flight turn changed.
    TurnUpdated(Turn),

    /// The turn was sealed as `Complete` or `Failed`.
    TurnComplete(Turn),

    /// The in-flight turn was cancelled and removed from history.
    TurnCancelled { turn_id: TurnId },

    CursorChanged { cursor: Option<usize> },

    Snapshot(SessionSnapshot),

    /// A submission was rejected; no state changed.
    Error { message: String },

    ShutdownComplete,
}

/// Stream lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StreamState {
    #[default]
    Idle,
    Opening,
    Streaming,
    Closing,
}

/// Read-only view of a session for presentation layers.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, TS)]
pub struct SessionSnapshot {
    pub history: Vec<Turn>,
    pub cursor: Option<usize>,
    pub pinned: bool,
    pub state: StreamState,
}

impl SessionSnapshot {
    /// The turn under the cursor.
    pub fn current(&self) -> Option<&Turn> {
        self.cursor.and_then(|idx| self.history.get(idx))
    }
}
