//! Typed domain events decoded from the named SSE messages of the search and
//! blog backends.

use serde::Deserialize;
use serde::Serialize;
use ts_rs::TS;

use crate::source::Source;
use crate::turn::Activity;
use crate::turn::ReflectionProgress;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Sub-queries derived by the backend. Replaces earlier terms.
    Breakdown { terms: Vec<String> },
    /// Full source list snapshot.
    SearchResults { sources: Vec<Source> },
    /// Result count without the records themselves.
    SearchResultCount { count: usize },
    /// One chunk to append to the summary.
    SummaryPart { part: String },
    ThinkingPart { thought: String },
    ReflectionProgress(ReflectionProgress),
    Status { message: String },
    SearchStart { terms: Vec<String> },
    ScrapeStart { activities: Vec<Activity> },
    /// Terminal success.
    Complete {
        summary: Option<String>,
        suggestions: Vec<String>,
    },
    /// Terminal failure.
    Error { message: Option<String> },
    /// The backend reports a generation that is still running elsewhere and
    /// ends the stream. Seals the turn with whatever content it has so far.
    InProgress {
        status: String,
        content: Option<String>,
    },
}

impl DomainEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DomainEvent::Complete { .. } | DomainEvent::Error { .. } | DomainEvent::InProgress { .. }
        )
    }

    /// Whether the event carries turn content and therefore moves a pending
    /// turn into `Streaming`. Side-channel events (reasoning, progress,
    /// status lines) do not.
    pub fn is_content_bearing(&self) -> bool {
        matches!(
            self,
            DomainEvent::Breakdown { .. }
                | DomainEvent::SearchResults { .. }
                | DomainEvent::SearchResultCount { .. }
                | DomainEvent::SummaryPart { .. }
                | DomainEvent::SearchStart { .. }
                | DomainEvent::ScrapeStart { .. }
        )
    }
}
