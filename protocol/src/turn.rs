use serde::Deserialize;
use serde::Serialize;
use strum_macros::Display;
use ts_rs::TS;

use crate::source::Source;
use crate::turn_id::TurnId;

/// Lifecycle of a single turn.
///
/// `Pending -> Streaming -> {Complete | Failed}`; `Pending` may also jump
/// straight to a terminal state. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnStatus {
    Pending,
    Streaming,
    Complete,
    Failed,
}

impl TurnStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnStatus::Complete | TurnStatus::Failed)
    }

    pub fn is_in_flight(self) -> bool {
        !self.is_terminal()
    }
}

/// Progress counter reported by the reflection loop of the blog backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ReflectionProgress {
    pub iteration: u32,
    pub max_iterations: u32,
}

/// One line of backend activity (`search_start` / `scrape_start`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Activity {
    pub message: String,
}

/// One query/response cycle and everything accumulated for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct Turn {
    id: TurnId,
    query: String,
    pub status: TurnStatus,
    pub breakdown_terms: Vec<String>,
    pub sources: Vec<Source>,
    pub summary_text: String,
    pub suggestions: Vec<String>,
    pub error: Option<String>,

    /// Reasoning chunks. Never folded into `summary_text`.
    pub thoughts: Vec<String>,
    pub reflection_progress: Option<ReflectionProgress>,
    /// Latest free-form status line from the backend.
    pub status_message: Option<String>,
    pub scrape_activity: Vec<Activity>,
    /// Number of results the backend reported for the latest search.
    pub result_count: Option<usize>,
}

impl Turn {
    /// Creates the `Pending` placeholder rendered before any server event
    /// arrives.
    pub fn new(query: impl Into<String>) -> Self {
        Self::with_id(TurnId::new(), query)
    }

    pub fn with_id(id: TurnId, query: impl Into<String>) -> Self {
        Self {
            id,
            query: query.into(),
            status: TurnStatus::Pending,
            breakdown_terms: Vec::new(),
            sources: Vec::new(),
            summary_text: String::new(),
            suggestions: Vec::new(),
            error: None,
            thoughts: Vec::new(),
            reflection_progress: None,
            status_message: None,
            scrape_activity: Vec::new(),
            result_count: None,
        }
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_in_flight(&self) -> bool {
        self.status.is_in_flight()
    }

    /// Summary suitable for display. A failed turn keeps its partial summary
    /// for diagnostics but shows nothing.
    pub fn display_summary(&self) -> &str {
        match self.status {
            TurnStatus::Failed => "",
            _ => &self.summary_text,
        }
    }

    /// Sources suitable for display; empty for a failed turn.
    pub fn display_sources(&self) -> &[Source] {
        match self.status {
            TurnStatus::Failed => &[],
            _ => &self.sources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_turn_is_an_empty_pending_placeholder() {
        let turn = Turn::new("volcanoes");
        assert_eq!(turn.query(), "volcanoes");
        assert_eq!(turn.status, TurnStatus::Pending);
        assert!(turn.is_in_flight());
        assert!(turn.summary_text.is_empty());
        assert!(turn.sources.is_empty());
        assert_eq!(turn.error, None);
    }

    #[test]
    fn failed_turn_hides_partial_content_from_display() {
        let mut turn = Turn::new("x");
        turn.summary_text = "half a sen".to_string();
        turn.sources = vec![Source::new("A", "https://a.example/", "", None)];
        turn.status = TurnStatus::Failed;

        assert_eq!(turn.display_summary(), "");
        assert!(turn.display_sources().is_empty());
        assert_eq!(turn.summary_text, "half a sen");
        assert_eq!(turn.sources.len(), 1);
    }

    #[test]
    fn status_display_is_snake_case() {
        assert_eq!(TurnStatus::Streaming.to_string(), "streaming");
        assert!(TurnStatus::Complete.is_terminal());
        assert!(TurnStatus::Failed.is_terminal());
        assert!(!TurnStatus::Pending.is_terminal());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let turn = Turn::new("q");
        let json = serde_json::to_value(&turn).unwrap_or_default();
        assert_eq!(json["query"], "q");
        assert_eq!(json["status"], "pending");
        assert!(json.get("summaryText").is_some());
        assert!(json.get("breakdownTerms").is_some());
    }
}
