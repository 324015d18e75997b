//! Folds decoded events for one query into its [`Turn`].
//!
//! Everything here is synchronous and free of I/O; the controller calls it
//! once per event, in arrival order.

use sift_protocol::DomainEvent;
use sift_protocol::Turn;
use sift_protocol::TurnStatus;
use tracing::debug;

/// Message recorded when the backend sends an `error` event without one.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The event changed the turn.
    Updated,
    /// The event sealed the turn as `Complete` or `Failed`.
    Sealed,
    /// The turn was already sealed; nothing changed.
    Ignored,
}

/// Pure form of [`apply_in_place`]: consumes the turn and returns the updated
/// one (unchanged when it was already sealed).
pub fn apply(mut turn: Turn, event: DomainEvent) -> Turn {
    apply_in_place(&mut turn, event);
    turn
}

pub fn apply_in_place(turn: &mut Turn, event: DomainEvent) -> Applied {
    if turn.is_terminal() {
        debug!(
            turn_id = %turn.id(),
            status = %turn.status,
            "dropping event delivered to a sealed turn"
        );
        return Applied::Ignored;
    }

    if event.is_content_bearing() && turn.status == TurnStatus::Pending {
        turn.status = TurnStatus::Streaming;
    }

    match event {
        DomainEvent::Breakdown { terms } => {
            turn.breakdown_terms = terms;
        }
        DomainEvent::SearchResults { sources } => {
            turn.result_count = Some(sources.len());
            turn.sources = sources;
        }
        DomainEvent::SearchResultCount { count } => {
            turn.result_count = Some(count);
        }
        DomainEvent::SummaryPart { part } => {
            turn.summary_text.push_str(&part);
        }
        DomainEvent::ThinkingPart { thought } => {
            turn.thoughts.push(thought);
        }
        DomainEvent::ReflectionProgress(progress) => {
            turn.reflection_progress = Some(progress);
        }
        DomainEvent::Status { message } => {
            turn.status_message = Some(message);
        }
        DomainEvent::SearchStart { terms } => {
            // Newest searches first, without repeating a term.
            let mut merged: Vec<String> =
                Vec::with_capacity(terms.len() + turn.breakdown_terms.len());
            for term in terms.into_iter().chain(turn.breakdown_terms.drain(..)) {
                if !merged.contains(&term) {
                    merged.push(term);
                }
            }
            turn.breakdown_terms = merged;
        }
        DomainEvent::ScrapeStart { activities } => {
            turn.scrape_activity.extend(activities);
        }
        DomainEvent::Complete {
            summary,
            suggestions,
        } => {
            // The server's full summary supersedes whatever parts arrived.
            if let Some(summary) = summary.filter(|s| !s.is_empty()) {
                turn.summary_text = summary;
            }
            turn.suggestions = suggestions;
            turn.status = TurnStatus::Complete;
            return Applied::Sealed;
        }
        DomainEvent::Error { message } => {
            fail_in_place(turn, message.unwrap_or_default());
            return Applied::Sealed;
        }
        DomainEvent::InProgress { status, content } => {
            if let Some(content) = content {
                turn.summary_text = content;
            }
            turn.status_message = Some(status);
            turn.status = TurnStatus::Complete;
            return Applied::Sealed;
        }
    }
    Applied::Updated
}

/// Seal `turn` as `Failed`. Partial summary and sources stay on the turn for
/// diagnostics; [`Turn::display_summary`] hides them.
pub fn fail_in_place(turn: &mut Turn, message: impl Into<String>) -> Applied {
    if turn.is_terminal() {
        return Applied::Ignored;
    }
    let message = message.into();
    let message = if message.trim().is_empty() {
        UNKNOWN_ERROR_MESSAGE.to_string()
    } else {
        message
    };
    turn.error = Some(message);
    turn.status = TurnStatus::Failed;
    Applied::Sealed
}
