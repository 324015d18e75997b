//! Synchronous state machine for one session: a single in-flight stream at
//! a time, folded into history as its events arrive.
//!
//! `Idle -> Opening -> Streaming -> Closing -> Idle`. The controller never
//! touches a connection itself; whoever drives it closes the transport when
//! [`Disposition::Close`] comes back.

use sift_protocol::Turn;
use sift_protocol::TurnId;
use sift_protocol::protocol::SessionSnapshot;
use sift_protocol::protocol::StreamState;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::accumulator::Applied;
use crate::accumulator::apply_in_place;
use crate::accumulator::fail_in_place;
use crate::decoder::decode;
use crate::decoder::is_terminal_event_name;
use crate::error::DecodeErrorKind;
use crate::error::Result;
use crate::error::SessionErr;
use crate::history::SessionHistory;
use crate::navigator::Navigator;
use crate::transport::TransportEvent;

/// Message recorded on a turn whose stream ended before a terminal event.
pub const STREAM_CLOSED_UNEXPECTEDLY: &str = "stream closed unexpectedly";

/// Upper bound on the payload excerpt included in decode-failure logs.
const LOG_EXCERPT_BYTES: usize = 600;

/// What the driver should do with the transport after an event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep reading.
    Continue,
    /// The turn is sealed (or there is no turn); close the transport and call
    /// [`SessionController::finish`].
    Close,
}

#[derive(Debug, Default)]
pub struct SessionController {
    history: SessionHistory,
    navigator: Navigator,
    state: StreamState,
    in_flight: Option<Turn>,
    /// Cursor as it was before the in-flight turn was submitted.
    cursor_before_submit: Option<usize>,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new turn for `query`: appends a `Pending` placeholder and
    /// moves to `Opening`. Nothing changes when the submission is rejected.
    pub fn submit(&mut self, query: &str) -> Result<TurnId> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SessionErr::EmptyQuery);
        }
        if self.state != StreamState::Idle {
            return Err(SessionErr::AlreadyStreaming);
        }

        let turn = Turn::new(query);
        let id = turn.id();
        self.cursor_before_submit = self.navigator.cursor();
        let index = self.history.append(turn.clone());
        self.navigator.on_append(&self.history);
        self.in_flight = Some(turn);
        self.state = StreamState::Opening;
        info!(turn_id = %id, index, query, "turn submitted");
        Ok(id)
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) -> Disposition {
        if !matches!(self.state, StreamState::Opening | StreamState::Streaming) {
            debug!(state = %self.state, "ignoring transport event with no open stream");
            return Disposition::Close;
        }
        let Some(turn) = self.in_flight.as_mut() else {
            return Disposition::Close;
        };

        let applied = match event {
            TransportEvent::Message { name, data } => match decode(&name, &data) {
                Ok(event) => {
                    if self.state == StreamState::Opening {
                        self.state = StreamState::Streaming;
                    }
                    apply_in_place(turn, event)
                }
                Err(err) if err.kind == DecodeErrorKind::UnknownEvent => {
                    debug!(turn_id = %turn.id(), event = %name, "skipping unknown SSE event");
                    return Disposition::Continue;
                }
                Err(err) => {
                    warn!(
                        turn_id = %turn.id(),
                        event = %name,
                        payload = excerpt(&err.raw_payload),
                        "{err}"
                    );
                    if !is_terminal_event_name(&name) {
                        return Disposition::Continue;
                    }
                    fail_in_place(turn, format!("failed to decode {name} event"))
                }
            },
            TransportEvent::Error(message) => {
                debug!(turn_id = %turn.id(), "transport error: {message}");
                fail_in_place(turn, message)
            }
            TransportEvent::Closed => fail_in_place(turn, STREAM_CLOSED_UNEXPECTEDLY),
        };

        if applied != Applied::Ignored {
            self.history.append(turn.clone());
        }
        if turn.is_terminal() {
            debug!(turn_id = %turn.id(), status = %turn.status, "turn sealed; closing stream");
            self.state = StreamState::Closing;
            Disposition::Close
        } else {
            Disposition::Continue
        }
    }

    /// Commits the sealed turn and returns to `Idle`. `None` unless the
    /// controller is `Closing`. The sealed turn already replaced its
    /// placeholder in history; only the cursor follows here.
    pub fn finish(&mut self) -> Option<Turn> {
        if self.state != StreamState::Closing {
            return None;
        }
        let turn = self.in_flight.take()?;
        let index = self.history.index_of(turn.id());
        self.navigator.on_append(&self.history);
        self.state = StreamState::Idle;
        info!(turn_id = %turn.id(), index = ?index, status = %turn.status, "turn finished");
        Some(turn)
    }

    /// Abandons the in-flight turn. Its placeholder is removed and the cursor
    /// goes back to where it was, so the session is exactly what it was
    /// before the submission. A turn that was already sealed stays in history.
    pub fn cancel(&mut self) -> Option<TurnId> {
        if self.state == StreamState::Idle {
            return None;
        }
        self.state = StreamState::Idle;
        let turn = self.in_flight.take()?;
        let id = turn.id();
        if self.history.remove_in_flight(id).is_some() {
            self.navigator
                .restore(self.cursor_before_submit.take(), &self.history);
            info!(turn_id = %id, "turn cancelled");
            Some(id)
        } else {
            self.navigator.on_append(&self.history);
            None
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn history(&self) -> &SessionHistory {
        &self.history
    }

    pub fn current(&self) -> Result<&Turn> {
        self.navigator.current(&self.history)
    }

    pub fn cursor(&self) -> Option<usize> {
        self.navigator.cursor()
    }

    pub fn is_pinned(&self) -> bool {
        self.navigator.is_pinned()
    }

    pub fn in_flight(&self) -> Option<&Turn> {
        self.in_flight.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            history: self.history.snapshot(),
            cursor: self.navigator.cursor(),
            pinned: self.navigator.is_pinned(),
            state: self.state,
        }
    }

    pub fn previous(&mut self) -> Option<usize> {
        self.navigator.previous()
    }

    pub fn next(&mut self) -> Option<usize> {
        self.navigator.next(&self.history)
    }

    pub fn jump_to(&mut self, index: usize) -> Result<()> {
        self.navigator.jump_to(index, &self.history)
    }

    pub fn set_pinned(&mut self, pinned: bool) {
        self.navigator.set_pinned(pinned);
    }
}

fn excerpt(raw: &str) -> &str {
    if raw.len() <= LOG_EXCERPT_BYTES {
        return raw;
    }
    let mut end = LOG_EXCERPT_BYTES;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use sift_protocol::TurnStatus;

    fn message(name: &str, data: &str) -> TransportEvent {
        TransportEvent::Message {
            name: name.to_string(),
            data: data.to_string(),
        }
    }

    fn drive(controller: &mut SessionController, events: Vec<TransportEvent>) -> Vec<Disposition> {
        events
            .into_iter()
            .map(|event| controller.handle_transport_event(event))
            .collect()
    }

    fn completed(controller: &mut SessionController, query: &str) -> Turn {
        controller.submit(query).unwrap();
        drive(
            controller,
            vec![
                message("summary_part", &format!("\"{query}\"")),
                message("complete", "{}"),
            ],
        );
        controller.finish().unwrap()
    }

    #[test]
    fn volcanoes_scenario() {
        let mut controller = SessionController::new();
        let id = controller.submit("volcanoes").unwrap();
        assert_eq!(controller.state(), StreamState::Opening);
        assert_eq!(controller.current().unwrap().status, TurnStatus::Pending);

        let dispositions = drive(
            &mut controller,
            vec![
                message("breakdown", r#"["volcano types","eruption causes"]"#),
                message(
                    "search_results",
                    r#"[{"title":"A","url":"https://a.example/v","favicon_url":"https://a.example/f.ico"}]"#,
                ),
                message("summary_part", r#""Volcanoes are""#),
                message("summary_part", r#"" geological vents.""#),
            ],
        );
        assert_eq!(dispositions, vec![Disposition::Continue; 4]);
        assert_eq!(controller.state(), StreamState::Streaming);
        assert_eq!(controller.current().unwrap().summary_text, "Volcanoes are geological vents.");

        let disposition = controller.handle_transport_event(message(
            "complete",
            r#"{"summary":"Volcanoes are geological vents.","suggestions":["plate tectonics"]}"#,
        ));
        assert_eq!(disposition, Disposition::Close);
        assert_eq!(controller.state(), StreamState::Closing);

        let turn = controller.finish().unwrap();
        assert_eq!(turn.id(), id);
        assert_eq!(turn.status, TurnStatus::Complete);
        assert_eq!(turn.sources.len(), 1);
        assert_eq!(turn.sources[0].hostname(), "a.example");
        assert_eq!(turn.suggestions, vec!["plate tectonics".to_string()]);
        assert_eq!(controller.state(), StreamState::Idle);
        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.cursor(), Some(0));
    }

    #[test]
    fn unexpected_close_fails_turn_and_allows_next_submission() {
        let mut controller = SessionController::new();
        controller.submit("q").unwrap();
        drive(&mut controller, vec![message("summary_part", r#""Hel""#)]);
        assert_eq!(
            controller.handle_transport_event(TransportEvent::Closed),
            Disposition::Close
        );
        let turn = controller.finish().unwrap();
        assert_eq!(turn.status, TurnStatus::Failed);
        assert_eq!(turn.error.as_deref(), Some(STREAM_CLOSED_UNEXPECTEDLY));
        assert_eq!(turn.display_summary(), "");

        assert!(controller.submit("again").is_ok());
        assert_eq!(controller.history().len(), 2);
    }

    #[test]
    fn double_submit_is_rejected_without_side_effects() {
        let mut controller = SessionController::new();
        controller.submit("first").unwrap();
        let before = controller.snapshot();

        assert_matches!(controller.submit("second"), Err(SessionErr::AlreadyStreaming));
        assert_eq!(controller.snapshot(), before);
    }

    #[test]
    fn blank_query_is_rejected() {
        let mut controller = SessionController::new();
        assert_matches!(controller.submit("   "), Err(SessionErr::EmptyQuery));
        assert_eq!(controller.state(), StreamState::Idle);
        assert!(controller.history().is_empty());
    }

    #[test]
    fn transport_error_fails_turn_with_its_message() {
        let mut controller = SessionController::new();
        controller.submit("q").unwrap();
        let disposition = controller
            .handle_transport_event(TransportEvent::Error("idle timeout waiting for SSE".to_string()));
        assert_eq!(disposition, Disposition::Close);
        let turn = controller.finish().unwrap();
        assert_eq!(turn.error.as_deref(), Some("idle timeout waiting for SSE"));
    }

    #[test]
    fn undecodable_content_event_is_skipped() {
        let mut controller = SessionController::new();
        controller.submit("q").unwrap();
        let dispositions = drive(
            &mut controller,
            vec![
                message("breakdown", "not json"),
                message("keepalive", "{}"),
                message("summary_part", r#""ok""#),
            ],
        );
        assert_eq!(dispositions, vec![Disposition::Continue; 3]);
        let turn = controller.in_flight().unwrap();
        assert_eq!(turn.summary_text, "ok");
        assert!(turn.breakdown_terms.is_empty());
    }

    #[test]
    fn undecodable_terminal_event_fails_turn() {
        let mut controller = SessionController::new();
        controller.submit("q").unwrap();
        assert_eq!(
            controller.handle_transport_event(message("complete", "[1,2")),
            Disposition::Close
        );
        let turn = controller.finish().unwrap();
        assert_eq!(turn.status, TurnStatus::Failed);
        assert_eq!(turn.error.as_deref(), Some("failed to decode complete event"));
    }

    #[test]
    fn history_shows_progress_while_streaming() {
        let mut controller = SessionController::new();
        controller.submit("q").unwrap();
        drive(&mut controller, vec![message("summary_part", r#""partial""#)]);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.history.len(), 1);
        assert_eq!(snapshot.history[0].status, TurnStatus::Streaming);
        assert_eq!(snapshot.history[0].summary_text, "partial");
        assert_eq!(snapshot.state, StreamState::Streaming);
    }

    #[test]
    fn events_after_seal_are_ignored() {
        let mut controller = SessionController::new();
        controller.submit("q").unwrap();
        drive(&mut controller, vec![message("complete", r#"{"summary":"done"}"#)]);
        assert_eq!(
            controller.handle_transport_event(message("summary_part", r#""late""#)),
            Disposition::Close
        );
        let turn = controller.finish().unwrap();
        assert_eq!(turn.summary_text, "done");
        assert_eq!(controller.handle_transport_event(TransportEvent::Closed), Disposition::Close);
        assert_eq!(controller.history().get(0).unwrap().summary_text, "done");
    }

    #[test]
    fn cancel_restores_history_exactly() {
        let mut controller = SessionController::new();
        completed(&mut controller, "a");
        completed(&mut controller, "b");
        let before = controller.snapshot();

        let id = controller.submit("c").unwrap();
        drive(&mut controller, vec![message("summary_part", r#""half""#)]);
        assert_eq!(controller.cancel(), Some(id));

        let after = controller.snapshot();
        assert_eq!(after, before);
        assert_eq!(controller.cancel(), None);
    }

    #[test]
    fn cached_blog_completes_with_its_content() {
        let mut controller = SessionController::new();
        controller.submit("volcanoes").unwrap();
        assert_eq!(
            controller.handle_transport_event(message(
                "complete",
                r##"{"topic":"volcanoes","blog_content":"# Volcanoes","status":"BLOG_DONE"}"##,
            )),
            Disposition::Close
        );
        let turn = controller.finish().unwrap();
        assert_eq!(turn.status, TurnStatus::Complete);
        assert_eq!(turn.display_summary(), "# Volcanoes");
    }

    #[test]
    fn in_progress_closes_the_stream_and_records_status() {
        let mut controller = SessionController::new();
        controller.submit("volcanoes").unwrap();
        assert_eq!(
            controller.handle_transport_event(message(
                "in_progress",
                r#"{"topic":"volcanoes","status":"GENERATING","blog_content":""}"#,
            )),
            Disposition::Close
        );
        assert_eq!(controller.state(), StreamState::Closing);

        // The backend hangs up right after; the sealed turn must not fail.
        assert_eq!(
            controller.handle_transport_event(TransportEvent::Closed),
            Disposition::Close
        );
        let turn = controller.finish().unwrap();
        assert_eq!(turn.status, TurnStatus::Complete);
        assert_eq!(turn.error, None);
        assert_eq!(turn.status_message.as_deref(), Some("GENERATING"));
        assert_eq!(controller.history().len(), 1);
    }

    #[test]
    fn warning_updates_the_status_line_only() {
        let mut controller = SessionController::new();
        controller.submit("volcanoes").unwrap();
        assert_eq!(
            controller.handle_transport_event(message(
                "warning",
                r#"{"message":"Failed to scrape https://a.example: timeout"}"#,
            )),
            Disposition::Continue
        );
        let turn = controller.in_flight().unwrap();
        assert_eq!(
            turn.status_message.as_deref(),
            Some("Failed to scrape https://a.example: timeout")
        );
        assert_eq!(turn.status, TurnStatus::Pending);
        assert_eq!(turn.error, None);
    }

    #[test]
    fn finished_turn_replaces_its_placeholder() {
        let mut controller = SessionController::new();
        let id = controller.submit("volcanoes").unwrap();
        controller.handle_transport_event(message("complete", r#"{"summary":"s"}"#));
        let turn = controller.finish().unwrap();

        assert_eq!(controller.history().len(), 1);
        assert_eq!(controller.history().get(0).unwrap(), &turn);
        assert_eq!(controller.history().index_of(id), Some(0));
        assert_eq!(controller.history().latest_index(), Some(0));
        assert_eq!(controller.cursor(), Some(0));
    }

    #[test]
    fn cancel_puts_an_unpinned_cursor_back() {
        let mut controller = SessionController::new();
        completed(&mut controller, "a");
        completed(&mut controller, "b");
        completed(&mut controller, "c");
        controller.jump_to(0).unwrap();
        assert!(!controller.is_pinned());

        controller.submit("d").unwrap();
        assert_eq!(controller.cursor(), Some(3));
        controller.cancel().unwrap();

        assert_eq!(controller.cursor(), Some(0));
        assert_eq!(controller.current().unwrap().query(), "a");
    }

    #[test]
    fn cancel_on_empty_history_leaves_no_cursor() {
        let mut controller = SessionController::new();
        controller.submit("only").unwrap();
        controller.cancel().unwrap();
        assert_eq!(controller.cursor(), None);
        assert!(controller.history().is_empty());
    }

    #[test]
    fn repeated_query_creates_a_new_turn() {
        let mut controller = SessionController::new();
        completed(&mut controller, "same");
        completed(&mut controller, "same");
        assert_eq!(controller.history().len(), 2);
        assert_eq!(controller.cursor(), Some(1));
    }

    #[test]
    fn pinned_cursor_survives_new_turns() {
        let mut controller = SessionController::new();
        completed(&mut controller, "a");
        completed(&mut controller, "b");
        controller.jump_to(0).unwrap();
        controller.set_pinned(true);

        completed(&mut controller, "c");
        assert_eq!(controller.cursor(), Some(0));
        assert_eq!(controller.current().unwrap().query(), "a");
        assert_matches!(
            controller.jump_to(3),
            Err(SessionErr::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        let raw = "é".repeat(400);
        let cut = excerpt(&raw);
        assert!(cut.len() <= LOG_EXCERPT_BYTES);
        assert!(raw.starts_with(cut));
    }
}
