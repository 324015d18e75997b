use sift_core::config::Config;
use sift_protocol::TurnStatus;
use sift_protocol::protocol::Event;
use sift_protocol::protocol::EventMsg;

use crate::event_processor::EventProcessor;
use crate::event_processor::SessionStatus;

/// Prints every sealed turn as a single line of JSON.
pub(crate) struct EventProcessorWithJsonOutput;

impl EventProcessorWithJsonOutput {
    pub fn new() -> Self {
        Self {}
    }
}

impl EventProcessor for EventProcessorWithJsonOutput {
    fn print_config_summary(&mut self, _config: &Config, _queries: &[String]) {
        // Intentionally left blank: stdout carries only JSON lines.
    }

    fn process_event(&mut self, event: Event) -> SessionStatus {
        match event.msg {
            EventMsg::TurnComplete(turn) => {
                match serde_json::to_string(&turn) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::error!("failed to serialize turn: {e}"),
                }
                SessionStatus::TurnFinished {
                    failed: turn.status == TurnStatus::Failed,
                }
            }
            EventMsg::Error { message } => {
                eprintln!("ERROR: {message}");
                SessionStatus::TurnFinished { failed: true }
            }
            EventMsg::ShutdownComplete => SessionStatus::Shutdown,
            _ => SessionStatus::Running,
        }
    }
}
