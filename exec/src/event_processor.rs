use sift_core::config::Config;
use sift_protocol::protocol::Event;

pub(crate) enum SessionStatus {
    Running,
    /// The turn for the current query was sealed.
    TurnFinished { failed: bool },
    Shutdown,
}

pub(crate) trait EventProcessor {
    /// Print summary of effective configuration and the queries about to run.
    fn print_config_summary(&mut self, config: &Config, queries: &[String]);

    /// Handle a single event emitted by the session.
    fn process_event(&mut self, event: Event) -> SessionStatus;
}
