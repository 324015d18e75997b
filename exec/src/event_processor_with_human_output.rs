use std::fmt::Write as _;

use owo_colors::OwoColorize;
use owo_colors::Style;
use sift_core::config::Config;
use sift_protocol::Turn;
use sift_protocol::TurnStatus;
use sift_protocol::protocol::Event;
use sift_protocol::protocol::EventMsg;

use crate::event_processor::EventProcessor;
use crate::event_processor::SessionStatus;

/// This should be configured based on the command-line options.
pub(crate) struct EventProcessorWithHumanOutput {
    // To ensure that --color=never is respected, ANSI escapes _must_ be added
    // using .style() with one of these fields. If you need a new style, add a
    // new field here.
    bold: Style,
    italic: Style,
    dimmed: Style,

    magenta: Style,
    red: Style,
    green: Style,
    cyan: Style,

    /// Last backend status line printed for the in-flight turn.
    last_status: Option<String>,
    last_reflection: Option<(u32, u32)>,
}

impl EventProcessorWithHumanOutput {
    pub(crate) fn create_with_ansi(with_ansi: bool) -> Self {
        if with_ansi {
            Self {
                bold: Style::new().bold(),
                italic: Style::new().italic(),
                dimmed: Style::new().dimmed(),
                magenta: Style::new().magenta(),
                red: Style::new().red(),
                green: Style::new().green(),
                cyan: Style::new().cyan(),
                last_status: None,
                last_reflection: None,
            }
        } else {
            Self {
                bold: Style::new(),
                italic: Style::new(),
                dimmed: Style::new(),
                magenta: Style::new(),
                red: Style::new(),
                green: Style::new(),
                cyan: Style::new(),
                last_status: None,
                last_reflection: None,
            }
        }
    }

    /// Progress lines worth printing for an in-flight turn; each change is
    /// reported once.
    fn progress_lines(&mut self, turn: &Turn) -> Vec<String> {
        let mut lines = Vec::new();
        if turn.status_message.is_some() && turn.status_message != self.last_status {
            self.last_status = turn.status_message.clone();
            if let Some(status) = &turn.status_message {
                lines.push(format!("{}", status.style(self.dimmed)));
            }
        }
        let reflection = turn
            .reflection_progress
            .map(|p| (p.iteration, p.max_iterations));
        if reflection.is_some() && reflection != self.last_reflection {
            self.last_reflection = reflection;
            if let Some((iteration, max)) = reflection {
                lines.push(format!(
                    "{}",
                    format!("reflecting ({iteration}/{max})").style(self.dimmed)
                ));
            }
        }
        lines
    }

    pub(crate) fn render_turn(&self, turn: &Turn) -> String {
        let mut out = String::new();

        if !turn.breakdown_terms.is_empty() {
            let _ = writeln!(
                out,
                "{} {}",
                "searched:".style(self.magenta),
                turn.breakdown_terms.join(", ")
            );
        }

        let sources = turn.display_sources();
        if !sources.is_empty() {
            let _ = writeln!(out, "{}", "sources".style(self.bold));
            for (idx, source) in sources.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. {} {}",
                    idx + 1,
                    source.title(),
                    format!("({})", source.hostname()).style(self.dimmed)
                );
            }
        }

        match turn.status {
            TurnStatus::Failed => {
                let message = turn.error.as_deref().unwrap_or_default();
                let _ = writeln!(out, "{} {message}", "error:".style(self.red));
            }
            _ => {
                let summary = turn.display_summary();
                if !summary.is_empty() {
                    let _ = writeln!(out, "\n{summary}\n");
                }
                if !turn.suggestions.is_empty() {
                    let _ = writeln!(out, "{}", "related".style(self.bold));
                    for suggestion in &turn.suggestions {
                        let _ = writeln!(out, "  {} {}", "›".style(self.cyan), suggestion.style(self.italic));
                    }
                }
                let _ = writeln!(out, "{}", "done".style(self.green));
            }
        }
        out
    }
}

impl EventProcessor for EventProcessorWithHumanOutput {
    fn print_config_summary(&mut self, config: &Config, queries: &[String]) {
        let source = match &config.fixture {
            Some(path) => format!("fixture {}", path.display()),
            None => format!("{}{}", config.base_url, config.stream_path),
        };
        eprintln!(
            "{} {} ({} {})",
            "sift".style(self.bold),
            source,
            queries.len(),
            if queries.len() == 1 { "query" } else { "queries" }
        );
    }

    fn process_event(&mut self, event: Event) -> SessionStatus {
        match event.msg {
            EventMsg::TurnStarted(turn) => {
                self.last_status = None;
                self.last_reflection = None;
                println!("{} {}", "?".style(self.magenta), turn.query().style(self.bold));
                SessionStatus::Running
            }
            EventMsg::TurnUpdated(turn) => {
                for line in self.progress_lines(&turn) {
                    println!("{line}");
                }
                SessionStatus::Running
            }
            EventMsg::TurnComplete(turn) => {
                print!("{}", self.render_turn(&turn));
                SessionStatus::TurnFinished {
                    failed: turn.status == TurnStatus::Failed,
                }
            }
            EventMsg::TurnCancelled { turn_id } => {
                println!("{} {turn_id}", "cancelled".style(self.red));
                SessionStatus::TurnFinished { failed: true }
            }
            EventMsg::Error { message } => {
                eprintln!("{} {message}", "ERROR:".style(self.red));
                SessionStatus::TurnFinished { failed: true }
            }
            EventMsg::ShutdownComplete => SessionStatus::Shutdown,
            EventMsg::CursorChanged { .. } | EventMsg::Snapshot(_) => SessionStatus::Running,
        }
    }
}
