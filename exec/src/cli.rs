use clap::Parser;
use clap::ValueEnum;
use std::path::PathBuf;

/// Streams answers for one or more queries from a search backend and prints
/// each finished turn.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Backend base URL, e.g. `http://localhost:8000`.
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Path of the streaming endpoint on the backend.
    #[arg(long = "stream-path", value_name = "PATH")]
    pub stream_path: Option<String>,

    /// Replay this SSE file for every query instead of contacting the backend.
    #[arg(long = "fixture", value_name = "FILE")]
    pub fixture: Option<PathBuf>,

    /// Fail a turn when its stream stays silent this long.
    #[arg(long = "idle-timeout-ms", value_name = "MS")]
    pub idle_timeout_ms: Option<u64>,

    /// Print each finished turn as one JSON object per line.
    #[arg(long = "json", default_value_t = false)]
    pub json: bool,

    /// Specifies color settings for use in the output.
    #[arg(long = "color", value_enum, default_value_t = Color::Auto)]
    pub color: Color,

    /// Queries to run, in order. Each waits for the previous one to finish.
    #[arg(value_name = "QUERY", required = true, num_args = 1..)]
    pub queries: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum Color {
    Always,
    Never,
    #[default]
    Auto,
}
