mod cli;
mod event_processor;
mod event_processor_with_human_output;
mod event_processor_with_json_output;

use std::io::IsTerminal;
use std::time::Duration;

pub use cli::Cli;
use sift_core::Session;
use sift_core::config::Config;
use sift_core::config::ConfigOverrides;
use sift_core::connector_for_config;
use sift_protocol::protocol::Op;
use tracing::debug;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::event_processor::EventProcessor;
use crate::event_processor::SessionStatus;
use crate::event_processor_with_human_output::EventProcessorWithHumanOutput;
use crate::event_processor_with_json_output::EventProcessorWithJsonOutput;

/// Runs every query in `cli` and returns the process exit code: `1` when any
/// turn failed, `0` otherwise.
pub async fn run_main(cli: Cli) -> anyhow::Result<i32> {
    let Cli {
        base_url,
        stream_path,
        fixture,
        idle_timeout_ms,
        json: json_mode,
        color,
        queries,
    } = cli;

    let (stdout_with_ansi, stderr_with_ansi) = match color {
        cli::Color::Always => (true, true),
        cli::Color::Never => (false, false),
        cli::Color::Auto => (
            supports_color::on_cached(supports_color::Stream::Stdout).is_some(),
            std::io::stderr().is_terminal(),
        ),
    };

    let default_level = "error";
    let _ = tracing_subscriber::fmt()
        // Fallback to the `default_level` log filter if the environment
        // variable is not set _or_ contains an invalid value
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_ansi(stderr_with_ansi)
        .with_writer(std::io::stderr)
        .try_init();

    let overrides = ConfigOverrides {
        base_url,
        stream_path,
        stream_idle_timeout: idle_timeout_ms.map(Duration::from_millis),
        fixture,
        sift_home: None,
    };
    let config = Config::load_with_overrides(overrides)?;

    let mut event_processor: Box<dyn EventProcessor> = if json_mode {
        Box::new(EventProcessorWithJsonOutput::new())
    } else {
        Box::new(EventProcessorWithHumanOutput::create_with_ansi(
            stdout_with_ansi,
        ))
    };
    event_processor.print_config_summary(&config, &queries);

    let session = Session::spawn(config.clone(), connector_for_config(&config));

    let mut any_failed = false;
    for query in queries {
        let sub_id = session.submit(Op::Submit { query }).await?;
        debug!("submitted query as {sub_id}");
        loop {
            let event = session.next_event().await?;
            match event_processor.process_event(event) {
                SessionStatus::Running => {}
                SessionStatus::TurnFinished { failed } => {
                    any_failed |= failed;
                    break;
                }
                SessionStatus::Shutdown => return Ok(exit_code(any_failed)),
            }
        }
    }

    session.submit(Op::Shutdown).await?;
    loop {
        let event = session.next_event().await?;
        if let SessionStatus::Shutdown = event_processor.process_event(event) {
            break;
        }
    }
    info!(any_failed, "all queries finished");
    Ok(exit_code(any_failed))
}

fn exit_code(any_failed: bool) -> i32 {
    if any_failed { 1 } else { 0 }
}
