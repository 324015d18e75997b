use std::io::BufRead;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ChannelEventSource;
use super::Connector;
use super::EVENT_CHANNEL_CAPACITY;
use super::EventSource;
use super::TransportEvent;
use super::process_sse;
use crate::error::TransportError;

/// Replays a recorded SSE text file for every query, regardless of the query
/// text.
#[derive(Debug, Clone)]
pub struct FixtureConnector {
    path: PathBuf,
    idle_timeout: Duration,
}

impl FixtureConnector {
    pub fn new(path: impl Into<PathBuf>, idle_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            idle_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads `path` and separates every line with a blank one, so a fixture can
/// be written as consecutive `event:`/`data:` lines.
pub(crate) fn read_fixture(path: &Path) -> std::io::Result<String> {
    let f = std::fs::File::open(path)?;
    let lines = std::io::BufReader::new(f).lines();

    let mut content = String::new();
    let mut pending_event = false;
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        content.push_str(&line);
        content.push('\n');
        // An `event:` line belongs to the `data:` line that follows it.
        pending_event = line.starts_with("event:");
        if !pending_event {
            content.push('\n');
        }
    }
    if pending_event {
        content.push('\n');
    }
    Ok(content)
}

#[async_trait]
impl Connector for FixtureConnector {
    async fn open(&self, query: &str) -> Result<Box<dyn EventSource>, TransportError> {
        debug!(path = %self.path.display(), query, "replaying SSE fixture");
        let content = read_fixture(&self.path)?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let rdr = std::io::Cursor::new(content.into_bytes());
        let stream = ReaderStream::new(rdr).map_err(TransportError::Io);
        tokio::spawn(process_sse(stream, tx, self.idle_timeout, cancel.clone()));

        Ok(Box::new(ChannelEventSource::new(rx, cancel)))
    }
}
