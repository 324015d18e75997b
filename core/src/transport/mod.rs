//! The boundary between the session and whatever carries the backend's SSE
//! stream.
//!
//! A [`Connector`] opens one [`EventSource`] per submitted query. The session
//! only ever sees [`TransportEvent`]s; the HTTP and fixture adapters below
//! both feed the same SSE parser.

mod fixture;
mod sse;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

pub use fixture::FixtureConnector;
pub use sse::SseConnector;
pub(crate) use sse::process_sse;

/// Capacity of the channel between a reader task and its [`EventSource`].
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One SSE message. `name` is the `event:` field (`"message"` when the
    /// backend omitted it), `data` the raw `data:` payload.
    Message { name: String, data: String },
    /// The connection failed. No further events follow.
    Error(String),
    /// The stream ended cleanly. No further events follow.
    Closed,
}

/// Pull side of one open connection.
#[async_trait]
pub trait EventSource: Send {
    /// Next notification, in arrival order. `None` once the source has been
    /// closed or has already delivered `Error`/`Closed`.
    async fn next_event(&mut self) -> Option<TransportEvent>;

    /// Stops the underlying connection. Idempotent.
    fn close(&mut self);
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Starts a connection for `query`. Returns as soon as the reader task is
    /// spawned; connection failures arrive as [`TransportEvent::Error`].
    async fn open(&self, query: &str) -> Result<Box<dyn EventSource>, TransportError>;
}

/// [`EventSource`] backed by a spawned reader task.
pub struct ChannelEventSource {
    rx: mpsc::Receiver<TransportEvent>,
    cancel: CancellationToken,
    done: bool,
}

impl ChannelEventSource {
    pub fn new(rx: mpsc::Receiver<TransportEvent>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            cancel,
            done: false,
        }
    }

    /// Channel pair for driving a source by hand. Dropping the sender reads
    /// as [`TransportEvent::Closed`].
    pub fn pair() -> (mpsc::Sender<TransportEvent>, Self) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (tx, Self::new(rx, CancellationToken::new()))
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.done {
            return None;
        }
        let event = self.rx.recv().await.unwrap_or(TransportEvent::Closed);
        if !matches!(event, TransportEvent::Message { .. }) {
            self.done = true;
        }
        Some(event)
    }

    fn close(&mut self) {
        if !self.done {
            self.done = true;
            self.cancel.cancel();
            self.rx.close();
        }
    }
}

impl Drop for ChannelEventSource {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message(name: &str, data: &str) -> TransportEvent {
        TransportEvent::Message {
            name: name.to_string(),
            data: data.to_string(),
        }
    }

    #[tokio::test]
    async fn dropped_sender_reads_as_closed_once() {
        let (tx, mut source) = ChannelEventSource::pair();
        tx.send(message("summary_part", "\"a\"")).await.unwrap();
        drop(tx);

        assert_eq!(source.next_event().await, Some(message("summary_part", "\"a\"")));
        assert_eq!(source.next_event().await, Some(TransportEvent::Closed));
        assert_eq!(source.next_event().await, None);
    }

    #[tokio::test]
    async fn close_cancels_reader_and_silences_source() {
        let (tx, mut source) = ChannelEventSource::pair();
        let token = source.cancellation_token();
        tx.send(message("breakdown", "[]")).await.unwrap();

        source.close();
        assert!(token.is_cancelled());
        assert_eq!(source.next_event().await, None);
        assert!(tx.send(message("breakdown", "[]")).await.is_err());
    }

    #[tokio::test]
    async fn nothing_follows_an_error() {
        let (tx, mut source) = ChannelEventSource::pair();
        tx.send(TransportEvent::Error("boom".to_string())).await.unwrap();
        tx.send(message("breakdown", "[]")).await.unwrap();

        assert_eq!(
            source.next_event().await,
            Some(TransportEvent::Error("boom".to_string()))
        );
        assert_eq!(source.next_event().await, None);
    }
}
