use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use eventsource_stream::Eventsource;
use futures::prelude::*;
use reqwest::header::ACCEPT;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use url::Url;

use super::ChannelEventSource;
use super::Connector;
use super::EVENT_CHANNEL_CAPACITY;
use super::EventSource;
use super::TransportEvent;
use crate::config::Config;
use crate::error::TransportError;

/// Opens `GET {base_url}{stream_path}?query=<q>` and streams its body.
#[derive(Debug, Clone)]
pub struct SseConnector {
    client: reqwest::Client,
    base_url: String,
    stream_path: String,
    idle_timeout: Duration,
}

impl SseConnector {
    pub fn new(
        base_url: impl Into<String>,
        stream_path: impl Into<String>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            stream_path: stream_path.into(),
            idle_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.base_url.clone(),
            config.stream_path.clone(),
            config.stream_idle_timeout,
        )
    }

    pub(crate) fn stream_url(&self, query: &str) -> Result<Url, TransportError> {
        let base = self.base_url.trim_end_matches('/');
        let path = self.stream_path.trim_start_matches('/');
        let mut url = Url::parse(&format!("{base}/{path}"))?;
        url.query_pairs_mut().append_pair("query", query);
        Ok(url)
    }
}

#[async_trait]
impl Connector for SseConnector {
    async fn open(&self, query: &str) -> Result<Box<dyn EventSource>, TransportError> {
        let url = self.stream_url(query)?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let request = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream");
        let idle_timeout = self.idle_timeout;
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            debug!(%url, "opening SSE stream");
            let res = tokio::select! {
                _ = task_cancel.cancelled() => return,
                res = request.send() => res,
            };
            let resp = match res {
                Ok(resp) if resp.status().is_success() => resp,
                Ok(resp) => {
                    let err = TransportError::Status(resp.status());
                    debug!(%url, "SSE request rejected: {err}");
                    let _ = tx.send(TransportEvent::Error(err.to_string())).await;
                    return;
                }
                Err(e) => {
                    let err = TransportError::Http(e);
                    debug!(%url, "SSE request failed: {err}");
                    let _ = tx.send(TransportEvent::Error(err.to_string())).await;
                    return;
                }
            };
            trace!("Response status: {}", resp.status());
            let stream = resp.bytes_stream().map_err(TransportError::Http);
            process_sse(stream, tx, idle_timeout, task_cancel).await;
        });

        Ok(Box::new(ChannelEventSource::new(rx, cancel)))
    }
}

/// Parses an SSE byte stream and forwards every message to `tx` until the
/// stream ends, fails, goes quiet for `idle_timeout`, or `cancel` fires.
///
/// Exactly one `Error` or `Closed` is sent last unless the stream was
/// cancelled or the receiver went away.
pub(crate) async fn process_sse<S>(
    stream: S,
    tx: mpsc::Sender<TransportEvent>,
    idle_timeout: Duration,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<Bytes, TransportError>> + Unpin,
{
    let mut stream = stream.eventsource();

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                trace!("SSE reader cancelled");
                return;
            }
            next = timeout(idle_timeout, stream.next()) => next,
        };

        let sse = match next {
            Ok(Some(Ok(sse))) => sse,
            Ok(Some(Err(e))) => {
                debug!("SSE Error: {e:#}");
                let _ = tx
                    .send(TransportEvent::Error(TransportError::Stream(e.to_string()).to_string()))
                    .await;
                return;
            }
            Ok(None) => {
                let _ = tx.send(TransportEvent::Closed).await;
                return;
            }
            Err(_) => {
                let _ = tx
                    .send(TransportEvent::Error(TransportError::IdleTimeout.to_string()))
                    .await;
                return;
            }
        };

        trace!(event = %sse.event, "SSE event: {}", sse.data);

        let event = TransportEvent::Message {
            name: sse.event,
            data: sse.data,
        };
        if tx.send(event).await.is_err() {
            debug!("SSE receiver dropped; stopping reader");
            return;
        }
    }
}
